use std::collections::HashMap;

use smithay::utils::{Logical, Rectangle};

use crate::effect::DrawPlan;
use crate::host::{ContrastParams, HostWindow, OutputId, WindowId};
use crate::render_helpers::blur::BlurRenderData;
use crate::utils::Region;

/// Render-side state of a window that has something to blur.
#[derive(Debug)]
pub struct BlurEffectData<T> {
    /// Content region relative to the contents rect. Empty means the whole contents rect.
    pub content: Option<Region<Logical>>,
    /// Region relative to the frame, usually covering the decoration.
    pub frame: Option<Region<Logical>>,
    pub render: HashMap<OutputId, BlurRenderData<T>>,
    /// Values the window asked for through the contrast protocol.
    pub contrast: ContrastParams,
    pub(super) plan: Option<DrawPlan>,
}

impl<T> Default for BlurEffectData<T> {
    fn default() -> Self {
        Self {
            content: None,
            frame: None,
            render: HashMap::new(),
            contrast: ContrastParams::default(),
            plan: None,
        }
    }
}

impl<T> BlurEffectData<T> {
    pub fn has_blur(&self) -> bool {
        self.content.is_some() || self.frame.is_some()
    }

    /// Blurred area relative to the frame.
    ///
    /// `contents` is the contents rect, also relative to the frame.
    pub fn blur_region(&self, contents: Rectangle<i32, Logical>) -> Region<Logical> {
        let mut region = match &self.content {
            Some(content) if content.is_empty() => Region::from_rect(contents),
            Some(content) => content
                .translated(contents.loc.x, contents.loc.y)
                .intersected_rect(&contents),
            None => Region::new(),
        };

        if let Some(frame) = &self.frame {
            region.union(frame);
        }

        region
    }

    /// Picks up the contrast values the window currently asks for.
    ///
    /// A closed window keeps its last values while it animates out.
    pub fn refresh_contrast(&mut self, w: &dyn HostWindow) {
        if w.is_closed() {
            return;
        }
        self.contrast = w.requested_contrast();
    }
}

/// Drops the render data every window holds for `output`.
pub fn free_output<T>(windows: &mut HashMap<WindowId, BlurEffectData<T>>, output: OutputId) {
    for data in windows.values_mut() {
        data.render.remove(&output);
        if data.plan.as_ref().is_some_and(|plan| plan.output == output) {
            data.plan = None;
        }
    }
}
