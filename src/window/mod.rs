//! Per-window force-blur state.

use std::fmt;
use std::time::Duration;

use blur_effect_config::CornerRadius;
use smithay::utils::Logical;

use crate::animation::{fade_in, fade_out, fade_progress, Clock};
use crate::host::{HostWindow, WindowId};
use crate::utils::{rect, Region};

pub mod manager;
pub mod matcher;

pub use manager::WindowManager;
pub use matcher::WindowMatcher;

/// Why a window's blur region has its current value.
///
/// Requested means the window asked for blur itself, forced means it came from the force-blur
/// settings. Requested and forced are never expected to be set at the same time for the same
/// part of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlurOrigin {
    pub requested_content: bool,
    pub requested_frame: bool,
    pub forced_content: bool,
    pub forced_frame: bool,
}

impl BlurOrigin {
    pub fn has_frame(self) -> bool {
        self.requested_frame || self.forced_frame
    }
}

impl fmt::Display for BlurOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.requested_content, "RequestedContent"),
            (self.requested_frame, "RequestedFrame"),
            (self.forced_content, "ForcedContent"),
            (self.forced_frame, "ForcedFrame"),
        ];
        let mut set = names.iter().filter(|(on, _)| *on).map(|(_, name)| *name);

        match set.next() {
            None => f.write_str("None"),
            Some(first) => {
                f.write_str(first)?;
                for name in set {
                    write!(f, ",{name}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaximizedState {
    #[default]
    Unknown,
    Restored,
    Horizontal,
    Vertical,
    Complete,
}

impl MaximizedState {
    pub fn from_axes(horizontal: bool, vertical: bool) -> Self {
        match (horizontal, vertical) {
            (true, true) => Self::Complete,
            (true, false) => Self::Horizontal,
            (false, true) => Self::Vertical,
            (false, false) => Self::Restored,
        }
    }
}

/// Blur fade around an interactive move or resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformState {
    #[default]
    None,
    /// Fading out after the move/resize started.
    Started,
    /// Fading back in after it finished.
    Ended,
}

/// Force-blur settings every window reads.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ForceBlurOptions {
    pub blur_decorations: bool,
    pub user_border_radius: f32,
}

#[derive(Debug)]
pub struct Window {
    id: WindowId,
    clock: Clock,

    should_force_blur: bool,
    user_border_radius: f32,

    force_blur_content: Option<Region<Logical>>,
    force_blur_frame: Option<Region<Logical>>,

    origin: BlurOrigin,
    maximized_state: MaximizedState,
    /// Minimized straight from the completely maximized state.
    restores_maximized: bool,

    is_transformed: bool,
    should_blur_while_transformed: bool,
    transform_state: TransformState,
    transform_start: Duration,
}

const PLASMA_CLASSES: [&str; 4] = [
    "org.kde.plasmashell",
    "plasmashell",
    "org.kde.krunner",
    "krunner",
];

impl Window {
    pub fn new(id: WindowId, clock: Clock) -> Self {
        Self {
            id,
            clock,
            should_force_blur: false,
            user_border_radius: 0.,
            force_blur_content: None,
            force_blur_frame: None,
            origin: BlurOrigin::default(),
            maximized_state: MaximizedState::Unknown,
            restores_maximized: false,
            is_transformed: false,
            should_blur_while_transformed: false,
            transform_state: TransformState::None,
            transform_start: Duration::ZERO,
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn should_force_blur(&self) -> bool {
        self.should_force_blur
    }

    pub fn force_blur_content(&self) -> Option<&Region<Logical>> {
        self.force_blur_content.as_ref()
    }

    pub fn force_blur_frame(&self) -> Option<&Region<Logical>> {
        self.force_blur_frame.as_ref()
    }

    pub fn origin(&self) -> BlurOrigin {
        self.origin
    }

    pub fn maximized_state(&self) -> MaximizedState {
        self.maximized_state
    }

    pub fn transform_state(&self) -> TransformState {
        self.transform_state
    }

    /// Re-reads the force-blur decision and options.
    ///
    /// Returns `true` when the force-blur region changed.
    pub fn reconfigure(
        &mut self,
        w: &dyn HostWindow,
        matcher: &WindowMatcher,
        options: &ForceBlurOptions,
    ) -> bool {
        self.should_force_blur = matcher.matches(w);
        self.user_border_radius = options.user_border_radius;
        self.update_force_blur_region(w, options)
    }

    /// Recomputes the force-blur region from the window geometry.
    ///
    /// Returns `true` when the region changed and the blur region has to be refreshed.
    pub fn update_force_blur_region(
        &mut self,
        w: &dyn HostWindow,
        options: &ForceBlurOptions,
    ) -> bool {
        if !self.should_force_blur {
            let had_region = self.force_blur_content.is_some() || self.force_blur_frame.is_some();
            self.force_blur_content = None;
            self.force_blur_frame = None;
            return had_region;
        }

        let frame_geometry = w.frame_geometry();

        // The contents rect of X11 windows includes client-side shadows, so only the frame region
        // lines up with what is visible.
        let is_x11_with_csd =
            w.is_x11_client() && !w.has_decoration() && frame_geometry != w.buffer_geometry();

        let (content, frame) = if is_x11_with_csd {
            let size = frame_geometry.to_i32_round::<i32>().size;
            let frame = Region::from_rect(rect(0, 0, size.w, size.h));
            (None, Some(frame))
        } else {
            let frame = match w.decoration_rect() {
                Some(decoration) if options.blur_decorations => {
                    let mut frame = Region::from_rect(decoration.to_i32_up::<i32>());
                    frame.subtract_rect(&w.contents_rect().to_i32_round());
                    Some(frame)
                }
                _ => None,
            };
            (Some(Region::new()), frame)
        };

        if content == self.force_blur_content && frame == self.force_blur_frame {
            return false;
        }

        self.force_blur_content = content;
        self.force_blur_frame = frame;
        true
    }

    /// Combines the window's own blur request with the force-blur region.
    ///
    /// `content` and `frame` hold what the window and its decoration asked for and are replaced
    /// with the regions to blur.
    pub fn final_blur_region(
        &mut self,
        w: &dyn HostWindow,
        content: &mut Option<Region<Logical>>,
        frame: &mut Option<Region<Logical>>,
    ) {
        let old = self.origin;
        let mut origin = old;

        origin.requested_content = content.is_some();
        if origin.requested_content {
            origin.forced_content = false;
        }
        origin.requested_frame = frame.is_some();
        if origin.requested_frame {
            origin.forced_frame = false;
        }

        // A window that declares its own region is trusted, unless its opacity was lowered from
        // outside, in which case its region may no longer cover what is visible.
        if origin.requested_content && (w.opacity() - 1.).abs() <= f64::EPSILON {
            self.set_origin(w, origin);
            return;
        }

        if let Some(forced) = &self.force_blur_content {
            *content = Some(forced.clone());
            origin.forced_content = true;
            origin.requested_content = false;
        } else {
            origin.forced_content = false;
        }

        // A decoration that set its own region knows its shape better.
        match &self.force_blur_frame {
            Some(forced) if frame.is_none() => {
                *frame = Some(forced.clone());
                origin.forced_frame = true;
                origin.requested_frame = false;
            }
            _ => origin.forced_frame = false,
        }

        self.set_origin(w, origin);

        if origin.requested_content && origin.forced_content {
            warn!(
                "requested and forced content blur both set on window {}",
                w.resource_class()
            );
        }
        if origin.requested_frame && origin.forced_frame {
            warn!(
                "requested and forced frame blur both set on window {}",
                w.resource_class()
            );
        }
    }

    fn set_origin(&mut self, w: &dyn HostWindow, origin: BlurOrigin) {
        let old = self.origin;
        self.origin = origin;
        if old != origin {
            info!(
                "blur origin changed: {} (was: {old})",
                WindowDisplay { window: self, w }
            );
        }
    }

    pub fn set_maximized_state(&mut self, state: MaximizedState) {
        self.maximized_state = state;
    }

    pub fn on_minimized_changed(&mut self, w: &dyn HostWindow) {
        if self.maximized_state == MaximizedState::Complete && w.is_minimized() {
            self.restores_maximized = true;
        }
    }

    /// Returns `true` when the force-blur region changed.
    pub fn on_frame_geometry_changed(
        &mut self,
        w: &dyn HostWindow,
        options: &ForceBlurOptions,
    ) -> bool {
        let changed = self.update_force_blur_region(w, options);
        self.restores_maximized = false;
        changed
    }

    pub fn on_move_resize_started(&mut self) {
        self.start_transition(TransformState::Started);
    }

    pub fn on_move_resize_finished(&mut self) {
        self.start_transition(TransformState::Ended);
    }

    fn start_transition(&mut self, state: TransformState) {
        // Only force-blurred content fades. Windows that declare their own blur keep whatever
        // the host does with transformed windows.
        if self.origin.forced_content {
            self.should_blur_while_transformed = true;
            self.transform_state = state;
            self.transform_start = self.clock.now();
        } else {
            self.should_blur_while_transformed = false;
            self.transform_state = TransformState::None;
        }
    }

    pub fn set_is_transformed(&mut self, transformed: bool) {
        if self.is_transformed == transformed {
            return;
        }

        self.is_transformed = transformed;

        // The first untransformed paint ends blurring while transformed, so minimize animations
        // don't draw a stale rectangle.
        if !transformed {
            self.should_blur_while_transformed = false;
        }
    }

    pub fn should_blur_while_transformed(&self, w: &dyn HostWindow) -> bool {
        if w.is_minimized() {
            return false;
        }

        if self.maximized_state == MaximizedState::Complete && !self.restores_maximized {
            return true;
        }

        self.should_blur_while_transformed
    }

    pub fn effective_border_radius(&self, w: &dyn HostWindow) -> CornerRadius {
        let window_radius = w.border_radius();

        if self.is_plasma_surface(w) {
            return window_radius;
        }

        if !window_radius.is_null() {
            if !w.has_decoration() || !self.origin.forced_frame {
                return window_radius;
            }

            // Decorations that round only their bottom corners assume the titlebar is not
            // blurred. With a force-blurred decoration the top corners need the same radius.
            let top_left = if window_radius.top_left > 0. {
                window_radius.top_left
            } else {
                window_radius.bottom_left
            };
            let top_right = if window_radius.top_right > 0. {
                window_radius.top_right
            } else {
                window_radius.bottom_right
            };
            return CornerRadius {
                top_left,
                top_right,
                ..window_radius
            };
        }

        if w.is_fullscreen() || self.maximized_state == MaximizedState::Complete {
            return CornerRadius::default();
        }

        if self.user_border_radius > 0. {
            if self.origin.has_frame() || !w.has_decoration() {
                CornerRadius::uniform(self.user_border_radius)
            } else {
                CornerRadius::bottom(self.user_border_radius)
            }
        } else {
            CornerRadius::default()
        }
    }

    /// Opacity of the blur behind the window, given the opacity it is painted with.
    pub fn effective_blur_opacity(&mut self, w: &dyn HostWindow, paint_opacity: f64) -> f64 {
        if self.is_plasma_surface(w) {
            return w.opacity() * paint_opacity;
        }

        if !self.is_transformed || self.transform_state == TransformState::None {
            return paint_opacity;
        }

        let now = self.clock.now();
        let progress = fade_progress(self.transform_start, now);

        // The blur region is clipped to the damage, so anything short of a full repaint flickers.
        w.add_repaint_full();

        match self.transform_state {
            TransformState::Started => {
                // Dragging a maximized window by its titlebar marks it transformed before it is
                // actually restored. Stay fully blurred until then.
                if self.maximized_state == MaximizedState::Complete {
                    self.transform_start = now;
                    return paint_opacity;
                }

                if progress >= 1. {
                    self.should_blur_while_transformed = false;
                    0.
                } else {
                    paint_opacity * fade_out(progress)
                }
            }
            TransformState::Ended => {
                if self.maximized_state == MaximizedState::Complete || progress >= 1. {
                    self.transform_state = TransformState::None;
                    paint_opacity
                } else {
                    paint_opacity * fade_in(progress)
                }
            }
            TransformState::None => paint_opacity,
        }
    }

    /// Whether the window is a desktop shell surface that manages its own blur.
    pub fn is_plasma_surface(&self, w: &dyn HostWindow) -> bool {
        if !self.origin.requested_content || w.has_decoration() {
            return false;
        }

        let class = w.resource_class();
        PLASMA_CLASSES.contains(&class) || w.is_special() || class.is_empty()
    }
}

struct WindowDisplay<'a> {
    window: &'a Window,
    w: &'a dyn HostWindow,
}

impl fmt::Display for WindowDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "class: {:?}, type: {:?}, origin: {}",
            self.w.resource_class(),
            self.w.window_type(),
            self.window.origin
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use blur_effect_config::ForceBlur;

    use super::*;
    use crate::tests::fixture::TestWindow;

    fn forced(w: &TestWindow, options: &ForceBlurOptions) -> Window {
        let matcher = WindowMatcher::new(&ForceBlur {
            window_classes: w.class.clone(),
            ..ForceBlur::default()
        });
        let mut window = Window::new(w.id, Clock::with_time(Duration::ZERO));
        window.reconfigure(w, &matcher, options);
        window
    }

    #[test]
    fn origin_display() {
        assert_eq!(BlurOrigin::default().to_string(), "None");
        let origin = BlurOrigin {
            requested_content: true,
            forced_frame: true,
            ..BlurOrigin::default()
        };
        assert_eq!(origin.to_string(), "RequestedContent,ForcedFrame");
    }

    #[test]
    fn maximized_state_from_axes() {
        assert_eq!(MaximizedState::from_axes(true, true), MaximizedState::Complete);
        assert_eq!(MaximizedState::from_axes(true, false), MaximizedState::Horizontal);
        assert_eq!(MaximizedState::from_axes(false, true), MaximizedState::Vertical);
        assert_eq!(MaximizedState::from_axes(false, false), MaximizedState::Restored);
    }

    #[test]
    fn unmatched_window_has_no_force_region() {
        let w = TestWindow::new(1).with_class("kitty");
        let matcher = WindowMatcher::new(&ForceBlur::default());
        let mut window = Window::new(w.id, Clock::default());
        assert!(!window.reconfigure(&w, &matcher, &ForceBlurOptions::default()));
        assert_eq!(window.force_blur_content(), None);
        assert_eq!(window.force_blur_frame(), None);
    }

    #[test]
    fn losing_the_match_clears_the_region() {
        let w = TestWindow::new(1).with_class("kitty");
        let mut window = forced(&w, &ForceBlurOptions::default());
        assert!(window.force_blur_content().is_some());

        let matcher = WindowMatcher::new(&ForceBlur::default());
        assert!(window.reconfigure(&w, &matcher, &ForceBlurOptions::default()));
        assert_eq!(window.force_blur_content(), None);
        assert!(!window.reconfigure(&w, &matcher, &ForceBlurOptions::default()));
    }

    #[test]
    fn decoration_region_excludes_contents() {
        let w = TestWindow::new(1)
            .with_class("kitty")
            .with_frame(0., 0., 200., 130.)
            .with_decoration(30.);
        let options = ForceBlurOptions {
            blur_decorations: true,
            ..ForceBlurOptions::default()
        };
        let window = forced(&w, &options);

        assert_eq!(window.force_blur_content(), Some(&Region::new()));
        assert_eq!(
            window.force_blur_frame(),
            Some(&Region::from_rect(rect(0, 0, 200, 30)))
        );

        let window = forced(&w, &ForceBlurOptions::default());
        assert_eq!(window.force_blur_frame(), None);
    }

    #[test]
    fn x11_csd_uses_frame_region() {
        let w = TestWindow::new(1)
            .with_class("gedit")
            .with_frame(10., 10., 300., 200.)
            .x11_with_shadow(12.);
        let window = forced(&w, &ForceBlurOptions::default());
        assert_eq!(window.force_blur_content(), None);
        assert_eq!(
            window.force_blur_frame(),
            Some(&Region::from_rect(rect(0, 0, 300, 200)))
        );
    }

    #[test]
    fn requested_frame_is_not_overridden() {
        let w = TestWindow::new(1)
            .with_class("kitty")
            .with_decoration(30.)
            .with_opacity(0.5);
        let options = ForceBlurOptions {
            blur_decorations: true,
            ..ForceBlurOptions::default()
        };
        let mut window = forced(&w, &options);

        let own_frame = Region::from_rect(rect(4, 0, 10, 10));
        let mut content = None;
        let mut frame = Some(own_frame.clone());
        window.final_blur_region(&w, &mut content, &mut frame);

        assert_eq!(content, Some(Region::new()));
        assert_eq!(frame, Some(own_frame));
        assert!(window.origin().requested_frame);
        assert!(window.origin().forced_content);
        assert!(!window.origin().forced_frame);
    }

    #[test]
    fn bottom_radius_is_mirrored_for_forced_decorations() {
        let w = TestWindow::new(1)
            .with_class("kitty")
            .with_decoration(30.)
            .with_radius(CornerRadius::bottom(8.));
        let options = ForceBlurOptions {
            blur_decorations: true,
            ..ForceBlurOptions::default()
        };
        let mut window = forced(&w, &options);
        window.final_blur_region(&w, &mut None, &mut None);
        assert!(window.origin().forced_frame);
        assert_eq!(window.effective_border_radius(&w), CornerRadius::uniform(8.));

        // Without force-blurred decorations the window radius is used as is.
        let mut window = forced(&w, &ForceBlurOptions::default());
        window.final_blur_region(&w, &mut None, &mut None);
        assert_eq!(window.effective_border_radius(&w), CornerRadius::bottom(8.));
    }

    #[test]
    fn user_radius_depends_on_decoration() {
        let options = ForceBlurOptions {
            user_border_radius: 12.,
            ..ForceBlurOptions::default()
        };

        let decorated = TestWindow::new(1).with_class("kitty").with_decoration(30.);
        let mut window = forced(&decorated, &options);
        window.final_blur_region(&decorated, &mut None, &mut None);
        assert_eq!(window.effective_border_radius(&decorated), CornerRadius::bottom(12.));

        let csd = TestWindow::new(2).with_class("kitty");
        let mut window = forced(&csd, &options);
        window.final_blur_region(&csd, &mut None, &mut None);
        assert_eq!(window.effective_border_radius(&csd), CornerRadius::uniform(12.));

        window.set_maximized_state(MaximizedState::Complete);
        assert_eq!(window.effective_border_radius(&csd), CornerRadius::default());
    }

    #[test]
    fn plasma_surface_heuristic() {
        let panel = TestWindow::new(1)
            .with_class("org.kde.plasmashell")
            .with_blur_region(Region::new())
            .with_radius(CornerRadius::uniform(4.))
            .with_opacity(0.5);
        let mut window = Window::new(panel.id, Clock::default());
        window.final_blur_region(&panel, &mut panel.blur_region.clone(), &mut None);
        assert!(window.is_plasma_surface(&panel));
        assert_eq!(window.effective_border_radius(&panel), CornerRadius::uniform(4.));
        assert_abs_diff_eq!(window.effective_blur_opacity(&panel, 0.8), 0.4);

        // Without its own region it is just a window.
        let mut window = Window::new(panel.id, Clock::default());
        window.final_blur_region(&panel, &mut None, &mut None);
        assert!(!window.is_plasma_surface(&panel));

        let special = TestWindow::new(2)
            .with_class("something")
            .special()
            .with_blur_region(Region::new());
        let mut window = Window::new(special.id, Clock::default());
        window.final_blur_region(&special, &mut special.blur_region.clone(), &mut None);
        assert!(window.is_plasma_surface(&special));
    }

    #[test]
    fn move_resize_fades_forced_content_only() {
        let clock = Clock::with_time(Duration::ZERO);
        let w = TestWindow::new(1).with_class("kitty");
        let matcher = WindowMatcher::new(&ForceBlur {
            window_classes: String::from("kitty"),
            ..ForceBlur::default()
        });
        let options = ForceBlurOptions::default();
        let mut window = Window::new(w.id, clock.clone());
        window.reconfigure(&w, &matcher, &options);
        window.final_blur_region(&w, &mut None, &mut None);
        assert!(window.origin().forced_content);

        window.on_move_resize_started();
        window.set_is_transformed(true);
        assert!(window.should_blur_while_transformed(&w));
        assert_abs_diff_eq!(window.effective_blur_opacity(&w, 1.), 1.);

        clock.advance(Duration::from_millis(125));
        let halfway = window.effective_blur_opacity(&w, 1.);
        assert!(halfway > 0. && halfway < 0.5, "{halfway}");
        assert!(w.repaints() >= 2);

        clock.advance(Duration::from_millis(125));
        assert_abs_diff_eq!(window.effective_blur_opacity(&w, 1.), 0.);
        assert!(!window.should_blur_while_transformed(&w));

        window.on_move_resize_finished();
        assert_abs_diff_eq!(window.effective_blur_opacity(&w, 1.), 0.);
        clock.advance(Duration::from_millis(300));
        assert_abs_diff_eq!(window.effective_blur_opacity(&w, 0.9), 0.9);
        assert_eq!(window.transform_state(), TransformState::None);

        // Windows with their own region never fade.
        let mut window = Window::new(w.id, clock.clone());
        window.final_blur_region(&w, &mut Some(Region::new()), &mut None);
        window.on_move_resize_started();
        window.set_is_transformed(true);
        assert!(!window.should_blur_while_transformed(&w));
        assert_eq!(window.transform_state(), TransformState::None);
    }

    #[test]
    fn maximized_window_stays_blurred_until_restored() {
        let clock = Clock::with_time(Duration::ZERO);
        let w = TestWindow::new(1).with_class("kitty");
        let mut window = forced(&w, &ForceBlurOptions::default());
        window.clock = clock.clone();
        window.final_blur_region(&w, &mut None, &mut None);
        window.set_maximized_state(MaximizedState::Complete);

        window.on_move_resize_started();
        window.set_is_transformed(true);
        clock.advance(Duration::from_secs(1));
        assert_abs_diff_eq!(window.effective_blur_opacity(&w, 1.), 1.);
        assert!(window.should_blur_while_transformed(&w));

        // Minimizing from the maximized state stops blurring while transformed.
        let minimized = w.clone().minimized();
        window.on_minimized_changed(&minimized);
        window.set_is_transformed(false);
        assert!(!window.should_blur_while_transformed(&minimized));
        assert!(!window.should_blur_while_transformed(&w));

        window.on_frame_geometry_changed(&w, &ForceBlurOptions::default());
        assert!(window.should_blur_while_transformed(&w));
    }
}
