//! The surface the compositor exposes to the effect.

use bitflags::bitflags;
use blur_effect_config::CornerRadius;
use smithay::utils::{Logical, Physical, Rectangle, Size};

use crate::utils::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    #[default]
    Normal,
    Desktop,
    Dock,
    Toolbar,
    Menu,
    DropdownMenu,
    PopupMenu,
    Popup,
    Tooltip,
    Notification,
    Dialog,
    Utility,
    Splash,
    OnScreenDisplay,
}

impl WindowType {
    pub fn is_menu_like(self) -> bool {
        matches!(
            self,
            WindowType::Menu | WindowType::DropdownMenu | WindowType::PopupMenu | WindowType::Popup
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackingLayer {
    Desktop,
    Below,
    #[default]
    Normal,
    Dock,
    Above,
    Notification,
    Active,
    Popup,
    CriticalNotification,
    OnScreenDisplay,
    Overlay,
}

/// Brightness, contrast and saturation a window asked for through the contrast protocol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContrastParams {
    pub brightness: Option<f64>,
    pub contrast: Option<f64>,
    pub saturation: Option<f64>,
}

/// A window as seen by the effect.
///
/// Geometry is in logical coordinates. Frame and buffer geometry are global; the contents rect,
/// decoration rect and blur regions are relative to the frame's top-left corner, except for the
/// window's own blur region which is relative to the contents rect.
pub trait HostWindow {
    fn id(&self) -> WindowId;
    fn resource_class(&self) -> &str;
    fn resource_name(&self) -> &str;
    fn window_type(&self) -> WindowType;
    fn layer(&self) -> StackingLayer;

    /// Whether the window belongs to the compositor itself.
    fn is_internal(&self) -> bool;
    /// Shell surfaces that are not regular application windows (panels, OSDs).
    fn is_special(&self) -> bool;
    fn is_fullscreen(&self) -> bool;
    fn is_minimized(&self) -> bool;
    fn is_x11_client(&self) -> bool;

    fn is_closed(&self) -> bool {
        false
    }

    fn frame_geometry(&self) -> Rectangle<f64, Logical>;
    fn buffer_geometry(&self) -> Rectangle<f64, Logical>;
    fn contents_rect(&self) -> Rectangle<f64, Logical>;

    /// Rectangle covered by the server-side decoration, `None` for undecorated windows.
    fn decoration_rect(&self) -> Option<Rectangle<f64, Logical>>;

    fn has_decoration(&self) -> bool {
        self.decoration_rect().is_some()
    }

    /// Region behind a translucent decoration that wants blur.
    fn decoration_blur_region(&self) -> Option<Region<Logical>> {
        None
    }

    /// Region the window asked to have blurred. An empty region means the whole window.
    fn blur_region(&self) -> Option<Region<Logical>>;

    /// Corner radius the window declared for its blur.
    fn border_radius(&self) -> CornerRadius {
        CornerRadius::default()
    }

    fn requested_contrast(&self) -> ContrastParams {
        ContrastParams::default()
    }

    fn opacity(&self) -> f64;

    /// Schedules a repaint of the whole window on the next frame.
    fn add_repaint_full(&self);
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PaintMask: u32 {
        /// Painted with a transform beyond the scale and translation in the paint data.
        const TRANSFORMED = 1 << 2;
    }
}

/// Per-paint window attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPaintData {
    pub opacity: f64,
    pub x_scale: f64,
    pub y_scale: f64,
    pub x_translation: f64,
    pub y_translation: f64,
    pub mask: PaintMask,
}

impl Default for WindowPaintData {
    fn default() -> Self {
        Self {
            opacity: 1.,
            x_scale: 1.,
            y_scale: 1.,
            x_translation: 0.,
            y_translation: 0.,
            mask: PaintMask::empty(),
        }
    }
}

impl WindowPaintData {
    pub fn is_scaled(&self) -> bool {
        self.x_scale != 1. || self.y_scale != 1.
    }

    pub fn is_translated(&self) -> bool {
        self.x_translation != 0. || self.y_translation != 0.
    }
}

/// Regions collected before painting a window, in global logical coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowPrePaintData {
    /// Area that will be repainted this frame.
    pub paint: Region<Logical>,
    /// Area the window covers with fully opaque pixels.
    pub opaque: Region<Logical>,
}

/// The output framebuffer a window is being painted into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderViewport {
    pub output: OutputId,
    /// Logical position of the output's top-left corner.
    pub origin: (f64, f64),
    pub scale: f64,
    pub size: Size<i32, Physical>,
}

impl RenderViewport {
    pub fn rect(&self) -> Rectangle<i32, Physical> {
        Rectangle::from_size(self.size)
    }
}
