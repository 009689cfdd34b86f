use blur_effect_config::CornerRadius;
use glam::{Mat3, Mat4};
use smithay::utils::{Physical, Rectangle};

/// Which program variant of a composite pass to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Rectangular,
    /// Masks everything outside the rounded window box.
    Rounded,
}

/// Uniform values shared by the passes drawing onto the output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    /// Framebuffer pixels to clip space.
    pub projection: Mat3,
    /// Area the blur textures were captured from, in framebuffer pixels.
    pub background: Rectangle<i32, Physical>,
    pub color_matrix: Mat4,
    /// Half a texel of the texture the final upsample reads.
    pub half_pixel: [f32; 2],
    pub offset: f32,
    pub opacity: f32,
    /// Window shape the rounded variants mask to, in framebuffer pixels.
    pub window_box: Rectangle<i32, Physical>,
    pub corner_radius: CornerRadius,
}

impl Parameters {
    /// `(x, y, w, h)` of the background rect.
    pub fn background_uniform(&self) -> [f32; 4] {
        [
            self.background.loc.x as f32,
            self.background.loc.y as f32,
            self.background.size.w.max(1) as f32,
            self.background.size.h.max(1) as f32,
        ]
    }

    /// Center and half size of the window box, relative to the background rect.
    pub fn box_uniform(&self) -> [f32; 4] {
        let half_w = self.window_box.size.w as f32 / 2.;
        let half_h = self.window_box.size.h as f32 / 2.;
        [
            (self.window_box.loc.x - self.background.loc.x) as f32 + half_w,
            (self.window_box.loc.y - self.background.loc.y) as f32 + half_h,
            half_w,
            half_h,
        ]
    }

    pub fn corner_radius_uniform(&self) -> [f32; 4] {
        let radius = self.corner_radius.fit_to(
            self.window_box.size.w as f32,
            self.window_box.size.h as f32,
        );
        radius.into()
    }

    pub fn has_radius(&self) -> bool {
        !self.corner_radius.is_null()
    }
}
