use blur_effect_config::Refraction;
use smithay::backend::renderer::gles::{ffi, GlesError, GlesRenderer};
use smithay::utils::{Physical, Size};

use crate::render_helpers::background_effect::{Parameters, Shape};
use crate::render_helpers::contrast::{compile_variants, CompositeProgram};
use crate::render_helpers::shaders::{draw_triangles, uniform};

const EDGE_SIZE_SCALE: f64 = 10.;
/// The corner radius setting snaps to 30 steps over 0..=200 pixels.
const CORNER_RADIUS_STEP: f64 = 200. / 30.;
const MAX_STRENGTH: f64 = 30.;
const NORMAL_POW_SCALE: f64 = 0.5;
const MAX_RGB_FRINGING: f64 = 30.;

/// Refraction settings in the units the shader expects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefractionParams {
    pub enabled: bool,
    pub edge_size: f64,
    pub corner_radius: f64,
    /// `0..=1`.
    pub strength: f64,
    pub normal_pow: f64,
    /// `0..=1`.
    pub rgb_fringing: f64,
    pub texture_repeat_mode: i32,
    pub mode: i32,
}

impl Default for RefractionParams {
    fn default() -> Self {
        Self::from_settings(&Refraction::default())
    }
}

impl RefractionParams {
    pub fn from_settings(config: &Refraction) -> Self {
        let corner_radius =
            (f64::from(config.corner_radius) / CORNER_RADIUS_STEP).round() * CORNER_RADIUS_STEP;

        Self {
            enabled: config.strength > 0,
            edge_size: f64::from(config.edge_size) * EDGE_SIZE_SCALE,
            corner_radius,
            strength: f64::from(config.strength) / MAX_STRENGTH,
            normal_pow: f64::from(config.normal_pow) * NORMAL_POW_SCALE,
            rgb_fringing: f64::from(config.rgb_fringing) / MAX_RGB_FRINGING,
            texture_repeat_mode: config.texture_repeat_mode,
            mode: config.mode,
        }
    }

    /// Edge size limited to half of the smaller background dimension.
    pub fn edge_size_for(&self, background: Size<i32, Physical>) -> f32 {
        let limit = (background.w / 2).min(background.h / 2);
        (self.edge_size as f32).min(limit as f32)
    }
}

#[derive(Debug)]
pub struct RefractionProgram {
    composite: CompositeProgram,
    uniform_rect_size: ffi::types::GLint,
    uniform_edge_size: ffi::types::GLint,
    uniform_corner_radius: ffi::types::GLint,
    uniform_strength: ffi::types::GLint,
    uniform_normal_pow: ffi::types::GLint,
    uniform_rgb_fringing: ffi::types::GLint,
    uniform_texture_repeat_mode: ffi::types::GLint,
    uniform_mode: ffi::types::GLint,
}

impl RefractionProgram {
    unsafe fn compile(gl: &ffi::Gles2, shape: Shape) -> Result<Self, GlesError> {
        let body = include_str!("shaders/refraction.frag");
        let composite = unsafe { CompositeProgram::compile(gl, body, shape)? };
        let program = composite.program;

        Ok(Self {
            composite,
            uniform_rect_size: uniform(gl, program, c"refraction_rect_size"),
            uniform_edge_size: uniform(gl, program, c"refraction_edge_size"),
            uniform_corner_radius: uniform(gl, program, c"refraction_corner_radius"),
            uniform_strength: uniform(gl, program, c"refraction_strength"),
            uniform_normal_pow: uniform(gl, program, c"refraction_normal_pow"),
            uniform_rgb_fringing: uniform(gl, program, c"refraction_rgb_fringing"),
            uniform_texture_repeat_mode: uniform(gl, program, c"refraction_texture_repeat_mode"),
            uniform_mode: uniform(gl, program, c"refraction_mode"),
        })
    }
}

/// Bends the blurred background near the window edges like a glass pane.
#[derive(Debug, Default)]
pub struct RefractionPass {
    rectangular: Option<RefractionProgram>,
    rounded: Option<RefractionProgram>,
    params: RefractionParams,
}

impl RefractionPass {
    pub fn new(config: &Refraction) -> Self {
        Self {
            rectangular: None,
            rounded: None,
            params: RefractionParams::from_settings(config),
        }
    }

    pub fn compile(&mut self, renderer: &mut GlesRenderer) {
        let _span = tracy_client::span!("RefractionPass::compile");

        let (rectangular, rounded) = compile_variants(renderer, "refraction", |gl, shape| unsafe {
            RefractionProgram::compile(gl, shape)
        });
        self.rectangular = rectangular;
        self.rounded = rounded;
    }

    pub fn reconfigure(&mut self, config: &Refraction) {
        self.params = RefractionParams::from_settings(config);
    }

    pub fn params(&self) -> &RefractionParams {
        &self.params
    }

    pub fn ready(&self) -> bool {
        self.rectangular.is_some() && self.rounded.is_some()
    }

    /// Whether the pass is both configured on and usable.
    pub fn enabled(&self) -> bool {
        self.params.enabled && self.ready()
    }

    pub fn has_program(&self, shape: Shape) -> bool {
        self.program(shape).is_some()
    }

    fn program(&self, shape: Shape) -> Option<&RefractionProgram> {
        if !self.enabled() {
            return None;
        }
        match shape {
            Shape::Rectangular => self.rectangular.as_ref(),
            Shape::Rounded => self.rounded.as_ref(),
        }
    }

    pub unsafe fn push_shader(&self, gl: &ffi::Gles2, shape: Shape) -> bool {
        let Some(program) = self.program(shape) else {
            return false;
        };
        gl.UseProgram(program.composite.program);
        true
    }

    pub unsafe fn set_parameters(
        &self,
        gl: &ffi::Gles2,
        shape: Shape,
        params: &Parameters,
    ) -> bool {
        let Some(program) = self.program(shape) else {
            return false;
        };

        program.composite.set_parameters(gl, params);

        let p = &self.params;
        let size = params.background.size;
        gl.Uniform2f(program.uniform_rect_size, size.w as f32, size.h as f32);
        gl.Uniform1f(program.uniform_edge_size, p.edge_size_for(size));
        gl.Uniform1f(program.uniform_corner_radius, p.corner_radius as f32);
        gl.Uniform1f(program.uniform_strength, p.strength as f32);
        gl.Uniform1f(program.uniform_normal_pow, p.normal_pow as f32);
        gl.Uniform1f(program.uniform_rgb_fringing, p.rgb_fringing as f32);
        gl.Uniform1i(program.uniform_texture_repeat_mode, p.texture_repeat_mode);
        gl.Uniform1i(program.uniform_mode, p.mode);

        true
    }

    pub unsafe fn draw(&self, gl: &ffi::Gles2, shape: Shape, vertices: &[f32]) {
        if let Some(program) = self.program(shape) {
            draw_triangles(gl, program.composite.attrib_vert, vertices);
        }
    }

    pub fn destroy(&mut self, renderer: &mut GlesRenderer) -> Result<(), GlesError> {
        let programs = [self.rectangular.take(), self.rounded.take()];
        renderer.with_context(move |gl| unsafe {
            for program in programs.into_iter().flatten() {
                gl.DeleteProgram(program.composite.program);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn settings_are_converted() {
        let params = RefractionParams::from_settings(&Refraction {
            edge_size: 3,
            corner_radius: 41,
            strength: 15,
            normal_pow: 3,
            rgb_fringing: 6,
            texture_repeat_mode: 1,
            mode: 1,
        });

        assert!(params.enabled);
        assert_abs_diff_eq!(params.edge_size, 30.);
        // 41 px snaps to the sixth step.
        assert_abs_diff_eq!(params.corner_radius, 40., epsilon = 1e-9);
        assert_abs_diff_eq!(params.strength, 0.5);
        assert_abs_diff_eq!(params.normal_pow, 1.5);
        assert_abs_diff_eq!(params.rgb_fringing, 0.2, epsilon = 1e-12);
        assert_eq!(params.texture_repeat_mode, 1);
        assert_eq!(params.mode, 1);
    }

    #[test]
    fn zero_strength_disables() {
        let params = RefractionParams::from_settings(&Refraction::default());
        assert!(!params.enabled);

        let pass = RefractionPass::new(&Refraction {
            strength: 10,
            ..Refraction::default()
        });
        assert!(pass.params().enabled);
        // Not compiled yet.
        assert!(!pass.enabled());
    }

    #[test]
    fn edge_size_is_clamped_to_background() {
        let params = RefractionParams::from_settings(&Refraction {
            edge_size: 8,
            strength: 1,
            ..Refraction::default()
        });
        assert_eq!(params.edge_size_for(Size::from((1000, 1000))), 80.);
        assert_eq!(params.edge_size_for(Size::from((1000, 101))), 50.);
    }
}
