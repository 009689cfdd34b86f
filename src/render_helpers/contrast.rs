use anyhow::Context as _;
use glam::{Mat4, Vec4};
use smithay::backend::renderer::gles::{ffi, GlesError, GlesRenderer};

use crate::render_helpers::background_effect::{Parameters, Shape};
use crate::render_helpers::shaders::{
    attrib, compile_program, draw_triangles, fragment_source, set_mat3, set_mat4, uniform,
    COMPOSITE_VERT,
};

/// Program drawing the blurred background onto the output.
///
/// Samples level 1 with the upsample kernel, so it doubles as the final upsample step.
#[derive(Debug)]
pub struct CompositeProgram {
    pub program: ffi::types::GLuint,
    pub attrib_vert: ffi::types::GLint,
    uniform_mvp: ffi::types::GLint,
    uniform_bg_rect: ffi::types::GLint,
    uniform_tex: ffi::types::GLint,
    uniform_color_matrix: ffi::types::GLint,
    uniform_half_pixel: ffi::types::GLint,
    uniform_offset: ffi::types::GLint,
    uniform_opacity: ffi::types::GLint,
    uniform_box: ffi::types::GLint,
    uniform_corner_radius: ffi::types::GLint,
}

impl CompositeProgram {
    pub unsafe fn compile(gl: &ffi::Gles2, body: &str, shape: Shape) -> Result<Self, GlesError> {
        let defines: &[&str] = match shape {
            Shape::Rectangular => &[],
            Shape::Rounded => &["ROUNDED"],
        };
        let fragment = fragment_source(defines, body);
        let program = unsafe { compile_program(gl, COMPOSITE_VERT, &fragment)? };

        Ok(Self {
            program,
            attrib_vert: attrib(gl, program, c"vert"),
            uniform_mvp: uniform(gl, program, c"mvp"),
            uniform_bg_rect: uniform(gl, program, c"bg_rect"),
            uniform_tex: uniform(gl, program, c"tex"),
            uniform_color_matrix: uniform(gl, program, c"color_matrix"),
            uniform_half_pixel: uniform(gl, program, c"half_pixel"),
            uniform_offset: uniform(gl, program, c"offset"),
            uniform_opacity: uniform(gl, program, c"opacity"),
            uniform_box: uniform(gl, program, c"box"),
            uniform_corner_radius: uniform(gl, program, c"corner_radius"),
        })
    }

    /// Sets the uniforms every composite program has. Expects the program to be in use.
    pub unsafe fn set_parameters(&self, gl: &ffi::Gles2, params: &Parameters) {
        let [x, y, w, h] = params.background_uniform();
        let [hx, hy] = params.half_pixel;

        set_mat3(gl, self.uniform_mvp, params.projection);
        gl.Uniform4f(self.uniform_bg_rect, x, y, w, h);
        gl.Uniform1i(self.uniform_tex, 0);
        set_mat4(gl, self.uniform_color_matrix, params.color_matrix);
        gl.Uniform2f(self.uniform_half_pixel, hx, hy);
        gl.Uniform1f(self.uniform_offset, params.offset);
        gl.Uniform1f(self.uniform_opacity, params.opacity);

        let [bx, by, bw, bh] = params.box_uniform();
        gl.Uniform4f(self.uniform_box, bx, by, bw, bh);
        let [tl, tr, br, bl] = params.corner_radius_uniform();
        gl.Uniform4f(self.uniform_corner_radius, tl, tr, br, bl);
    }
}

/// Compiles both shape variants of a composite program.
///
/// A failure is logged and leaves that variant empty.
pub fn compile_variants<T>(
    renderer: &mut GlesRenderer,
    name: &str,
    compile: impl Fn(&ffi::Gles2, Shape) -> Result<T, GlesError>,
) -> (Option<T>, Option<T>) {
    let res = renderer
        .with_context(|gl| {
            let rectangular = compile(gl, Shape::Rectangular)
                .with_context(|| format!("error compiling rectangular {name} shader"));
            let rounded = compile(gl, Shape::Rounded)
                .with_context(|| format!("error compiling rounded {name} shader"));
            (rectangular, rounded)
        })
        .context("error making GL context current");

    let (rectangular, rounded) = match res {
        Ok(programs) => programs,
        Err(err) => {
            warn!("{err:?}");
            return (None, None);
        }
    };

    let rectangular = rectangular.map_err(|err| warn!("{err:?}")).ok();
    let rounded = rounded.map_err(|err| warn!("{err:?}")).ok();
    (rectangular, rounded)
}

/// Applies the color matrix while drawing the blurred background.
#[derive(Debug, Default)]
pub struct ContrastPass {
    rectangular: Option<CompositeProgram>,
    rounded: Option<CompositeProgram>,
}

impl ContrastPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&mut self, renderer: &mut GlesRenderer) {
        let _span = tracy_client::span!("ContrastPass::compile");

        let (rectangular, rounded) = compile_variants(renderer, "contrast", |gl, shape| unsafe {
            CompositeProgram::compile(gl, include_str!("shaders/contrast.frag"), shape)
        });
        self.rectangular = rectangular;
        self.rounded = rounded;
    }

    /// Whether the rectangular program is available. The rounded one is optional.
    pub fn ready(&self) -> bool {
        self.rectangular.is_some()
    }

    pub fn program(&self, shape: Shape) -> Option<&CompositeProgram> {
        match shape {
            Shape::Rectangular => self.rectangular.as_ref(),
            Shape::Rounded => self.rounded.as_ref(),
        }
    }

    pub unsafe fn push_shader(&self, gl: &ffi::Gles2, shape: Shape) -> bool {
        let Some(program) = self.program(shape) else {
            return false;
        };
        gl.UseProgram(program.program);
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
        program.set_parameters(gl, params);
        true
    }

    pub unsafe fn draw(&self, gl: &ffi::Gles2, shape: Shape, vertices: &[f32]) {
        if let Some(program) = self.program(shape) {
            draw_triangles(gl, program.attrib_vert, vertices);
        }
    }

    pub fn destroy(&mut self, renderer: &mut GlesRenderer) -> Result<(), GlesError> {
        let programs = [self.rectangular.take(), self.rounded.take()];
        renderer.with_context(move |gl| unsafe {
            for program in programs.into_iter().flatten() {
                gl.DeleteProgram(program.program);
            }
        })
    }
}

/// Brightness, then saturation, then contrast, combined into one matrix.
pub fn color_matrix(brightness: f32, saturation: f32, contrast: f32) -> Mat4 {
    // Rec. 709 luma weights.
    let r = (1. - saturation) * 0.2126;
    let g = (1. - saturation) * 0.7152;
    let b = (1. - saturation) * 0.0722;
    let saturation_matrix = Mat4::from_cols(
        Vec4::new(r + saturation, r, r, 0.),
        Vec4::new(g, g + saturation, g, 0.),
        Vec4::new(b, b, b + saturation, 0.),
        Vec4::W,
    );

    let brightness_matrix = Mat4::from_diagonal(Vec4::new(brightness, brightness, brightness, 1.));

    let translate = (1. - contrast) / 2.;
    let contrast_matrix = Mat4::from_cols(
        Vec4::new(contrast, 0., 0., 0.),
        Vec4::new(0., contrast, 0., 0.),
        Vec4::new(0., 0., contrast, 0.),
        Vec4::new(translate, translate, translate, 1.),
    );

    contrast_matrix * saturation_matrix * brightness_matrix
}
