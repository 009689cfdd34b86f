use anyhow::Context as _;
use smithay::backend::renderer::gles::{ffi, GlesError, GlesRenderer, GlesTexture};
use smithay::backend::renderer::Texture as _;

use crate::render_helpers::background_effect::Parameters;
use crate::render_helpers::shaders::{
    attrib, bind_texture, compile_program, draw_triangles, fragment_source, set_mat3, uniform,
    COMPOSITE_VERT,
};

#[derive(Debug)]
struct RoundedCornersProgram {
    program: ffi::types::GLuint,
    attrib_vert: ffi::types::GLint,
    uniform_mvp: ffi::types::GLint,
    uniform_bg_rect: ffi::types::GLint,
    uniform_tex: ffi::types::GLint,
    uniform_box: ffi::types::GLint,
    uniform_corner_radius: ffi::types::GLint,
}

/// Puts the unblurred background back outside the rounded window corners.
///
/// Used after a rectangular composite when no rounded composite program is available.
#[derive(Debug, Default)]
pub struct RoundedCornersPass {
    program: Option<RoundedCornersProgram>,
}

impl RoundedCornersPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&mut self, renderer: &mut GlesRenderer) {
        let _span = tracy_client::span!("RoundedCornersPass::compile");

        let res = renderer
            .with_context(|gl| unsafe {
                let body = include_str!("shaders/rounded_corners.frag");
                let program = compile_program(gl, COMPOSITE_VERT, &fragment_source(&[], body))?;
                Ok::<_, GlesError>(RoundedCornersProgram {
                    program,
                    attrib_vert: attrib(gl, program, c"vert"),
                    uniform_mvp: uniform(gl, program, c"mvp"),
                    uniform_bg_rect: uniform(gl, program, c"bg_rect"),
                    uniform_tex: uniform(gl, program, c"tex"),
                    uniform_box: uniform(gl, program, c"box"),
                    uniform_corner_radius: uniform(gl, program, c"corner_radius"),
                })
            })
            .context("error making GL context current")
            .and_then(|res| res.context("error compiling rounded corners shader"));

        match res {
            Ok(program) => self.program = Some(program),
            Err(err) => warn!("{err:?}"),
        }
    }

    pub fn ready(&self) -> bool {
        self.program.is_some()
    }

    /// Draws `raw`, the captured background, outside the rounded box over `vertices`.
    pub unsafe fn apply(
        &self,
        gl: &ffi::Gles2,
        params: &Parameters,
        raw: &GlesTexture,
        vertices: &[f32],
    ) {
        let Some(program) = &self.program else {
            return;
        };
        if !params.has_radius() {
            return;
        }

        trace!("restoring rounded corners from {}", raw.tex_id());

        gl.UseProgram(program.program);

        let [x, y, w, h] = params.background_uniform();
        set_mat3(gl, program.uniform_mvp, params.projection);
        gl.Uniform4f(program.uniform_bg_rect, x, y, w, h);
        gl.Uniform1i(program.uniform_tex, 0);
        let [bx, by, bw, bh] = params.box_uniform();
        gl.Uniform4f(program.uniform_box, bx, by, bw, bh);
        let [tl, tr, br, bl] = params.corner_radius_uniform();
        gl.Uniform4f(program.uniform_corner_radius, tl, tr, br, bl);

        bind_texture(gl, raw.tex_id(), ffi::NEAREST, ffi::CLAMP_TO_EDGE);

        let blend = gl.IsEnabled(ffi::BLEND) == ffi::TRUE;
        gl.Enable(ffi::BLEND);
        gl.BlendFunc(ffi::ONE, ffi::ONE_MINUS_SRC_ALPHA);

        draw_triangles(gl, program.attrib_vert, vertices);

        if !blend {
            gl.Disable(ffi::BLEND);
        }
    }

    pub fn destroy(&mut self, renderer: &mut GlesRenderer) -> Result<(), GlesError> {
        let program = self.program.take();
        renderer.with_context(move |gl| unsafe {
            if let Some(program) = program {
                gl.DeleteProgram(program.program);
            }
        })
    }
}
