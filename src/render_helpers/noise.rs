use anyhow::Context as _;
use smithay::backend::allocator::Fourcc;
use smithay::backend::renderer::gles::{ffi, GlesError, GlesRenderer, GlesTexture};
use smithay::backend::renderer::{ImportMem as _, Texture as _};
use smithay::utils::{Buffer, Size};

use crate::render_helpers::background_effect::{Parameters, Shape};
use crate::render_helpers::contrast::compile_variants;
use crate::render_helpers::shaders::{
    attrib, bind_texture, compile_program, draw_triangles, fragment_source, set_mat3, uniform,
    COMPOSITE_VERT,
};

/// Side of the noise tile before scaling.
pub const NOISE_SIZE: i32 = 256;

/// A square grayscale noise tile as RGBA bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseImage {
    pub size: i32,
    pub data: Vec<u8>,
}

/// Generates a `NOISE_SIZE` tile with values below `strength`, upscaled by `scale` with nearest
/// neighbor sampling.
pub fn noise_image(strength: u32, scale: i32, rng: &mut fastrand::Rng) -> NoiseImage {
    let scale = scale.max(1);
    let strength = u8::try_from(strength).unwrap_or(u8::MAX);

    let base: Vec<u8> = (0..NOISE_SIZE * NOISE_SIZE)
        .map(|_| if strength == 0 { 0 } else { rng.u8(..strength) })
        .collect();

    let size = NOISE_SIZE * scale;
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        let row = (y / scale) * NOISE_SIZE;
        for x in 0..size {
            let value = base[(row + x / scale) as usize];
            data.extend_from_slice(&[value, value, value, 255]);
        }
    }

    NoiseImage { size, data }
}

#[derive(Debug)]
struct NoiseProgram {
    program: ffi::types::GLuint,
    attrib_vert: ffi::types::GLint,
    uniform_mvp: ffi::types::GLint,
    uniform_bg_rect: ffi::types::GLint,
    uniform_noise_tex: ffi::types::GLint,
    uniform_noise_size: ffi::types::GLint,
    uniform_opacity: ffi::types::GLint,
    uniform_box: ffi::types::GLint,
    uniform_corner_radius: ffi::types::GLint,
}

impl NoiseProgram {
    unsafe fn compile(gl: &ffi::Gles2, shape: Shape) -> Result<Self, GlesError> {
        let defines: &[&str] = match shape {
            Shape::Rectangular => &[],
            Shape::Rounded => &["ROUNDED"],
        };
        let body = include_str!("shaders/noise.frag");
        let fragment = fragment_source(defines, body);
        let program = unsafe { compile_program(gl, COMPOSITE_VERT, &fragment)? };

        Ok(Self {
            program,
            attrib_vert: attrib(gl, program, c"vert"),
            uniform_mvp: uniform(gl, program, c"mvp"),
            uniform_bg_rect: uniform(gl, program, c"bg_rect"),
            uniform_noise_tex: uniform(gl, program, c"noise_tex"),
            uniform_noise_size: uniform(gl, program, c"noise_size"),
            uniform_opacity: uniform(gl, program, c"opacity"),
            uniform_box: uniform(gl, program, c"box"),
            uniform_corner_radius: uniform(gl, program, c"corner_radius"),
        })
    }
}

#[derive(Debug)]
struct NoiseTexture {
    texture: GlesTexture,
    strength: u32,
    scale: i32,
}

/// Adds a static dither on top of the blur to hide banding.
#[derive(Debug, Default)]
pub struct NoisePass {
    rectangular: Option<NoiseProgram>,
    rounded: Option<NoiseProgram>,
    texture: Option<NoiseTexture>,
}

impl NoisePass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&mut self, renderer: &mut GlesRenderer) {
        let _span = tracy_client::span!("NoisePass::compile");

        let (rectangular, rounded) = compile_variants(renderer, "noise", |gl, shape| unsafe {
            NoiseProgram::compile(gl, shape)
        });
        self.rectangular = rectangular;
        self.rounded = rounded;
    }

    pub fn ready(&self) -> bool {
        self.rectangular.is_some()
    }

    /// Makes sure the noise texture matches `strength` and `scale`.
    ///
    /// Returns `false` when there is nothing to draw.
    pub fn prepare(
        &mut self,
        renderer: &mut GlesRenderer,
        strength: u32,
        scale: i32,
    ) -> anyhow::Result<bool> {
        if strength == 0 || !self.ready() {
            self.texture = None;
            return Ok(false);
        }

        if let Some(texture) = &self.texture {
            if texture.strength == strength && texture.scale == scale {
                return Ok(true);
            }
        }

        let _span = tracy_client::span!("NoisePass::prepare");
        debug!("generating noise texture with strength {strength} at scale {scale}");

        let image = noise_image(strength, scale, &mut fastrand::Rng::new());
        let size = Size::<i32, Buffer>::from((image.size, image.size));
        let texture = renderer
            .import_memory(&image.data, Fourcc::Abgr8888, size, false)
            .context("error importing noise texture")?;

        self.texture = Some(NoiseTexture {
            texture,
            strength,
            scale,
        });
        Ok(true)
    }

    /// Draws the noise over `vertices` with additive blending.
    pub unsafe fn apply(
        &self,
        gl: &ffi::Gles2,
        shape: Shape,
        params: &Parameters,
        vertices: &[f32],
    ) {
        let Some(noise) = &self.texture else {
            return;
        };
        let program = match shape {
            Shape::Rounded => self.rounded.as_ref().or(self.rectangular.as_ref()),
            Shape::Rectangular => self.rectangular.as_ref(),
        };
        let Some(program) = program else {
            return;
        };

        gl.UseProgram(program.program);

        let [x, y, w, h] = params.background_uniform();
        set_mat3(gl, program.uniform_mvp, params.projection);
        gl.Uniform4f(program.uniform_bg_rect, x, y, w, h);
        gl.Uniform1i(program.uniform_noise_tex, 0);
        let size = noise.texture.size();
        gl.Uniform2f(program.uniform_noise_size, size.w as f32, size.h as f32);
        gl.Uniform1f(program.uniform_opacity, params.opacity);
        let [bx, by, bw, bh] = params.box_uniform();
        gl.Uniform4f(program.uniform_box, bx, by, bw, bh);
        let [tl, tr, br, bl] = params.corner_radius_uniform();
        gl.Uniform4f(program.uniform_corner_radius, tl, tr, br, bl);

        bind_texture(gl, noise.texture.tex_id(), ffi::NEAREST, ffi::REPEAT);

        gl.Enable(ffi::BLEND);
        gl.BlendFunc(ffi::ONE, ffi::ONE);

        draw_triangles(gl, program.attrib_vert, vertices);

        gl.BlendFunc(ffi::ONE, ffi::ONE_MINUS_SRC_ALPHA);
    }

    pub fn destroy(&mut self, renderer: &mut GlesRenderer) -> Result<(), GlesError> {
        self.texture = None;
        let programs = [self.rectangular.take(), self.rounded.take()];
        renderer.with_context(move |gl| unsafe {
            for program in programs.into_iter().flatten() {
                gl.DeleteProgram(program.program);
            }
        })
    }
}
