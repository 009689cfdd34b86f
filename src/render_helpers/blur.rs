use std::iter::zip;

use anyhow::{ensure, Context as _};
use smithay::backend::renderer::gles::{ffi, GlesError, GlesRenderer, GlesTexture};
use smithay::backend::renderer::Texture as _;
use smithay::utils::{Buffer, Physical, Rectangle, Size};

use crate::render_helpers::shaders::{
    attrib, bind_texture, compile_program, draw_triangles, fragment_source, uniform, BLUR_VERT,
    UNIT_QUAD,
};
use crate::utils::texture_size;

/// The dual Kawase down- and upsample programs.
#[derive(Debug)]
pub struct BlurProgram {
    down: BlurProgramInternal,
    up: BlurProgramInternal,
}

#[derive(Debug)]
struct BlurProgramInternal {
    program: ffi::types::GLuint,
    uniform_tex: ffi::types::GLint,
    uniform_half_pixel: ffi::types::GLint,
    uniform_offset: ffi::types::GLint,
    attrib_vert: ffi::types::GLint,
}

unsafe fn compile_blur_program(
    gl: &ffi::Gles2,
    body: &str,
) -> Result<BlurProgramInternal, GlesError> {
    let program = unsafe { compile_program(gl, BLUR_VERT, &fragment_source(&[], body))? };

    Ok(BlurProgramInternal {
        program,
        uniform_tex: uniform(gl, program, c"tex"),
        uniform_half_pixel: uniform(gl, program, c"half_pixel"),
        uniform_offset: uniform(gl, program, c"offset"),
        attrib_vert: attrib(gl, program, c"vert"),
    })
}

impl BlurProgram {
    pub fn compile(renderer: &mut GlesRenderer) -> anyhow::Result<Self> {
        renderer
            .with_context(move |gl| unsafe {
                let down = compile_blur_program(gl, include_str!("shaders/blur_down.frag"))
                    .context("error compiling blur_down shader")?;
                let up = match compile_blur_program(gl, include_str!("shaders/blur_up.frag")) {
                    Ok(up) => up,
                    Err(err) => {
                        gl.DeleteProgram(down.program);
                        return Err(anyhow::Error::new(err).context("error compiling blur_up shader"));
                    }
                };
                Ok(Self { down, up })
            })
            .context("error making GL context current")?
    }

    pub fn destroy(self, renderer: &mut GlesRenderer) -> Result<(), GlesError> {
        renderer.with_context(move |gl| unsafe {
            gl.DeleteProgram(self.down.program);
            gl.DeleteProgram(self.up.program);
        })
    }

    /// Runs the downsample chain over every level, then upsamples back into level 1.
    ///
    /// Level 0 must hold the captured background. The last upsample into the output is left to
    /// the composite pass. Expects a bound draw framebuffer that can be retargeted.
    pub unsafe fn render(&self, gl: &ffi::Gles2, textures: &[GlesTexture], offset: f32) {
        let _span = tracy_client::span!("BlurProgram::render");

        if textures.len() < 2 {
            return;
        }

        gl.Disable(ffi::BLEND);
        gl.Disable(ffi::SCISSOR_TEST);

        let program = &self.down;
        gl.UseProgram(program.program);
        gl.Uniform1i(program.uniform_tex, 0);
        gl.Uniform1f(program.uniform_offset, offset);

        for (src, dst) in zip(textures, &textures[1..]) {
            let dst_size = dst.size();
            let w = dst_size.w;
            let h = dst_size.h;
            gl.Viewport(0, 0, w, h);

            // During downsampling, half_pixel is half of the destination pixel.
            gl.Uniform2f(program.uniform_half_pixel, 0.5 / w as f32, 0.5 / h as f32);

            trace!("drawing down {} to {}", src.tex_id(), dst.tex_id());
            attach(gl, dst);
            bind_texture(gl, src.tex_id(), ffi::LINEAR, ffi::CLAMP_TO_EDGE);
            draw_triangles(gl, program.attrib_vert, &UNIT_QUAD);
        }

        let program = &self.up;
        gl.UseProgram(program.program);
        gl.Uniform1i(program.uniform_tex, 0);
        gl.Uniform1f(program.uniform_offset, offset);

        // Level 1 is the smallest destination, level 0 keeps the raw capture.
        let levels = textures.get(1..).unwrap_or_default();
        let src = levels.iter().rev();
        let dst = levels.iter().rev().skip(1);
        for (src, dst) in zip(src, dst) {
            let dst_size = dst.size();
            gl.Viewport(0, 0, dst_size.w, dst_size.h);

            // During upsampling, half_pixel is half of the source pixel.
            let src_size = src.size();
            gl.Uniform2f(
                program.uniform_half_pixel,
                0.5 / src_size.w as f32,
                0.5 / src_size.h as f32,
            );

            trace!("drawing up {} to {}", src.tex_id(), dst.tex_id());
            attach(gl, dst);
            bind_texture(gl, src.tex_id(), ffi::LINEAR, ffi::CLAMP_TO_EDGE);
            draw_triangles(gl, program.attrib_vert, &UNIT_QUAD);
        }
    }
}

unsafe fn attach(gl: &ffi::Gles2, texture: &GlesTexture) {
    gl.FramebufferTexture2D(
        ffi::DRAW_FRAMEBUFFER,
        ffi::COLOR_ATTACHMENT0,
        ffi::TEXTURE_2D,
        texture.tex_id(),
        0,
    );
}

/// Copies `rects` of the bound read framebuffer into `target`, which covers `background`.
pub unsafe fn capture(
    gl: &ffi::Gles2,
    target: &GlesTexture,
    background: Rectangle<i32, Physical>,
    rects: &[Rectangle<i32, Physical>],
) -> Result<(), GlesError> {
    let _span = tracy_client::span!("blur::capture");

    while gl.GetError() != ffi::NO_ERROR {}

    attach(gl, target);
    gl.Disable(ffi::SCISSOR_TEST);

    for r in rects {
        let x = r.loc.x - background.loc.x;
        let y = r.loc.y - background.loc.y;
        gl.BlitFramebuffer(
            r.loc.x,
            r.loc.y,
            r.loc.x + r.size.w,
            r.loc.y + r.size.h,
            x,
            y,
            x + r.size.w,
            y + r.size.h,
            ffi::COLOR_BUFFER_BIT,
            ffi::NEAREST,
        );
    }

    if gl.GetError() != ffi::NO_ERROR {
        Err(GlesError::BlitError)
    } else {
        Ok(())
    }
}

/// A texture that can back one blur level.
pub trait LevelTexture {
    fn level_size(&self) -> Size<i32, Buffer>;

    /// Whether nothing else holds on to the texture.
    fn is_unique(&self) -> bool {
        true
    }
}

impl LevelTexture for GlesTexture {
    fn level_size(&self) -> Size<i32, Buffer> {
        self.size()
    }

    fn is_unique(&self) -> bool {
        self.is_unique_reference()
    }
}

/// Textures of one window on one output: the raw capture followed by the downsample levels.
#[derive(Debug)]
pub struct BlurRenderData<T> {
    textures: Vec<T>,
    /// Background size the textures were created for.
    size: Option<Size<i32, Physical>>,
}

impl<T> Default for BlurRenderData<T> {
    fn default() -> Self {
        Self {
            textures: Vec::new(),
            size: None,
        }
    }
}

impl<T: LevelTexture> BlurRenderData<T> {
    pub fn textures(&self) -> &[T] {
        &self.textures
    }

    pub fn size(&self) -> Option<Size<i32, Physical>> {
        self.size
    }

    /// Makes sure there are `iterations + 1` textures for a background of `size`.
    ///
    /// Returns `true` when the textures were recreated and their contents are undefined.
    pub fn prepare(
        &mut self,
        size: Size<i32, Physical>,
        iterations: usize,
        mut create: impl FnMut(Size<i32, Buffer>) -> anyhow::Result<T>,
    ) -> anyhow::Result<bool> {
        let _span = tracy_client::span!("BlurRenderData::prepare");

        ensure!(size.w > 0 && size.h > 0, "empty background {size:?}");

        if self.size == Some(size)
            && self.textures.len() == iterations + 1
            && self.textures.iter().all(|t| t.is_unique())
        {
            return Ok(false);
        }

        if let Some(old) = self.size {
            debug!(
                "recreating blur textures: {} × {} with {} levels to {} × {} with {}",
                old.w,
                old.h,
                self.textures.len(),
                size.w,
                size.h,
                iterations + 1
            );
        }

        self.textures.clear();
        self.size = None;

        for level in 0..=iterations {
            let texture = create(texture_size(size, level))
                .with_context(|| format!("error creating blur texture for level {level}"))?;
            debug_assert_eq!(texture.level_size(), texture_size(size, level));
            self.textures.push(texture);
        }

        self.size = Some(size);
        Ok(true)
    }
}
