use std::ffi::CStr;

use glam::{Mat3, Mat4};
use smithay::backend::renderer::gles::{ffi, link_program, GlesError};
use smithay::utils::{Physical, Rectangle, Size};

const VERSION: &str = "#version 100\n";

const FRAGMENT_PRECISION: &str = "\
#ifdef GL_FRAGMENT_PRECISION_HIGH
precision highp float;
#else
precision mediump float;
#endif
";

pub const BLUR_VERT: &str = include_str!("shaders/blur.vert");
pub const COMPOSITE_VERT: &str = include_str!("shaders/composite.vert");

const KAWASE: &str = include_str!("shaders/kawase.glsl");
const ROUNDED_BOX: &str = include_str!("shaders/rounded_box.glsl");

pub fn vertex_source(body: &str) -> String {
    format!("{VERSION}{body}")
}

/// Assembles a fragment shader from `body` and the shared helper functions.
///
/// `defines` are emitted as `#define` lines before any other code.
pub fn fragment_source(defines: &[&str], body: &str) -> String {
    let mut src = String::from(VERSION);
    for define in defines {
        src.push_str("#define ");
        src.push_str(define);
        src.push('\n');
    }
    src.push_str(FRAGMENT_PRECISION);
    src.push_str(ROUNDED_BOX);
    src.push_str(KAWASE);
    src.push_str(body);
    src
}

/// Compiles and links a program.
pub unsafe fn compile_program(
    gl: &ffi::Gles2,
    vert: &str,
    frag: &str,
) -> Result<ffi::types::GLuint, GlesError> {
    unsafe { link_program(gl, &vertex_source(vert), frag) }
}

pub unsafe fn uniform(
    gl: &ffi::Gles2,
    program: ffi::types::GLuint,
    name: &CStr,
) -> ffi::types::GLint {
    gl.GetUniformLocation(program, name.as_ptr())
}

pub unsafe fn attrib(
    gl: &ffi::Gles2,
    program: ffi::types::GLuint,
    name: &CStr,
) -> ffi::types::GLint {
    gl.GetAttribLocation(program, name.as_ptr())
}

pub unsafe fn set_mat3(gl: &ffi::Gles2, location: ffi::types::GLint, m: Mat3) {
    gl.UniformMatrix3fv(location, 1, ffi::FALSE, m.to_cols_array().as_ptr());
}

pub unsafe fn set_mat4(gl: &ffi::Gles2, location: ffi::types::GLint, m: Mat4) {
    gl.UniformMatrix4fv(location, 1, ffi::FALSE, m.to_cols_array().as_ptr());
}

/// Binds `tex` to texture unit 0 with the given filtering and wrapping.
pub unsafe fn bind_texture(
    gl: &ffi::Gles2,
    tex: ffi::types::GLuint,
    filter: ffi::types::GLenum,
    wrap: ffi::types::GLenum,
) {
    gl.ActiveTexture(ffi::TEXTURE0);
    gl.BindTexture(ffi::TEXTURE_2D, tex);
    gl.TexParameteri(ffi::TEXTURE_2D, ffi::TEXTURE_MIN_FILTER, filter as i32);
    gl.TexParameteri(ffi::TEXTURE_2D, ffi::TEXTURE_MAG_FILTER, filter as i32);
    gl.TexParameteri(ffi::TEXTURE_2D, ffi::TEXTURE_WRAP_S, wrap as i32);
    gl.TexParameteri(ffi::TEXTURE_2D, ffi::TEXTURE_WRAP_T, wrap as i32);
}

/// Draws `vertices`, as x, y pairs in client memory, as a triangle list.
pub unsafe fn draw_triangles(gl: &ffi::Gles2, attrib_vert: ffi::types::GLint, vertices: &[f32]) {
    let Ok(attrib_vert) = u32::try_from(attrib_vert) else {
        return;
    };

    gl.EnableVertexAttribArray(attrib_vert);
    gl.BindBuffer(ffi::ARRAY_BUFFER, 0);
    gl.VertexAttribPointer(attrib_vert, 2, ffi::FLOAT, ffi::FALSE, 0, vertices.as_ptr().cast());
    gl.DrawArrays(ffi::TRIANGLES, 0, (vertices.len() / 2) as i32);
    gl.DisableVertexAttribArray(attrib_vert);
}

/// Unit quad covering the whole viewport of an offscreen pass.
pub const UNIT_QUAD: [f32; 12] = [0., 0., 0., 1., 1., 1., 0., 0., 1., 1., 1., 0.];

/// Two triangles per rectangle.
pub fn rect_vertices(rects: &[Rectangle<i32, Physical>]) -> Vec<f32> {
    let mut vertices = Vec::with_capacity(rects.len() * 12);
    for r in rects {
        let x1 = r.loc.x as f32;
        let y1 = r.loc.y as f32;
        let x2 = (r.loc.x + r.size.w) as f32;
        let y2 = (r.loc.y + r.size.h) as f32;
        vertices.extend_from_slice(&[x1, y1, x1, y2, x2, y2, x1, y1, x2, y2, x2, y1]);
    }
    vertices
}

/// Maps framebuffer pixels to normalized device coordinates.
pub fn projection(size: Size<i32, Physical>) -> Mat3 {
    let w = size.w.max(1) as f32;
    let h = size.h.max(1) as f32;
    Mat3::from_cols_array(&[2. / w, 0., 0., 0., 2. / h, 0., -1., -1., 1.])
}
