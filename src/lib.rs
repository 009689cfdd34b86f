#[macro_use]
extern crate tracing;

pub mod animation;
pub mod effect;
pub mod host;
pub mod render_helpers;
pub mod utils;
pub mod window;
