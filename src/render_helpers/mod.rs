pub mod background_effect;
pub mod blur;
pub mod contrast;
pub mod noise;
pub mod refraction;
pub mod rounded_corners;
pub mod shaders;
pub mod strength;
