use serde::Deserialize;

/// Raw refraction settings, in the units of the configuration sliders.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Refraction {
    /// Width of the refracting edge, in tens of pixels.
    pub edge_size: u32,
    /// Corner radius of the refracting shape, `0..=200` pixels.
    pub corner_radius: u32,
    /// `0..=30`, 0 disables refraction.
    pub strength: u32,
    pub normal_pow: u32,
    /// `0..=30`.
    pub rgb_fringing: u32,
    /// 0 clamps samples to the edge, 1 mirrors them.
    pub texture_repeat_mode: i32,
    /// 0 bends towards the center, 1 bends outwards.
    pub mode: i32,
}

impl Default for Refraction {
    fn default() -> Self {
        Self {
            edge_size: 2,
            corner_radius: 40,
            strength: 0,
            normal_pow: 2,
            rgb_fringing: 0,
            texture_repeat_mode: 0,
            mode: 0,
        }
    }
}
