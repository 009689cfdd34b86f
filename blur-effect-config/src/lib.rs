//! Settings for the blur effect.
//!
//! The settings document is JSON with kebab-case keys. Every field has a default, so an empty
//! object (or a missing file) yields the default configuration.

#[macro_use]
extern crate tracing;

use std::fs;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Deserializer};

pub mod appearance;
pub mod force_blur;
pub mod refraction;

pub use crate::appearance::CornerRadius;
pub use crate::force_blur::{ForceBlur, MatchMode};
pub use crate::refraction::Refraction;

/// Number of steps on the blur strength slider.
pub const BLUR_STRENGTH_STEPS: u32 = 15;

/// Largest noise strength that still produces a usable dither.
pub const MAX_NOISE_STRENGTH: u32 = 14;

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub general: General,
    pub force_blur: ForceBlur,
    pub refraction: Refraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct General {
    /// Blur strength, `1..=BLUR_STRENGTH_STEPS`.
    pub blur_strength: u32,
    /// Noise dither strength, 0 disables the noise pass.
    pub noise_strength: u32,
    /// Brightness factor, read from a percentage.
    #[serde(deserialize_with = "percent")]
    pub brightness: f64,
    /// Saturation factor, read from a percentage.
    #[serde(deserialize_with = "percent")]
    pub saturation: f64,
    /// Contrast factor, read from a percentage.
    #[serde(deserialize_with = "percent")]
    pub contrast: f64,
    /// Ignore brightness/saturation/contrast values requested by windows.
    pub force_contrast_params: bool,
    /// Corner radius in logical pixels applied to force-blurred windows.
    pub corner_radius: f64,
}

impl Default for General {
    fn default() -> Self {
        Self {
            blur_strength: BLUR_STRENGTH_STEPS,
            noise_strength: 5,
            brightness: 1.,
            saturation: 1.,
            contrast: 1.,
            force_contrast_params: false,
            corner_radius: 0.,
        }
    }
}

fn percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Ok(value / 100.)
}

impl Settings {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let settings: Self = serde_json::from_str(text).context("error parsing settings")?;
        Ok(settings.sanitized())
    }

    /// Reads the settings from `path`.
    ///
    /// Errors are not fatal: they are logged and the default settings are returned.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!("error reading settings from {path:?}, using defaults: {err}");
                return Self::default();
            }
        };

        match Self::parse(&text) {
            Ok(settings) => {
                debug!("loaded settings from {path:?}");
                settings
            }
            Err(err) => {
                warn!("{err:?}");
                Self::default()
            }
        }
    }

    fn sanitized(mut self) -> Self {
        let general = &mut self.general;

        let strength = general.blur_strength.clamp(1, BLUR_STRENGTH_STEPS);
        if strength != general.blur_strength {
            warn!(
                "blur-strength {} out of range, clamping to {strength}",
                general.blur_strength
            );
            general.blur_strength = strength;
        }

        general.noise_strength = general.noise_strength.min(MAX_NOISE_STRENGTH);
        general.brightness = general.brightness.max(0.);
        general.saturation = general.saturation.max(0.);
        general.contrast = general.contrast.max(0.);
        general.corner_radius = general.corner_radius.max(0.);

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let settings = Settings::parse("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.general.blur_strength, 15);
        assert_eq!(settings.force_blur.match_mode(), MatchMode::Whitelist);
    }

    #[test]
    fn percentages_are_normalized() {
        let settings = Settings::parse(
            r#"{
                "general": {
                    "brightness": 90,
                    "saturation": 150,
                    "contrast": 110
                }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.general.brightness, 0.9);
        assert_eq!(settings.general.saturation, 1.5);
        assert_eq!(settings.general.contrast, 1.1);
    }

    #[test]
    fn strength_is_clamped() {
        let settings = Settings::parse(r#"{ "general": { "blur-strength": 40 } }"#).unwrap();
        assert_eq!(settings.general.blur_strength, BLUR_STRENGTH_STEPS);

        let settings = Settings::parse(r#"{ "general": { "blur-strength": 0 } }"#).unwrap();
        assert_eq!(settings.general.blur_strength, 1);
    }

    #[test]
    fn force_blur_section() {
        let settings = Settings::parse(
            r#"{
                "force-blur": {
                    "window-classes": "org.kde.dolphin\n/^kitty$/",
                    "blur-matching": false,
                    "blur-decorations": true
                }
            }"#,
        )
        .unwrap();

        let force_blur = &settings.force_blur;
        assert_eq!(force_blur.match_mode(), MatchMode::Blacklist);
        assert!(force_blur.blur_decorations);
        assert!(!force_blur.blur_docks);
        assert!(!force_blur.blur_menus);
        insta::assert_snapshot!(force_blur.window_classes, @r"
        org.kde.dolphin
        /^kitty$/
        ");
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(Settings::parse("{ \"general\": 5 }").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/blur-effect/settings.json"));
        assert_eq!(settings, Settings::default());
    }
}
