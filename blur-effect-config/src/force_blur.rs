use serde::Deserialize;

/// How the window class list selects windows to force blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Listed windows are blurred.
    Whitelist,
    /// Everything except the listed windows is blurred.
    Blacklist,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ForceBlur {
    /// Newline-separated window classes. Lines wrapped in `/` are regular expressions.
    pub window_classes: String,
    /// `true` for [`MatchMode::Whitelist`], `false` for [`MatchMode::Blacklist`].
    pub blur_matching: bool,
    pub blur_decorations: bool,
    pub blur_menus: bool,
    pub blur_docks: bool,
}

impl Default for ForceBlur {
    fn default() -> Self {
        Self {
            window_classes: String::new(),
            blur_matching: true,
            blur_decorations: false,
            blur_menus: false,
            blur_docks: false,
        }
    }
}

impl ForceBlur {
    pub fn match_mode(&self) -> MatchMode {
        if self.blur_matching {
            MatchMode::Whitelist
        } else {
            MatchMode::Blacklist
        }
    }
}
