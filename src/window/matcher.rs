use blur_effect_config::{ForceBlur, MatchMode};
use regex::Regex;

use crate::host::{HostWindow, StackingLayer, WindowType};

/// Entry matching windows with an empty class.
const BLANK: &str = "$blank";

/// Parsed window class list.
#[derive(Debug, Clone, Default)]
pub struct WindowClasses {
    pub fixed: Vec<String>,
    pub regexes: Vec<Regex>,
}

impl WindowClasses {
    /// Parses a newline separated class list.
    ///
    /// Lines wrapped in slashes are regexes, `$blank` stands for the empty class and `\$blank`
    /// for the literal string. Invalid regexes are skipped.
    pub fn parse(text: &str) -> Self {
        let mut classes = Self::default();

        for line in text.split('\n').filter(|line| !line.is_empty()) {
            if line.len() >= 2 && line.starts_with('/') && line.ends_with('/') {
                let pattern = &line[1..line.len() - 1];
                match Regex::new(pattern) {
                    Ok(regex) => classes.regexes.push(regex),
                    Err(err) => warn!("ignoring malformed window class pattern {pattern:?}: {err}"),
                }
            } else if line == BLANK {
                classes.fixed.push(String::new());
            } else if line == "\\$blank" {
                classes.fixed.push(String::from(BLANK));
            } else {
                classes.fixed.push(line.to_owned());
            }
        }

        classes
    }
}

/// Decides which windows get force-blurred.
#[derive(Debug, Clone)]
pub struct WindowMatcher {
    classes: WindowClasses,
    mode: MatchMode,
    match_menus: bool,
    match_docks: bool,
}

impl WindowMatcher {
    pub fn new(config: &ForceBlur) -> Self {
        Self {
            classes: WindowClasses::parse(&config.window_classes),
            mode: config.match_mode(),
            match_menus: config.blur_menus,
            match_docks: config.blur_docks,
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn classes(&self) -> &WindowClasses {
        &self.classes
    }

    /// Windows that are never force-blurred, whatever the class list says.
    pub fn ignore_window(&self, w: &dyn HostWindow) -> bool {
        let window_type = w.window_type();
        if window_type == WindowType::Desktop {
            return true;
        }

        if !self.match_menus && window_type.is_menu_like() {
            return true;
        }

        if !self.match_docks && window_type == WindowType::Dock {
            return true;
        }

        let class = w.resource_class();
        if class == "xwaylandvideobridge" {
            return true;
        }

        if matches!(class, "spectacle" | "org.kde.spectacle")
            && matches!(w.layer(), StackingLayer::Overlay | StackingLayer::Active)
        {
            return true;
        }

        w.is_internal()
    }

    pub fn matches_fixed(&self, w: &dyn HostWindow) -> bool {
        let class = w.resource_class();
        let name = w.resource_name();
        self.classes
            .fixed
            .iter()
            .any(|entry| entry == class || entry == name)
    }

    pub fn matches_regex(&self, w: &dyn HostWindow) -> bool {
        let class = w.resource_class();
        let name = w.resource_name();
        self.classes
            .regexes
            .iter()
            .any(|regex| regex.is_match(class) || regex.is_match(name))
    }

    pub fn matches(&self, w: &dyn HostWindow) -> bool {
        if self.ignore_window(w) {
            return false;
        }

        let listed = self.matches_fixed(w) || self.matches_regex(w);
        match self.mode {
            MatchMode::Whitelist => listed,
            MatchMode::Blacklist => !listed,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::tests::fixture::TestWindow;

    fn matcher(classes: &str, blur_matching: bool) -> WindowMatcher {
        WindowMatcher::new(&ForceBlur {
            window_classes: classes.to_owned(),
            blur_matching,
            ..ForceBlur::default()
        })
    }

    #[test]
    fn parse_class_list() {
        let classes = WindowClasses::parse("kitty\n\n/^org\\.kde\\./\n$blank\n\\$blank\n/\n//");
        let regexes: Vec<_> = classes.regexes.iter().map(|r| r.as_str()).collect();
        insta::assert_debug_snapshot!((&classes.fixed, regexes), @r#"
        (
            [
                "kitty",
                "",
                "$blank",
                "/",
            ],
            [
                "^org\\.kde\\.",
                "",
            ],
        )
        "#);
    }

    #[test]
    fn malformed_regex_is_skipped() {
        let classes = WindowClasses::parse("/(unclosed/\nfirefox");
        assert!(classes.regexes.is_empty());
        assert_eq!(classes.fixed, ["firefox"]);
    }

    #[test]
    fn regex_is_searched_not_anchored() {
        let matcher = matcher("/kde/", true);
        assert!(matcher.matches(&TestWindow::new(1).with_class("org.kde.dolphin")));
        assert!(!matcher.matches(&TestWindow::new(1).with_class("firefox")));
    }

    #[test]
    fn resource_name_matches_too() {
        let matcher = matcher("dolphin", true);
        let w = TestWindow::new(1)
            .with_class("org.kde.dolphin")
            .with_name("dolphin");
        assert!(matcher.matches_fixed(&w));
    }

    #[test]
    fn blank_matches_empty_class() {
        let matcher = matcher("$blank", true);
        assert!(matcher.matches(&TestWindow::new(1).with_class("")));
        assert!(!matcher.matches(&TestWindow::new(1).with_class("kitty")));
    }

    #[test]
    fn menus_and_docks_follow_settings() {
        let menu = TestWindow::new(1).with_type(WindowType::PopupMenu);
        let dock = TestWindow::new(2).with_type(WindowType::Dock);

        let blacklist = matcher("", false);
        assert!(!blacklist.matches(&menu));
        assert!(!blacklist.matches(&dock));

        let blacklist = WindowMatcher::new(&ForceBlur {
            blur_matching: false,
            blur_menus: true,
            blur_docks: true,
            ..ForceBlur::default()
        });
        assert!(blacklist.matches(&menu));
        assert!(blacklist.matches(&dock));
    }

    #[test]
    fn spectacle_only_ignored_on_top_layers() {
        let matcher = matcher("", false);
        let w = TestWindow::new(1).with_class("org.kde.spectacle");
        assert!(matcher.matches(&w));
        assert!(!matcher.matches(&w.clone().with_layer(StackingLayer::Overlay)));
        assert!(!matcher.matches(&w.with_layer(StackingLayer::Active)));
    }

    #[test]
    fn internal_and_desktop_windows_are_ignored() {
        let matcher = matcher("", false);
        assert!(matcher.ignore_window(&TestWindow::new(1).internal()));
        assert!(matcher.ignore_window(&TestWindow::new(2).with_type(WindowType::Desktop)));
    }

    proptest! {
        #[test]
        fn listed_class_polarity(class in "[a-zA-Z0-9._-]{1,24}") {
            prop_assume!(class != "xwaylandvideobridge");
            let w = TestWindow::new(1).with_class(&class);
            prop_assert!(matcher(&class, true).matches(&w));
            prop_assert!(!matcher(&class, false).matches(&w));
        }

        #[test]
        fn ignored_windows_never_match(
            classes in "[a-z\n]{0,30}",
            blur_matching: bool,
            kind in prop::sample::select(vec![
                WindowType::Desktop,
                WindowType::Menu,
                WindowType::DropdownMenu,
                WindowType::PopupMenu,
                WindowType::Popup,
                WindowType::Dock,
            ]),
        ) {
            let w = TestWindow::new(1).with_type(kind);
            let matcher = matcher(&classes, blur_matching);
            prop_assert!(matcher.ignore_window(&w));
            prop_assert!(!matcher.matches(&w));
        }
    }
}
