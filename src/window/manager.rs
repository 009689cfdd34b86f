use std::collections::{HashMap, HashSet};
use std::mem;

use blur_effect_config::{CornerRadius, Settings};
use smithay::utils::Logical;

use super::{ForceBlurOptions, MaximizedState, Window, WindowMatcher};
use crate::animation::Clock;
use crate::host::{HostWindow, WindowId};
use crate::utils::Region;

/// Tracks the force-blur state of every window.
///
/// Queries about windows that were never added return neutral values.
#[derive(Debug)]
pub struct WindowManager {
    windows: HashMap<WindowId, Window>,
    matcher: WindowMatcher,
    options: ForceBlurOptions,
    clock: Clock,
    /// Windows whose force-blur region changed since the last drain.
    region_updates: Vec<WindowId>,
    /// Tracked windows the last reconfigure had no handle for.
    stale: HashSet<WindowId>,
}

impl WindowManager {
    pub fn new(settings: &Settings, clock: Clock) -> Self {
        Self {
            windows: HashMap::new(),
            matcher: WindowMatcher::new(&settings.force_blur),
            options: options_from_settings(settings),
            clock,
            region_updates: Vec::new(),
            stale: HashSet::new(),
        }
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(&id)
    }

    /// Starts tracking `w`.
    ///
    /// The window starts with an unknown maximized state, so the host must follow up with
    /// [`WindowManager::on_maximized_state_changed`] for windows that are already maximized.
    pub fn on_window_added(&mut self, w: &dyn HostWindow) {
        let id = w.id();
        self.stale.remove(&id);
        let mut window = Window::new(id, self.clock.clone());
        if window.reconfigure(w, &self.matcher, &self.options) {
            queue(&mut self.region_updates, id);
        }
        self.windows.insert(id, window);
    }

    pub fn on_window_removed(&mut self, id: WindowId) {
        self.windows.remove(&id);
        self.stale.remove(&id);
        self.region_updates.retain(|queued| *queued != id);
    }

    /// Applies new settings to the matcher and every tracked window.
    ///
    /// `windows` are the host's handles. Tracked windows missing from it are brought up to date
    /// by [`WindowManager::refresh_stale`] once the host hands them in again.
    pub fn reconfigure(&mut self, settings: &Settings, windows: &[&dyn HostWindow]) {
        self.matcher = WindowMatcher::new(&settings.force_blur);
        self.options = options_from_settings(settings);

        debug!(
            "reconfigured force blur: {} fixed classes, {} patterns, {:?}",
            self.matcher.classes().fixed.len(),
            self.matcher.classes().regexes.len(),
            self.matcher.mode(),
        );

        let handles: HashMap<WindowId, &dyn HostWindow> =
            windows.iter().map(|w| (w.id(), *w)).collect();

        self.stale.clear();
        for (id, window) in &mut self.windows {
            let Some(w) = handles.get(id) else {
                warn!("no handle for tracked window {id:?} on reconfigure, deferring its update");
                self.stale.insert(*id);
                continue;
            };
            if window.reconfigure(*w, &self.matcher, &self.options) {
                queue(&mut self.region_updates, *id);
            }
        }
    }

    /// Applies the current settings to `w` if the last reconfigure skipped it.
    ///
    /// Returns `true` when its force-blur region changed.
    pub fn refresh_stale(&mut self, w: &dyn HostWindow) -> bool {
        let id = w.id();
        if !self.stale.remove(&id) {
            return false;
        }
        self.windows
            .get_mut(&id)
            .is_some_and(|window| window.reconfigure(w, &self.matcher, &self.options))
    }

    pub fn on_frame_geometry_changed(&mut self, w: &dyn HostWindow) {
        let Some(window) = self.windows.get_mut(&w.id()) else {
            return;
        };
        if window.on_frame_geometry_changed(w, &self.options) {
            queue(&mut self.region_updates, w.id());
        }
    }

    pub fn on_maximized_state_changed(
        &mut self,
        w: &dyn HostWindow,
        horizontal: bool,
        vertical: bool,
    ) {
        if let Some(window) = self.windows.get_mut(&w.id()) {
            window.set_maximized_state(MaximizedState::from_axes(horizontal, vertical));
        }
    }

    pub fn on_minimized_changed(&mut self, w: &dyn HostWindow) {
        if let Some(window) = self.windows.get_mut(&w.id()) {
            window.on_minimized_changed(w);
        }
    }

    pub fn on_move_resize_started(&mut self, w: &dyn HostWindow) {
        if let Some(window) = self.windows.get_mut(&w.id()) {
            window.on_move_resize_started();
        }
    }

    pub fn on_move_resize_finished(&mut self, w: &dyn HostWindow) {
        if let Some(window) = self.windows.get_mut(&w.id()) {
            window.on_move_resize_finished();
        }
    }

    /// Drains the windows whose blur region has to be recomputed.
    pub fn take_region_updates(&mut self) -> Vec<WindowId> {
        mem::take(&mut self.region_updates)
    }

    pub fn should_force_blur(&self, w: &dyn HostWindow) -> bool {
        self.matcher.matches(w)
    }

    pub fn final_blur_region(
        &mut self,
        w: &dyn HostWindow,
        content: &mut Option<Region<Logical>>,
        frame: &mut Option<Region<Logical>>,
    ) {
        if let Some(window) = self.windows.get_mut(&w.id()) {
            window.final_blur_region(w, content, frame);
        }
    }

    pub fn effective_border_radius(&self, w: &dyn HostWindow) -> CornerRadius {
        self.windows
            .get(&w.id())
            .map(|window| window.effective_border_radius(w))
            .unwrap_or_default()
    }

    pub fn effective_blur_opacity(&mut self, w: &dyn HostWindow, paint_opacity: f64) -> f64 {
        match self.windows.get_mut(&w.id()) {
            Some(window) => window.effective_blur_opacity(w, paint_opacity),
            None => paint_opacity,
        }
    }

    pub fn window_should_blur_while_transformed(&self, w: &dyn HostWindow) -> bool {
        self.windows
            .get(&w.id())
            .is_some_and(|window| window.should_blur_while_transformed(w))
    }

    pub fn set_window_is_transformed(&mut self, w: &dyn HostWindow, transformed: bool) {
        if let Some(window) = self.windows.get_mut(&w.id()) {
            window.set_is_transformed(transformed);
        }
    }
}

fn queue(updates: &mut Vec<WindowId>, id: WindowId) {
    if !updates.contains(&id) {
        trace!("queueing blur region update for {id:?}");
        updates.push(id);
    }
}

fn options_from_settings(settings: &Settings) -> ForceBlurOptions {
    ForceBlurOptions {
        blur_decorations: settings.force_blur.blur_decorations,
        user_border_radius: settings.general.corner_radius as f32,
    }
}

#[cfg(test)]
mod tests {
    use blur_effect_config::ForceBlur;

    use super::*;
    use crate::tests::fixture::TestWindow;

    fn settings(classes: &str) -> Settings {
        Settings {
            force_blur: ForceBlur {
                window_classes: classes.to_owned(),
                ..ForceBlur::default()
            },
            ..Settings::default()
        }
    }

    #[test]
    fn unmanaged_windows_get_neutral_answers() {
        let mut wm = WindowManager::new(&settings("kitty"), Clock::default());
        let w = TestWindow::new(7).with_class("kitty");

        let mut content = None;
        let mut frame = None;
        wm.final_blur_region(&w, &mut content, &mut frame);
        assert_eq!(content, None);
        assert_eq!(frame, None);

        assert_eq!(wm.effective_border_radius(&w), CornerRadius::default());
        assert_eq!(wm.effective_blur_opacity(&w, 0.3), 0.3);
        assert!(!wm.window_should_blur_while_transformed(&w));
        wm.set_window_is_transformed(&w, true);
        assert!(wm.take_region_updates().is_empty());

        // The matcher still answers for unmanaged windows.
        assert!(wm.should_force_blur(&w));
    }

    #[test]
    fn added_window_queues_region_update() {
        let mut wm = WindowManager::new(&settings("kitty"), Clock::default());
        let kitty = TestWindow::new(1).with_class("kitty");
        let firefox = TestWindow::new(2).with_class("firefox");
        wm.on_window_added(&kitty);
        wm.on_window_added(&firefox);

        assert_eq!(wm.take_region_updates(), [kitty.id]);
        assert!(wm.take_region_updates().is_empty());
        assert!(wm.window(kitty.id).is_some());
        assert!(wm.window(firefox.id).is_some());
    }

    #[test]
    fn reconfigure_rematches_windows() {
        let mut wm = WindowManager::new(&settings("kitty"), Clock::default());
        let kitty = TestWindow::new(1).with_class("kitty");
        let firefox = TestWindow::new(2).with_class("firefox");
        wm.on_window_added(&kitty);
        wm.on_window_added(&firefox);
        wm.take_region_updates();

        wm.reconfigure(&settings("firefox"), &[&kitty, &firefox]);
        let mut updates = wm.take_region_updates();
        updates.sort();
        assert_eq!(updates, [kitty.id, firefox.id]);
        assert!(wm.window(kitty.id).unwrap().force_blur_content().is_none());
        assert!(wm.window(firefox.id).unwrap().force_blur_content().is_some());

        // Same settings again: nothing changes.
        wm.reconfigure(&settings("firefox"), &[&kitty, &firefox]);
        assert!(wm.take_region_updates().is_empty());
    }

    #[test]
    fn reconfigure_without_handle_defers_update() {
        let mut wm = WindowManager::new(&settings(""), Clock::default());
        let kitty = TestWindow::new(1).with_class("kitty");
        let foot = TestWindow::new(2).with_class("foot");
        wm.on_window_added(&kitty);
        wm.on_window_added(&foot);

        wm.reconfigure(&settings("kitty\nfoot"), &[&kitty]);
        assert_eq!(wm.take_region_updates(), [kitty.id]);
        assert!(wm.window(kitty.id).unwrap().should_force_blur());
        assert!(!wm.window(foot.id).unwrap().should_force_blur());

        assert!(!wm.refresh_stale(&kitty));
        assert!(wm.refresh_stale(&foot));
        assert!(wm.window(foot.id).unwrap().should_force_blur());
        assert!(wm.window(foot.id).unwrap().force_blur_content().is_some());
        assert!(!wm.refresh_stale(&foot));
    }

    #[test]
    fn geometry_change_without_region_change_is_quiet() {
        let mut wm = WindowManager::new(&settings("kitty"), Clock::default());
        let kitty = TestWindow::new(1).with_class("kitty");
        wm.on_window_added(&kitty);
        wm.take_region_updates();

        wm.on_frame_geometry_changed(&kitty);
        assert!(wm.take_region_updates().is_empty());
    }

    #[test]
    fn removal_drops_pending_updates() {
        let mut wm = WindowManager::new(&settings("kitty"), Clock::default());
        let kitty = TestWindow::new(1).with_class("kitty");
        wm.on_window_added(&kitty);
        wm.on_window_removed(kitty.id);
        assert!(wm.take_region_updates().is_empty());
        assert!(wm.window(kitty.id).is_none());
    }

    #[test]
    fn maximized_state_is_forwarded() {
        let mut wm = WindowManager::new(&settings(""), Clock::default());
        let w = TestWindow::new(1);
        wm.on_window_added(&w);
        wm.on_maximized_state_changed(&w, true, true);
        assert_eq!(
            wm.window(w.id).unwrap().maximized_state(),
            MaximizedState::Complete
        );
    }
}
