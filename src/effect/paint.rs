use smithay::utils::Logical;

use crate::host::WindowPrePaintData;
use crate::utils::Region;

/// Occlusion bookkeeping across the windows of one output, bottom to top.
#[derive(Debug, Default)]
pub struct PaintTracker {
    /// Everything painted so far this frame.
    painted_area: Region<Logical>,
    /// Blurred area of the windows visited so far that is still visible.
    current_blur: Region<Logical>,
}

impl PaintTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.painted_area = Region::new();
        self.current_blur = Region::new();
    }

    pub fn painted_area(&self) -> &Region<Logical> {
        &self.painted_area
    }

    pub fn current_blur(&self) -> &Region<Logical> {
        &self.current_blur
    }

    /// Updates `data` for a window with `blur_area` (global) and records it.
    ///
    /// `expand_size` is how far the blur reads past its region.
    pub fn pre_paint_window(
        &mut self,
        data: &mut WindowPrePaintData,
        blur_area: &Region<Logical>,
        expand_size: i32,
    ) {
        let old_opaque = data.opaque.clone();

        if data.opaque.intersects(&self.current_blur) {
            // Blur below the window still reads pixels near the opaque edges.
            data.opaque = data.opaque.shrunk(expand_size);
            self.current_blur.subtract(&data.opaque);
        }

        // Repainting a translucent part over blurred area means the blur behind it is redone.
        let mut translucent = data.paint.clone();
        translucent.subtract(&old_opaque);
        if translucent.intersects(&self.current_blur) {
            data.paint.union(&self.current_blur);
        }

        if self.painted_area.intersects(blur_area) || data.paint.intersects(blur_area) {
            data.paint.union(blur_area);
            if blur_area.intersects(&self.current_blur) {
                data.paint.union(&self.current_blur);
            }
        }

        self.current_blur.union(blur_area);

        self.painted_area.subtract(&data.opaque);
        self.painted_area.union(&data.paint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::rect;

    fn data(paint: Region<Logical>, opaque: Region<Logical>) -> WindowPrePaintData {
        WindowPrePaintData { paint, opaque }
    }

    #[test]
    fn damage_under_blur_repaints_whole_blur() {
        let mut tracker = PaintTracker::new();

        // Bottom window gets damaged in a small spot.
        let mut bottom = data(Region::from_rect(rect(10, 10, 5, 5)), Region::new());
        tracker.pre_paint_window(&mut bottom, &Region::new(), 12);

        // A blurred window above it has to be repainted entirely.
        let blur = Region::from_rect(rect(0, 0, 100, 100));
        let mut top = data(Region::new(), Region::new());
        tracker.pre_paint_window(&mut top, &blur, 12);

        assert_eq!(top.paint, blur);
        assert_eq!(tracker.current_blur(), &blur);
    }

    #[test]
    fn undamaged_blur_is_left_alone() {
        let mut tracker = PaintTracker::new();

        let mut bottom = data(Region::from_rect(rect(200, 200, 5, 5)), Region::new());
        tracker.pre_paint_window(&mut bottom, &Region::new(), 12);

        let mut top = data(Region::new(), Region::new());
        tracker.pre_paint_window(&mut top, &Region::from_rect(rect(0, 0, 100, 100)), 12);

        assert!(top.paint.is_empty());
    }

    #[test]
    fn window_painted_above_blur_forces_repaint() {
        let mut tracker = PaintTracker::new();

        let blur = Region::from_rect(rect(0, 0, 100, 100));
        let mut blurred = data(Region::new(), Region::new());
        tracker.pre_paint_window(&mut blurred, &blur, 12);

        // A translucent window repainted on top of the blurred area.
        let mut above = data(Region::from_rect(rect(50, 50, 20, 20)), Region::new());
        tracker.pre_paint_window(&mut above, &Region::new(), 12);

        assert_eq!(above.paint.area(), blur.area());
    }

    #[test]
    fn opaque_window_over_blur_is_shrunk() {
        let mut tracker = PaintTracker::new();

        let blur = Region::from_rect(rect(0, 0, 200, 200));
        let mut blurred = data(Region::new(), Region::new());
        tracker.pre_paint_window(&mut blurred, &blur, 12);

        let opaque = Region::from_rect(rect(50, 50, 100, 100));
        let mut above = data(Region::new(), opaque);
        tracker.pre_paint_window(&mut above, &Region::new(), 12);

        assert_eq!(above.opaque, Region::from_rect(rect(62, 62, 76, 76)));

        let mut expected = blur;
        expected.subtract_rect(&rect(62, 62, 76, 76));
        assert_eq!(tracker.current_blur(), &expected);
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = PaintTracker::new();
        let mut w = data(Region::from_rect(rect(0, 0, 10, 10)), Region::new());
        tracker.pre_paint_window(&mut w, &Region::from_rect(rect(0, 0, 10, 10)), 12);
        assert!(!tracker.painted_area().is_empty());

        tracker.reset();
        assert!(tracker.painted_area().is_empty());
        assert!(tracker.current_blur().is_empty());
    }
}
