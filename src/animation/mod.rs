use std::time::Duration;

use keyframe::functions::{EaseInCubic, EaseOutCubic};
use keyframe::EasingFunction as _;

mod clock;

pub use clock::Clock;

/// Duration of the blur fade around interactive moves and resizes.
pub const TRANSFORM_FADE_DURATION: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    EaseOutCubic,
    EaseInCubic,
}

impl Curve {
    pub fn y(self, x: f64) -> f64 {
        let x = x.clamp(0., 1.);
        match self {
            Curve::EaseOutCubic => EaseOutCubic.y(x),
            Curve::EaseInCubic => EaseInCubic.y(x),
        }
    }
}

/// Fraction of [`TRANSFORM_FADE_DURATION`] elapsed between `start` and `now`.
pub fn fade_progress(start: Duration, now: Duration) -> f64 {
    now.saturating_sub(start).as_secs_f64() / TRANSFORM_FADE_DURATION.as_secs_f64()
}

/// Blur opacity multiplier while fading out.
pub fn fade_out(progress: f64) -> f64 {
    1. - Curve::EaseOutCubic.y(progress)
}

/// Blur opacity multiplier while fading in.
pub fn fade_in(progress: f64) -> f64 {
    Curve::EaseInCubic.y(progress)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn fade_endpoints() {
        assert_abs_diff_eq!(fade_out(0.), 1.);
        assert_abs_diff_eq!(fade_out(1.), 0.);
        assert_abs_diff_eq!(fade_in(0.), 0.);
        assert_abs_diff_eq!(fade_in(1.), 1.);
    }

    #[test]
    fn progress_from_elapsed_time() {
        let start = Duration::from_millis(1000);
        assert_abs_diff_eq!(fade_progress(start, Duration::from_millis(1125)), 0.5);
        assert_abs_diff_eq!(fade_progress(start, Duration::from_millis(900)), 0.);
    }

    proptest! {
        #[test]
        fn fade_out_is_non_increasing(a in 0f64..=1., b in 0f64..=1.) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(fade_out(lo) >= fade_out(hi) - 1e-12);
        }

        #[test]
        fn fade_in_is_non_decreasing(a in 0f64..=1., b in 0f64..=1.) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(fade_in(lo) <= fade_in(hi) + 1e-12);
        }
    }
}
