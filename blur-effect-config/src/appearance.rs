#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CornerRadius {
    pub top_left: f32,
    pub top_right: f32,
    pub bottom_right: f32,
    pub bottom_left: f32,
}

impl From<CornerRadius> for [f32; 4] {
    fn from(value: CornerRadius) -> Self {
        [
            value.top_left,
            value.top_right,
            value.bottom_right,
            value.bottom_left,
        ]
    }
}

impl CornerRadius {
    pub fn uniform(radius: f32) -> Self {
        Self {
            top_left: radius,
            top_right: radius,
            bottom_right: radius,
            bottom_left: radius,
        }
    }

    /// Radius on the bottom corners only, top corners stay square.
    pub fn bottom(radius: f32) -> Self {
        Self {
            top_left: 0.,
            top_right: 0.,
            bottom_right: radius,
            bottom_left: radius,
        }
    }

    /// Whether every corner is square.
    pub fn is_null(&self) -> bool {
        self.top_left <= 0.
            && self.top_right <= 0.
            && self.bottom_right <= 0.
            && self.bottom_left <= 0.
    }

    pub fn fit_to(self, width: f32, height: f32) -> Self {
        // Like in CSS: https://drafts.csswg.org/css-backgrounds/#corner-overlap
        let reduction = f32::min(
            f32::min(
                width / (self.top_left + self.top_right),
                width / (self.bottom_left + self.bottom_right),
            ),
            f32::min(
                height / (self.top_left + self.bottom_left),
                height / (self.top_right + self.bottom_right),
            ),
        );
        let reduction = f32::min(1., reduction);

        Self {
            top_left: self.top_left * reduction,
            top_right: self.top_right * reduction,
            bottom_right: self.bottom_right * reduction,
            bottom_left: self.bottom_left * reduction,
        }
    }

    pub fn scaled_by(self, scale: f32) -> Self {
        Self {
            top_left: self.top_left * scale,
            top_right: self.top_right * scale,
            bottom_right: self.bottom_right * scale,
            bottom_left: self.bottom_left * scale,
        }
    }

    pub fn rounded(self) -> Self {
        Self {
            top_left: self.top_left.round(),
            top_right: self.top_right.round(),
            bottom_right: self.bottom_right.round(),
            bottom_left: self.bottom_left.round(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_to_shrinks_overlapping_corners() {
        let radius = CornerRadius::uniform(30.).fit_to(30., 100.);
        assert_eq!(radius, CornerRadius::uniform(15.));

        let radius = CornerRadius::uniform(10.).fit_to(40., 100.);
        assert_eq!(radius, CornerRadius::uniform(10.));
    }

    #[test]
    fn null_radius() {
        assert!(CornerRadius::default().is_null());
        assert!(!CornerRadius::bottom(4.).is_null());
    }

    #[test]
    fn scale_then_round() {
        let radius = CornerRadius::uniform(5.).scaled_by(1.25).rounded();
        assert_eq!(<[f32; 4]>::from(radius), [6.; 4]);
    }
}
