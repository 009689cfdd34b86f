use std::fmt;
use std::mem;

use smithay::utils::{Point, Rectangle, Size};

/// A set of pixels stored as disjoint rectangles.
///
/// Every operation keeps the rectangles non-overlapping, so the area of a region is the sum of
/// the areas of its rectangles. Equality compares the covered pixels, not the decomposition.
pub struct Region<Kind> {
    rects: Vec<Rectangle<i32, Kind>>,
}

pub(crate) fn rect<Kind>(x: i32, y: i32, w: i32, h: i32) -> Rectangle<i32, Kind> {
    Rectangle::new(Point::from((x, y)), Size::from((w, h)))
}

fn is_empty_rect<Kind>(r: &Rectangle<i32, Kind>) -> bool {
    r.size.w <= 0 || r.size.h <= 0
}

/// Overlap of two rectangles, `None` when they only touch or one of them is empty.
fn overlap<Kind>(
    a: &Rectangle<i32, Kind>,
    b: &Rectangle<i32, Kind>,
) -> Option<Rectangle<i32, Kind>> {
    if is_empty_rect(a) || is_empty_rect(b) {
        return None;
    }
    a.intersection(*b).filter(|r| !is_empty_rect(r))
}

impl<Kind> Region<Kind> {
    pub fn new() -> Self {
        Self { rects: Vec::new() }
    }

    pub fn from_rect(r: Rectangle<i32, Kind>) -> Self {
        let mut region = Self::new();
        region.add_rect(r);
        region
    }

    pub fn from_rects(rects: impl IntoIterator<Item = Rectangle<i32, Kind>>) -> Self {
        let mut region = Self::new();
        for r in rects {
            region.add_rect(r);
        }
        region
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rectangle<i32, Kind>] {
        &self.rects
    }

    pub fn area(&self) -> i64 {
        self.rects
            .iter()
            .map(|r| i64::from(r.size.w) * i64::from(r.size.h))
            .sum()
    }

    /// Adds the parts of `r` not covered yet.
    pub fn add_rect(&mut self, r: Rectangle<i32, Kind>) {
        if is_empty_rect(&r) {
            return;
        }

        let pieces = Rectangle::subtract_rects_many([r], self.rects.iter().copied());
        self.rects
            .extend(pieces.into_iter().filter(|piece| !is_empty_rect(piece)));
    }

    pub fn union(&mut self, other: &Self) {
        for r in &other.rects {
            self.add_rect(*r);
        }
    }

    pub fn subtract_rect(&mut self, r: &Rectangle<i32, Kind>) {
        if is_empty_rect(r) {
            return;
        }
        self.subtract_all([*r]);
    }

    pub fn subtract(&mut self, other: &Self) {
        self.subtract_all(other.rects.iter().copied());
    }

    fn subtract_all(&mut self, others: impl IntoIterator<Item = Rectangle<i32, Kind>>) {
        let rects = mem::take(&mut self.rects);
        self.rects = Rectangle::subtract_rects_many_in_place(rects, others);
        self.rects.retain(|r| !is_empty_rect(r));
    }

    pub fn intersected_rect(&self, r: &Rectangle<i32, Kind>) -> Self {
        Self {
            rects: self
                .rects
                .iter()
                .filter_map(|existing| overlap(existing, r))
                .collect(),
        }
    }

    pub fn intersected(&self, other: &Self) -> Self {
        // Pairwise intersections of two disjoint sets are disjoint.
        let rects = self
            .rects
            .iter()
            .flat_map(|a| other.rects.iter().filter_map(move |b| overlap(a, b)))
            .collect();
        Self { rects }
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.rects
            .iter()
            .any(|a| other.rects.iter().any(|b| overlap(a, b).is_some()))
    }

    pub fn bounding_rect(&self) -> Option<Rectangle<i32, Kind>> {
        self.rects.iter().copied().reduce(|a, b| a.merge(b))
    }

    pub fn translated(&self, x: i32, y: i32) -> Self {
        let offset = Point::from((x, y));
        Self {
            rects: self
                .rects
                .iter()
                .map(|r| Rectangle::new(r.loc + offset, r.size))
                .collect(),
        }
    }

    /// Shrinks every rectangle by `amount` on each side, dropping the ones that vanish.
    pub fn shrunk(&self, amount: i32) -> Self {
        Self::from_rects(self.rects.iter().map(|r| {
            rect(
                r.loc.x + amount,
                r.loc.y + amount,
                r.size.w - 2 * amount,
                r.size.h - 2 * amount,
            )
        }))
    }

    /// Maps every rectangle into another coordinate space.
    pub fn map<Other>(
        &self,
        f: impl Fn(Rectangle<i32, Kind>) -> Rectangle<i32, Other>,
    ) -> Region<Other> {
        Region::from_rects(self.rects.iter().map(|r| f(*r)))
    }
}

impl<Kind> Default for Region<Kind> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Kind> Clone for Region<Kind> {
    fn clone(&self) -> Self {
        Self {
            rects: self.rects.clone(),
        }
    }
}

impl<Kind> PartialEq for Region<Kind> {
    fn eq(&self, other: &Self) -> bool {
        if self.area() != other.area() {
            return false;
        }
        let mut rest = self.clone();
        rest.subtract(other);
        rest.is_empty()
    }
}

impl<Kind> Eq for Region<Kind> {}

impl<Kind> fmt::Debug for Region<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.rects
                    .iter()
                    .map(|r| (r.loc.x, r.loc.y, r.size.w, r.size.h)),
            )
            .finish()
    }
}

impl<Kind> From<Rectangle<i32, Kind>> for Region<Kind> {
    fn from(r: Rectangle<i32, Kind>) -> Self {
        Self::from_rect(r)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use smithay::utils::Logical;

    use super::*;

    type R = Region<Logical>;

    #[test]
    fn union_of_overlapping_rects_keeps_area() {
        let mut region = R::from_rect(rect(0, 0, 10, 10));
        region.add_rect(rect(5, 5, 10, 10));
        assert_eq!(region.area(), 175);
        assert_eq!(region.bounding_rect(), Some(rect(0, 0, 15, 15)));
    }

    #[test]
    fn subtract_punches_a_hole() {
        let mut region = R::from_rect(rect(0, 0, 30, 30));
        region.subtract_rect(&rect(10, 10, 10, 10));
        assert_eq!(region.area(), 800);
        assert!(!region.intersects(&R::from_rect(rect(12, 12, 2, 2))));
        assert!(region.intersects(&R::from_rect(rect(0, 0, 1, 1))));
        // Touching edges do not count as overlap.
        assert!(!region.intersects(&R::from_rect(rect(30, 0, 5, 5))));
    }

    #[test]
    fn equality_ignores_decomposition() {
        let a = R::from_rects([rect(0, 0, 10, 5), rect(0, 5, 10, 5)]);
        let b = R::from_rect(rect(0, 0, 10, 10));
        assert_eq!(a, b);
        assert_ne!(a, R::from_rect(rect(0, 0, 10, 11)));
    }

    #[test]
    fn empty_rects_are_ignored() {
        let region = R::from_rects([rect(0, 0, 0, 10), rect(4, 4, 5, -1)]);
        assert!(region.is_empty());
        assert_eq!(region.bounding_rect(), None);
    }

    #[test]
    fn shrinking_drops_small_rects() {
        let region = R::from_rects([rect(0, 0, 100, 100), rect(200, 0, 8, 8)]);
        let shrunk = region.shrunk(5);
        assert_eq!(shrunk, R::from_rect(rect(5, 5, 90, 90)));
    }

    #[test]
    fn translate_and_intersect() {
        let region = R::from_rect(rect(0, 0, 10, 10)).translated(5, 0);
        let clipped = region.intersected_rect(&rect(0, 0, 10, 10));
        assert_eq!(clipped, R::from_rect(rect(5, 0, 5, 10)));
        assert_eq!(
            region.intersected(&R::from_rect(rect(12, 2, 10, 2))),
            R::from_rect(rect(12, 2, 3, 2))
        );
    }

    fn arb_rect() -> impl Strategy<Value = Rectangle<i32, Logical>> {
        (0..50, 0..50, 1..30, 1..30).prop_map(|(x, y, w, h)| rect(x, y, w, h))
    }

    proptest! {
        #[test]
        fn rects_stay_disjoint(rects in prop::collection::vec(arb_rect(), 1..8), hole in arb_rect()) {
            let mut region = R::from_rects(rects.iter().copied());
            region.subtract_rect(&hole);

            let rs = region.rects();
            for (i, a) in rs.iter().enumerate() {
                for b in &rs[i + 1..] {
                    prop_assert!(a.intersection(*b).is_none());
                }
            }

            // Every input pixel outside the hole is still covered.
            for r in &rects {
                let mut expected = R::from_rect(*r);
                expected.subtract_rect(&hole);
                let mut missing = expected;
                missing.subtract(&region);
                prop_assert!(missing.is_empty());
            }
        }
    }
}
