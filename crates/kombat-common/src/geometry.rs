//! Integer rectangle geometry for fighter boxes.
//!
//! All coordinates are screen pixels with y growing downwards, matching the
//! sprite canvas the boxes are authored against.

use serde::{Deserialize, Serialize};

/// Horizontal facing of a fighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    /// Facing towards +x
    #[default]
    Right,
    /// Facing towards -x
    Left,
}

impl Facing {
    /// Facing that looks from `own_center_x` towards `other_center_x`.
    ///
    /// Ties face right.
    #[must_use]
    pub const fn towards(own_center_x: i32, other_center_x: i32) -> Self {
        if own_center_x <= other_center_x {
            Self::Right
        } else {
            Self::Left
        }
    }

    /// `1` for right, `-1` for left.
    #[must_use]
    pub const fn sign(self) -> i32 {
        match self {
            Self::Right => 1,
            Self::Left => -1,
        }
    }

    /// Returns true when facing left (sprites and boxes are mirrored).
    #[must_use]
    pub const fn is_flipped(self) -> bool {
        matches!(self, Self::Left)
    }
}

/// Axis-aligned integer rectangle (top-left origin, width, height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub w: i32,
    /// Height in pixels
    pub h: i32,
}

impl Rect {
    /// Creates a new rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Creates a rectangle from the `[x, y, w, h]` array form used by the
    /// hitbox authoring file.
    #[must_use]
    pub const fn from_array(r: [i32; 4]) -> Self {
        Self::new(r[0], r[1], r[2], r[3])
    }

    /// Left edge.
    #[must_use]
    pub const fn left(self) -> i32 {
        self.x
    }

    /// Right edge (exclusive).
    #[must_use]
    pub const fn right(self) -> i32 {
        self.x + self.w
    }

    /// Top edge.
    #[must_use]
    pub const fn top(self) -> i32 {
        self.y
    }

    /// Bottom edge (exclusive).
    #[must_use]
    pub const fn bottom(self) -> i32 {
        self.y + self.h
    }

    /// Horizontal centre, rounded towards negative infinity.
    #[must_use]
    pub const fn center_x(self) -> i32 {
        self.x + self.w.div_euclid(2)
    }

    /// Moves the rectangle so its bottom edge sits at `bottom`.
    pub fn set_bottom(&mut self, bottom: i32) {
        self.y = bottom - self.h;
    }

    /// Returns true if the rectangle has no area.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    /// Returns true if both rectangles share a region of positive area.
    ///
    /// Touching edges do not count, and empty rectangles never intersect.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Width of the horizontal overlap between the two rectangles.
    ///
    /// Zero or negative when they are apart on the X axis.
    #[must_use]
    pub fn overlap_x(self, other: Self) -> i32 {
        self.right().min(other.right()) - self.left().max(other.left())
    }

    /// Returns the rectangle translated by `(dx, dy)`.
    #[must_use]
    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Mirrors the rectangle horizontally inside a container of the given
    /// width: `x' = width - (x + w)`.
    #[must_use]
    pub const fn mirrored_within(self, width: i32) -> Self {
        Self::new(width - (self.x + self.w), self.y, self.w, self.h)
    }

    /// Clamps the left edge so the rectangle stays within `[min_x, max_x]`.
    pub fn clamp_x(&mut self, min_x: i32, max_x: i32) {
        let hi = (max_x - self.w).max(min_x);
        self.x = self.x.clamp(min_x, hi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_edges_and_center() {
        let r = Rect::new(10, 20, 30, 40);
        assert_eq!(r.right(), 40);
        assert_eq!(r.bottom(), 60);
        assert_eq!(r.center_x(), 25);
    }

    #[test]
    fn test_intersects_excludes_touching_edges() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.intersects(Rect::new(9, 9, 5, 5)));
        assert!(!a.intersects(Rect::new(10, 0, 5, 5)));
        assert!(!a.intersects(Rect::new(0, 10, 5, 5)));
        assert!(!a.intersects(Rect::new(2, 2, 0, 5)));
    }

    #[test]
    fn test_overlap_x() {
        let a = Rect::new(0, 0, 100, 10);
        assert_eq!(a.overlap_x(Rect::new(80, 0, 100, 10)), 20);
        assert!(a.overlap_x(Rect::new(150, 0, 10, 10)) < 0);
    }

    #[test]
    fn test_mirror_within_width() {
        let r = Rect::new(10, 5, 30, 20);
        assert_eq!(r.mirrored_within(300), Rect::new(260, 5, 30, 20));
        // Mirroring twice is the identity
        assert_eq!(r.mirrored_within(300).mirrored_within(300), r);
    }

    #[test]
    fn test_clamp_x() {
        let mut r = Rect::new(-20, 0, 300, 360);
        r.clamp_x(0, 1000);
        assert_eq!(r.x, 0);

        r.x = 900;
        r.clamp_x(0, 1000);
        assert_eq!(r.x, 700);
    }

    #[test]
    fn test_facing_towards() {
        assert_eq!(Facing::towards(100, 500), Facing::Right);
        assert_eq!(Facing::towards(500, 100), Facing::Left);
        assert_eq!(Facing::towards(300, 300), Facing::Right);
        assert_eq!(Facing::Left.sign(), -1);
    }

    #[test]
    fn test_set_bottom() {
        let mut r = Rect::new(0, 0, 300, 360);
        r.set_bottom(520);
        assert_eq!(r.y, 160);
        assert_eq!(r.bottom(), 520);
    }

    fn rect() -> impl Strategy<Value = Rect> {
        (-500..500i32, -500..500i32, 0..400i32, 0..400i32)
            .prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
    }

    proptest! {
        #[test]
        fn test_intersects_is_symmetric(a in rect(), b in rect()) {
            prop_assert_eq!(a.intersects(b), b.intersects(a));
            prop_assert_eq!(a.overlap_x(b), b.overlap_x(a));
        }

        #[test]
        fn test_intersection_implies_x_overlap(a in rect(), b in rect()) {
            if a.intersects(b) {
                prop_assert!(a.overlap_x(b) > 0);
            }
        }
    }
}
