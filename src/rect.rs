use glam::{vec2, Vec2};

/// A rectangle in real coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Rect {
    /// The position of the top-left corner
    /// of this rectangle.
    pub pos: Vec2,
    /// The side lengths of this rectangle.
    pub size: Vec2,
}

impl Rect {
    pub fn new(pos: Vec2, size: Vec2) -> Self {
        Self { pos, size }
    }

    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(vec2(x, y), vec2(w, h))
    }

    pub fn corners(self) -> [Vec2; 4] {
        [
            self.pos,
            self.pos + vec2(self.size.x, 0.),
            self.pos + self.size,
            self.pos + vec2(0., self.size.y),
        ]
    }

    /// Maps each corner through `map` and returns the
    /// axis-aligned bounding box of the results.
    pub fn bbox_mapped(self, map: impl Fn(Vec2) -> Vec2) -> Self {
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(-f32::INFINITY);
        for point in self.corners().map(map) {
            min = min.min(point);
            max = max.max(point);
        }

        Self {
            pos: min,
            size: max - min,
        }
    }

    pub fn max(self) -> Vec2 {
        self.pos + self.size
    }

    /// Grows the rectangle by `by` on every side.
    pub fn expand(self, by: f32) -> Self {
        Self::new(self.pos - Vec2::splat(by), self.size + Vec2::splat(2. * by))
    }
}

/// A rectangle on the integer pixel grid.
///
/// Covers the pixels `x..x + w` horizontally and `y..y + h` vertically.
/// A rectangle with a non-positive side is empty. Edge arithmetic
/// saturates at the limits of `i32`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct IRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl IRect {
    pub const EMPTY: IRect = IRect::new(0, 0, 0, 0);

    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Creates a rectangle from its inclusive top-left and
    /// exclusive bottom-right corners.
    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top))
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.w as i64 * self.h as i64
        }
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.right() && y < self.bottom()
    }

    /// Returns whether `other` lies entirely within `self`.
    pub fn contains(&self, other: &IRect) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.right() <= self.right()
                && other.bottom() <= self.bottom())
    }

    pub fn intersects(&self, other: &IRect) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Returns the overlapping part of two rectangles,
    /// or [`IRect::EMPTY`] if they are disjoint.
    pub fn intersection(&self, other: &IRect) -> IRect {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            IRect::EMPTY
        } else {
            IRect::from_ltrb(left, top, right, bottom)
        }
    }

    /// Smallest rectangle containing both inputs. Empty inputs are ignored.
    pub fn union_bounds(&self, other: &IRect) -> IRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        IRect::from_ltrb(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Returns the parts of `self` not covered by `other`:
    /// at most four disjoint rectangles.
    pub fn subtract(&self, other: &IRect) -> impl Iterator<Item = IRect> {
        let cut = self.intersection(other);
        let pieces = if cut.is_empty() {
            [*self, IRect::EMPTY, IRect::EMPTY, IRect::EMPTY]
        } else {
            [
                // full-width band above the cut
                IRect::from_ltrb(self.x, self.y, self.right(), cut.y),
                // full-width band below the cut
                IRect::from_ltrb(self.x, cut.bottom(), self.right(), self.bottom()),
                // left and right of the cut, within its rows
                IRect::from_ltrb(self.x, cut.y, cut.x, cut.bottom()),
                IRect::from_ltrb(cut.right(), cut.y, self.right(), cut.bottom()),
            ]
        };
        pieces.into_iter().filter(|r| !r.is_empty())
    }

    pub fn translated(&self, dx: i32, dy: i32) -> IRect {
        IRect::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    pub fn to_rect(&self) -> Rect {
        Rect::from_xywh(self.x as f32, self.y as f32, self.w as f32, self.h as f32)
    }
}
