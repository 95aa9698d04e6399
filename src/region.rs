//! Device-space pixel regions.
//!
//! A [`Region`] is a set of pixels stored as a list of pairwise
//! disjoint rectangles. Composite regions arise from unions and
//! differences; clipping against them needs real region geometry,
//! because a rectangle can be covered by a composite region without
//! being covered by any single piece of it, and can lie inside the
//! region's bounding box without being covered by the region.

use smallvec::SmallVec;

use crate::IRect;

/// A set of device pixels.
#[derive(Debug, Clone, Default)]
pub struct Region {
    rects: SmallVec<[IRect; 4]>,
    bounds: IRect,
}

impl Region {
    /// The region containing no pixels.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: IRect) -> Self {
        let mut region = Self::empty();
        if !rect.is_empty() {
            region.rects.push(rect);
            region.bounds = rect;
        }
        region
    }

    pub fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::from_rect(IRect::new(x, y, w, h))
    }

    /// The disjoint rectangles making up this region.
    pub fn rects(&self) -> &[IRect] {
        &self.rects
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Returns whether the region is a single rectangle.
    pub fn is_rect(&self) -> bool {
        self.rects.len() == 1
    }

    /// The smallest rectangle containing every pixel of the region.
    pub fn bounding_box(&self) -> IRect {
        self.bounds
    }

    /// Number of pixels in the region.
    pub fn area(&self) -> i64 {
        self.rects.iter().map(IRect::area).sum()
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        self.bounds.contains_point(x, y) && self.rects.iter().any(|r| r.contains_point(x, y))
    }

    /// Returns whether any pixel of `rect` belongs to the region.
    pub fn intersects_rect(&self, rect: &IRect) -> bool {
        self.bounds.intersects(rect) && self.rects.iter().any(|r| r.intersects(rect))
    }

    /// Returns whether every pixel of `rect` belongs to the region.
    pub fn contains_rect(&self, rect: &IRect) -> bool {
        if rect.is_empty() {
            return true;
        }
        if !self.bounds.contains(rect) {
            return false;
        }
        self.intersect_rect(rect).area() == rect.area()
    }

    pub fn intersect_rect(&self, rect: &IRect) -> Region {
        if !self.bounds.intersects(rect) {
            return Region::empty();
        }
        self.rects
            .iter()
            .map(|r| r.intersection(rect))
            .filter(|r| !r.is_empty())
            .collect()
    }

    pub fn intersect(&self, other: &Region) -> Region {
        if !self.bounds.intersects(&other.bounds) {
            return Region::empty();
        }
        let mut result = Region::empty();
        for a in &self.rects {
            for b in &other.rects {
                result.push_disjoint(a.intersection(b));
            }
        }
        result
    }

    /// Adds the pixels of `rect` to the region.
    pub fn union_rect(&mut self, rect: IRect) {
        let mut pieces: SmallVec<[IRect; 8]> = SmallVec::new();
        pieces.push(rect);
        for existing in &self.rects {
            pieces = pieces.iter().flat_map(|p| p.subtract(existing)).collect();
            if pieces.is_empty() {
                return;
            }
        }
        for piece in pieces {
            self.push_disjoint(piece);
        }
    }

    pub fn union(&mut self, other: &Region) {
        for rect in &other.rects {
            self.union_rect(*rect);
        }
    }

    /// Removes the pixels of `rect` from the region.
    pub fn subtract_rect(&mut self, rect: &IRect) {
        if !self.bounds.intersects(rect) {
            return;
        }
        *self = self.rects.iter().flat_map(|r| r.subtract(rect)).collect();
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        for rect in &mut self.rects {
            *rect = rect.translated(dx, dy);
        }
        self.bounds = self.bounds.translated(dx, dy);
    }

    /// Returns whether both regions cover the same pixels.
    ///
    /// The rectangle decompositions may differ.
    pub fn same_pixels(&self, other: &Region) -> bool {
        let overlap = self.intersect(other).area();
        overlap == self.area() && overlap == other.area()
    }

    // Callers guarantee `rect` is disjoint from every stored rectangle.
    fn push_disjoint(&mut self, rect: IRect) {
        if rect.is_empty() {
            return;
        }
        self.bounds = self.bounds.union_bounds(&rect);
        self.rects.push(rect);
    }
}

impl FromIterator<IRect> for Region {
    /// Collects already-disjoint rectangles into a region.
    fn from_iter<T: IntoIterator<Item = IRect>>(iter: T) -> Self {
        let mut region = Region::empty();
        for rect in iter {
            region.push_disjoint(rect);
        }
        region
    }
}

impl From<IRect> for Region {
    fn from(rect: IRect) -> Self {
        Region::from_rect(rect)
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.same_pixels(other)
    }
}
