//! Vertex accumulation for the begin/vertex/end drawing protocol.
//!
//! All coordinates stored here are already in device space; the driver
//! maps logical vertices through its transform stack before pushing them.

use std::f32::consts::{PI, TAU};

use glam::{vec2, Vec2};
use lyon::geom::{CubicBezierSegment, Point};
use smallvec::SmallVec;

use crate::Rect;

/// Smallest flattening tolerance, in device pixels.
pub const MIN_CURVE_TOLERANCE: f32 = 0.01;

/// The kind of shape being accumulated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ShapeMode {
    #[default]
    None,
    Points,
    Line,
    Loop,
    Polygon,
}

/// An ordered list of device-space vertices split into contours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    vertices: Vec<Vec2>,
    /// Exclusive end index of each closed contour.
    ends: SmallVec<[usize; 4]>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a single-contour path.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Self {
        let vertices: Vec<Vec2> = points.into_iter().collect();
        let mut ends = SmallVec::new();
        if !vertices.is_empty() {
            ends.push(vertices.len());
        }
        Self { vertices, ends }
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Iterates over the closed contours.
    pub fn contours(&self) -> impl Iterator<Item = &[Vec2]> + '_ {
        let mut start = 0;
        self.ends.iter().map(move |&end| {
            let contour = &self.vertices[start..end];
            start = end;
            contour
        })
    }

    pub fn num_contours(&self) -> usize {
        self.ends.len()
    }

    pub fn bounds(&self) -> Option<Rect> {
        let first = *self.vertices.first()?;
        let (min, max) = self
            .vertices
            .iter()
            .fold((first, first), |(min, max), &v| (min.min(v), max.max(v)));
        Some(Rect::new(min, max - min))
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.ends.clear();
    }

    fn contour_start(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    fn open_contour(&self) -> &[Vec2] {
        &self.vertices[self.contour_start()..]
    }

    fn push(&mut self, p: Vec2) {
        if self.open_contour().last() != Some(&p) {
            self.vertices.push(p);
        }
    }

    /// Closes the open contour. Contours of fewer than three
    /// vertices are dropped.
    fn close_contour(&mut self) {
        let start = self.contour_start();
        if self.vertices.len() - start > 1 && self.vertices.last() == self.vertices.get(start) {
            self.vertices.pop();
        }
        if self.vertices.len() - start < 3 {
            self.vertices.truncate(start);
        } else {
            self.ends.push(self.vertices.len());
        }
    }
}

/// A completed shape, ready for a backend primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Points(Path),
    /// A polyline; `closed` adds an edge from the last vertex
    /// back to the first.
    Polyline { path: Path, closed: bool },
    Polygon(Path),
}

impl Shape {
    pub fn path(&self) -> &Path {
        match self {
            Shape::Points(path) | Shape::Polygon(path) => path,
            Shape::Polyline { path, .. } => path,
        }
    }

    pub fn into_path(self) -> Path {
        match self {
            Shape::Points(path) | Shape::Polygon(path) => path,
            Shape::Polyline { path, .. } => path,
        }
    }
}

/// The path state machine.
///
/// `begin` enters a mode, vertices accumulate until `end`,
/// which returns the completed [`Shape`] and returns to
/// [`ShapeMode::None`].
#[derive(Debug, Default)]
pub struct PathBuilder {
    mode: ShapeMode,
    path: Path,
    /// Buffer handed back through `recycle` to avoid reallocating.
    spare: Option<Path>,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ShapeMode {
        self.mode
    }

    /// Vertices accumulated so far.
    pub fn vertices(&self) -> &[Vec2] {
        self.path.vertices()
    }

    /// Enters `mode`, discarding any unfinished shape.
    pub fn begin(&mut self, mode: ShapeMode) {
        self.mode = mode;
        self.path.clear();
    }

    /// Appends a device-space vertex. Ignored outside a shape;
    /// repeats of the previous vertex are dropped.
    pub fn vertex(&mut self, p: Vec2) {
        if self.mode != ShapeMode::None {
            self.path.push(p);
        }
    }

    /// Starts a new contour. Only meaningful while building a polygon.
    pub fn gap(&mut self) {
        if self.mode == ShapeMode::Polygon {
            self.path.close_contour();
        }
    }

    /// Appends a flattened cubic Bézier, start point included.
    /// Control points are in device space. Tolerances below
    /// [`MIN_CURVE_TOLERANCE`], NaN included, are raised to it.
    pub fn curve(&mut self, from: Vec2, ctrl1: Vec2, ctrl2: Vec2, to: Vec2, tolerance: f32) {
        if self.mode == ShapeMode::None {
            return;
        }
        let segment = CubicBezierSegment {
            from: point(from),
            ctrl1: point(ctrl1),
            ctrl2: point(ctrl2),
            to: point(to),
        };
        self.path.push(from);
        for p in segment.flattened(tolerance.max(MIN_CURVE_TOLERANCE)) {
            self.path.push(vec2(p.x, p.y));
        }
    }

    /// Completes the shape as `kind`, returning to [`ShapeMode::None`].
    ///
    /// Returns `None` when no shape was begun or nothing was accumulated.
    /// Shapes with too few vertices for `kind` degrade: lines and loops
    /// of one vertex become points; loops and polygons of fewer than
    /// three vertices become open lines.
    pub fn end(&mut self, kind: ShapeMode) -> Option<Shape> {
        if std::mem::take(&mut self.mode) == ShapeMode::None || self.path.is_empty() {
            self.path.clear();
            return None;
        }

        let spare = self.spare.take().unwrap_or_default();
        let mut path = std::mem::replace(&mut self.path, spare);
        let n = path.len();

        let shape = match kind {
            ShapeMode::None => {
                path.clear();
                self.recycle(path);
                return None;
            }
            ShapeMode::Points => Shape::Points(path),
            _ if n == 1 => Shape::Points(path),
            ShapeMode::Line => {
                path.ends.clear();
                Shape::Polyline {
                    path,
                    closed: false,
                }
            }
            ShapeMode::Loop | ShapeMode::Polygon if n < 3 => {
                path.ends.clear();
                Shape::Polyline {
                    path,
                    closed: false,
                }
            }
            ShapeMode::Loop => {
                path.ends.clear();
                let closes_itself = path.vertices.first() == path.vertices.last();
                if closes_itself && n == 3 {
                    Shape::Polyline {
                        path,
                        closed: false,
                    }
                } else {
                    if closes_itself {
                        path.vertices.pop();
                    }
                    Shape::Polyline { path, closed: true }
                }
            }
            ShapeMode::Polygon => {
                path.close_contour();
                if path.num_contours() == 0 {
                    log::debug!("polygon has no contour with three or more vertices");
                    self.recycle(path);
                    return None;
                }
                Shape::Polygon(path)
            }
        };
        Some(shape)
    }

    /// Returns a finished path's buffer for reuse.
    pub fn recycle(&mut self, mut path: Path) {
        path.clear();
        self.spare = Some(path);
    }
}

fn point(v: Vec2) -> Point<f32> {
    Point::new(v.x, v.y)
}

/// Number of chords needed to approximate an arc of `sweep`
/// radians and device radius `radius` within `tolerance`.
pub fn arc_segments(radius: f32, sweep: f32, tolerance: f32) -> usize {
    let sweep = sweep.abs();
    if radius <= tolerance || sweep == 0. {
        return 1;
    }
    let step = 2. * (1. - tolerance / radius).acos();
    ((sweep / step).ceil() as usize).clamp(1, 1024)
}

/// Samples an arc around `center`, from `start` to `end` degrees.
///
/// Angles run counter-clockwise with 0° at three o'clock, as on
/// a y-up plane, so positive angles move toward negative y.
pub fn sample_arc(
    center: Vec2,
    radius: Vec2,
    start: f32,
    end: f32,
    segments: usize,
) -> impl Iterator<Item = Vec2> {
    let a0 = start * PI / 180.;
    let step = (end - start) * PI / 180. / segments as f32;
    (0..=segments).map(move |i| {
        let (sin, cos) = (a0 + step * i as f32).sin_cos();
        center + vec2(cos * radius.x, -sin * radius.y)
    })
}

/// The sweep, in radians, of an arc given in degrees.
pub fn sweep_radians(start: f32, end: f32) -> f32 {
    ((end - start) * PI / 180.).abs().min(TAU)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(mode: ShapeMode, points: &[(f32, f32)]) -> PathBuilder {
        let mut builder = PathBuilder::new();
        builder.begin(mode);
        for &(x, y) in points {
            builder.vertex(vec2(x, y));
        }
        builder
    }

    #[test]
    fn end_without_begin_is_noop() {
        let mut builder = PathBuilder::new();
        builder.vertex(vec2(1., 1.));
        assert!(builder.end(ShapeMode::Line).is_none());
        assert!(builder.vertices().is_empty());

        let mut empty = build(ShapeMode::Polygon, &[]);
        assert!(empty.end(ShapeMode::Polygon).is_none());
        assert_eq!(empty.mode(), ShapeMode::None);
    }

    #[test]
    fn consecutive_duplicates_are_dropped() {
        let builder = build(
            ShapeMode::Line,
            &[(0., 0.), (0., 0.), (5., 0.), (5., 0.), (0., 0.)],
        );
        assert_eq!(builder.vertices().len(), 3);
    }

    #[test]
    fn second_begin_resets() {
        let mut builder = build(ShapeMode::Polygon, &[(0., 0.), (1., 0.)]);
        builder.begin(ShapeMode::Line);
        assert!(builder.vertices().is_empty());
        assert_eq!(builder.mode(), ShapeMode::Line);
    }

    #[test]
    fn degenerate_shapes_degrade() {
        let mut single = build(ShapeMode::Line, &[(3., 3.)]);
        assert!(matches!(single.end(ShapeMode::Line), Some(Shape::Points(_))));

        let mut two = build(ShapeMode::Polygon, &[(0., 0.), (4., 4.)]);
        assert!(matches!(
            two.end(ShapeMode::Polygon),
            Some(Shape::Polyline { closed: false, .. })
        ));

        let mut loop_of_two = build(ShapeMode::Loop, &[(0., 0.), (4., 4.)]);
        assert!(matches!(
            loop_of_two.end(ShapeMode::Loop),
            Some(Shape::Polyline { closed: false, .. })
        ));
    }

    #[test]
    fn loop_drops_explicit_closing_vertex() {
        let mut builder = build(ShapeMode::Loop, &[(0., 0.), (8., 0.), (8., 8.), (0., 0.)]);
        match builder.end(ShapeMode::Loop) {
            Some(Shape::Polyline { path, closed }) => {
                assert!(closed);
                assert_eq!(path.len(), 3);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn gap_splits_contours() {
        let mut builder = build(ShapeMode::Polygon, &[(0., 0.), (10., 0.), (10., 10.)]);
        builder.gap();
        // fewer than three vertices: discarded at the next gap
        builder.vertex(vec2(50., 50.));
        builder.vertex(vec2(60., 50.));
        builder.gap();
        for &(x, y) in &[(20., 0.), (30., 0.), (30., 10.), (20., 10.)] {
            builder.vertex(vec2(x, y));
        }
        let path = builder.end(ShapeMode::Polygon).unwrap().into_path();
        let contours: Vec<&[Vec2]> = path.contours().collect();
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].len(), 3);
        assert_eq!(contours[1].len(), 4);
        assert_eq!(contours[1][0], vec2(20., 0.));
    }

    #[test]
    fn gap_outside_polygon_is_ignored() {
        let mut builder = build(ShapeMode::Line, &[(0., 0.), (1., 0.), (1., 1.)]);
        builder.gap();
        builder.vertex(vec2(2., 2.));
        assert_eq!(builder.vertices().len(), 4);
    }

    #[test]
    fn curve_stays_within_tolerance() {
        let mut builder = PathBuilder::new();
        builder.begin(ShapeMode::Line);
        let (from, c1, c2, to) = (vec2(0., 0.), vec2(0., 100.), vec2(100., 100.), vec2(100., 0.));
        builder.curve(from, c1, c2, to, 0.25);
        let points = builder.vertices();
        assert_eq!(points[0], from);
        assert!((*points.last().unwrap() - to).length() < 1e-3);
        assert!(points.len() > 10);
        // the curve peaks at y = 75 for t = 0.5
        let peak = points.iter().map(|p| p.y).fold(0., f32::max);
        assert!((peak - 75.).abs() < 0.5, "peak {}", peak);
    }

    #[test]
    fn non_positive_tolerance_still_flattens() {
        for tolerance in [0., -1., f32::NAN] {
            let mut builder = PathBuilder::new();
            builder.begin(ShapeMode::Line);
            builder.curve(vec2(0., 0.), vec2(0., 10.), vec2(10., 10.), vec2(10., 0.), tolerance);
            let points = builder.vertices();
            assert!(points.len() > 2);
            assert!((*points.last().unwrap() - vec2(10., 0.)).length() < 1e-3);
        }
    }

    #[test]
    fn buffers_are_recycled() {
        let mut builder = build(ShapeMode::Points, &[(0., 0.), (1., 1.)]);
        let path = builder.end(ShapeMode::Points).unwrap().into_path();
        let capacity = path.vertices.capacity();
        builder.recycle(path);
        builder.begin(ShapeMode::Line);
        builder.vertex(vec2(0., 0.));
        builder.end(ShapeMode::Line);
        assert!(builder.path.vertices.capacity() >= capacity);
    }

    #[test]
    fn arc_sampling() {
        let n = arc_segments(100., TAU, 0.25);
        assert!(n >= 32, "{}", n);
        let points: Vec<Vec2> = sample_arc(vec2(0., 0.), vec2(10., 10.), 0., 90., 4).collect();
        assert_eq!(points.len(), 5);
        assert!((points[0] - vec2(10., 0.)).length() < 1e-4);
        // counter-clockwise on a y-up plane
        assert!((points[4] - vec2(0., -10.)).length() < 1e-4);
        assert_eq!(arc_segments(0.1, TAU, 0.25), 1);
    }
}
