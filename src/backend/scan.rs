//! Scan conversion on the integer pixel grid.
//!
//! A pixel belongs to a shape when its center does. Spans are
//! reported as `(y, x0, x1)` covering the pixels `x0..x1` of row `y`.

use glam::{vec2, Vec2};

use crate::{style::FillRule, IRect, Rect};

#[derive(Copy, Clone, Debug)]
struct Edge {
    top: Vec2,
    bottom: Vec2,
    winding: i32,
}

impl Edge {
    fn new(a: Vec2, b: Vec2) -> Option<Self> {
        if a.y == b.y {
            None
        } else if a.y < b.y {
            Some(Self {
                top: a,
                bottom: b,
                winding: 1,
            })
        } else {
            Some(Self {
                top: b,
                bottom: a,
                winding: -1,
            })
        }
    }

    // Top-inclusive, bottom-exclusive.
    fn crossing(&self, y: f32) -> Option<f32> {
        if y < self.top.y || y >= self.bottom.y {
            return None;
        }
        let t = (y - self.top.y) / (self.bottom.y - self.top.y);
        Some(self.top.x + t * (self.bottom.x - self.top.x))
    }
}

/// Reusable buffers for polygon filling.
#[derive(Debug, Default)]
pub struct Scanner {
    edges: Vec<Edge>,
    crossings: Vec<(f32, i32)>,
}

impl Scanner {
    /// Fills the union of closed `contours` under `rule`, visiting
    /// only rows `rows.0..rows.1`.
    pub fn fill<'a>(
        &mut self,
        contours: impl IntoIterator<Item = &'a [Vec2]>,
        rule: FillRule,
        rows: (i32, i32),
        mut span: impl FnMut(i32, i32, i32),
    ) {
        self.edges.clear();
        let mut y_min = f32::INFINITY;
        let mut y_max = f32::NEG_INFINITY;
        for contour in contours {
            for (i, &a) in contour.iter().enumerate() {
                let b = contour[(i + 1) % contour.len()];
                self.edges.extend(Edge::new(a, b));
                y_min = y_min.min(a.y);
                y_max = y_max.max(a.y);
            }
        }
        if self.edges.is_empty() {
            return;
        }

        let first = ((y_min - 0.5).ceil() as i32).max(rows.0);
        let last = ((y_max - 0.5).ceil() as i32).min(rows.1);
        for y in first..last {
            let sample = y as f32 + 0.5;
            self.crossings.clear();
            for edge in &self.edges {
                if let Some(x) = edge.crossing(sample) {
                    self.crossings.push((x, edge.winding));
                }
            }
            self.crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut winding = 0;
            for pair in self.crossings.windows(2) {
                winding += pair[0].1;
                let inside = match rule {
                    FillRule::EvenOdd => winding % 2 != 0,
                    FillRule::NonZero => winding != 0,
                };
                if inside {
                    let x0 = (pair[0].0 - 0.5).ceil() as i32;
                    let x1 = (pair[1].0 - 0.5).ceil() as i32;
                    if x1 > x0 {
                        span(y, x0, x1);
                    }
                }
            }
        }
    }
}

/// Fills an axis-aligned rectangle given by its corners.
pub fn rect(min: Vec2, max: Vec2, rows: (i32, i32), mut span: impl FnMut(i32, i32, i32)) {
    let x0 = (min.x - 0.5).ceil() as i32;
    let x1 = (max.x - 0.5).ceil() as i32;
    if x1 <= x0 {
        return;
    }
    let first = ((min.y - 0.5).ceil() as i32).max(rows.0);
    let last = ((max.y - 0.5).ceil() as i32).min(rows.1);
    for y in first..last {
        span(y, x0, x1);
    }
}

/// Fills a disk.
pub fn disk(center: Vec2, radius: f32, rows: (i32, i32), mut span: impl FnMut(i32, i32, i32)) {
    let first = ((center.y - radius - 0.5).ceil() as i32).max(rows.0);
    let last = ((center.y + radius - 0.5).ceil() as i32).min(rows.1);
    for y in first..last {
        let dy = y as f32 + 0.5 - center.y;
        let dx = (radius * radius - dy * dy).max(0.).sqrt();
        let x0 = (center.x - dx - 0.5).ceil() as i32;
        let x1 = (center.x + dx - 0.5).ceil() as i32;
        if x1 > x0 {
            span(y, x0, x1);
        }
    }
}

/// Plots a one pixel wide line with Bresenham's algorithm.
/// Both end pixels are plotted.
///
/// Only the steps whose major coordinate falls inside `bounds` are
/// visited, so far off-surface endpoints cost nothing.
pub fn line(from: (i32, i32), to: (i32, i32), bounds: IRect, mut plot: impl FnMut(i32, i32)) {
    if bounds.is_empty() {
        return;
    }
    let (x0, y0) = (from.0 as i64, from.1 as i64);
    let (dx, dy) = (to.0 as i64 - x0, to.1 as i64 - y0);
    let (sx, sy) = (dx.signum(), dy.signum());
    let (dx, dy) = (dx.abs(), dy.abs());

    let x_major = dx >= dy;
    let (len, rise, start, step, range) = if x_major {
        (dx, dy, x0, sx, (bounds.x as i64, bounds.x as i64 + bounds.w as i64))
    } else {
        (dy, dx, y0, sy, (bounds.y as i64, bounds.y as i64 + bounds.h as i64))
    };
    let (first, last) = match step {
        1 => (range.0 - start, range.1 - 1 - start),
        -1 => (start - (range.1 - 1), start - range.0),
        _ => (0, 0),
    };

    for k in first.max(0)..=last.min(len) {
        // minor offset of step k, rounded half up
        let offset = (2 * k as i128 * rise as i128 + len as i128) / (2 * len.max(1) as i128);
        let offset = offset as i64;
        let (x, y) = if x_major {
            (x0 + sx * k, y0 + sy * offset)
        } else {
            (x0 + sx * offset, y0 + sy * k)
        };
        plot(x as i32, y as i32);
    }
}

/// The quadrilateral covering a wide segment. `extend_start` and
/// `extend_end` lengthen it along its direction, for square caps.
pub fn segment_quad(
    a: Vec2,
    b: Vec2,
    half_width: f32,
    extend_start: f32,
    extend_end: f32,
) -> Option<[Vec2; 4]> {
    let dir = (b - a).normalize_or_zero();
    if dir == Vec2::ZERO {
        return None;
    }
    let normal = vec2(-dir.y, dir.x) * half_width;
    let a = a - dir * extend_start;
    let b = b + dir * extend_end;
    Some([a + normal, b + normal, b - normal, a - normal])
}

/// The parameter range of the segment `a`..`b` inside `rect`,
/// by Liang-Barsky clipping.
pub fn clip_segment(a: Vec2, b: Vec2, rect: Rect) -> Option<(f32, f32)> {
    let d = b - a;
    let (min, max) = (rect.pos, rect.max());
    let (mut t0, mut t1) = (0f32, 1f32);
    for (p, q) in [
        (-d.x, a.x - min.x),
        (d.x, max.x - a.x),
        (-d.y, a.y - min.y),
        (d.y, max.y - a.y),
    ] {
        if p == 0. {
            if q < 0. {
                return None;
            }
        } else if p < 0. {
            t0 = t0.max(q / p);
        } else {
            t1 = t1.min(q / p);
        }
    }
    (t0 <= t1).then_some((t0, t1))
}

/// Position within a dash pattern.
struct DashPhase<'a> {
    pattern: &'a [f32],
    cycle: usize,
    /// Length of one full cycle of the pattern.
    cycle_length: f32,
    index: usize,
    remaining: f32,
}

impl<'a> DashPhase<'a> {
    fn new(pattern: &'a [f32], period: f32) -> Self {
        // an odd-length pattern is repeated twice per cycle
        let cycle = if pattern.len() % 2 == 1 {
            pattern.len() * 2
        } else {
            pattern.len()
        };
        Self {
            pattern,
            cycle,
            cycle_length: period * (cycle / pattern.len()) as f32,
            index: 0,
            remaining: pattern[0],
        }
    }

    fn is_on(&self) -> bool {
        self.index % 2 == 0
    }

    fn advance(&mut self) {
        self.index = (self.index + 1) % self.cycle;
        self.remaining = self.pattern[self.index % self.pattern.len()];
    }

    /// Moves forward by `length` without drawing.
    fn skip(&mut self, mut length: f32) {
        if length < self.remaining {
            self.remaining -= length;
            return;
        }
        length -= self.remaining;
        self.advance();
        length %= self.cycle_length;
        while length >= self.remaining {
            length -= self.remaining;
            self.advance();
        }
        self.remaining -= length;
    }
}

/// Splits a polyline into its dashes. `pattern` alternates on and
/// off lengths; an odd-length pattern is repeated twice per period.
///
/// Dashes are only produced inside `visible`; the pattern phase still
/// advances over the parts outside it.
pub fn dash(
    points: &[Vec2],
    pattern: &[f32],
    visible: Rect,
    out: &mut Vec<Vec2>,
    mut emit: impl FnMut(&[Vec2]),
) {
    let period: f32 = pattern.iter().sum();
    if points.len() < 2 || pattern.is_empty() || period <= 0. {
        emit(points);
        return;
    }
    let mut flush = |out: &mut Vec<Vec2>| {
        if out.len() > 1 {
            emit(out);
        }
        out.clear();
    };

    let mut phase = DashPhase::new(pattern, period);
    out.clear();
    for segment in points.windows(2) {
        let (a, b) = (segment[0], segment[1]);
        let length = a.distance(b);
        let (t0, t1) = match clip_segment(a, b, visible) {
            Some(range) => range,
            None => {
                flush(out);
                phase.skip(length);
                continue;
            }
        };
        if t0 > 0. {
            flush(out);
            phase.skip(length * t0);
        }

        let (mut p, end) = (a.lerp(b, t0), a.lerp(b, t1));
        if phase.is_on() && out.is_empty() {
            out.push(p);
        }
        let mut left = length * (t1 - t0);
        while left > phase.remaining {
            let q = p.lerp(end, phase.remaining / left);
            if phase.is_on() {
                out.push(q);
                flush(out);
            } else {
                out.clear();
                out.push(q);
            }
            left -= phase.remaining;
            p = q;
            phase.advance();
        }
        phase.remaining -= left;
        if phase.is_on() {
            out.push(end);
        }

        if t1 < 1. {
            flush(out);
            phase.skip(length * (1. - t1));
        }
    }
    if phase.is_on() {
        flush(out);
    }
}
