use glam::{vec2, Affine2, Vec2};
use serde::{Deserialize, Serialize};

use crate::{IRect, Rect};

/// Guards against products like `0.99999` flooring one pixel short.
const SNAP_EPSILON: f32 = 0.001;

/// How real device coordinates are converted to pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapPolicy {
    /// Coordinates are floored to pixel boundaries,
    /// which keeps 1px lines crisp on integer rasterizers.
    PixelSnap,
    /// Real coordinates are passed through to a
    /// rasterizer capable of sub-pixel positioning.
    SubPixel,
}

/// The logical-to-device mapping.
///
/// A logical point `p` maps to `S · R · (p + origin)`:
/// translation first, then rotation, then per-axis scaling.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TransformState {
    pub scale_x: f32,
    pub scale_y: f32,
    /// Rotation in radians.
    pub angle: f32,
    /// Offset added to logical coordinates, in logical units.
    pub origin: Vec2,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            scale_x: 1.,
            scale_y: 1.,
            angle: 0.,
            origin: Vec2::ZERO,
        }
    }
}

impl TransformState {
    pub fn to_affine(&self) -> Affine2 {
        Affine2::from_scale(vec2(self.scale_x, self.scale_y))
            * Affine2::from_angle(self.angle)
            * Affine2::from_translation(self.origin)
    }

    pub fn is_rotated(&self) -> bool {
        self.angle.rem_euclid(std::f32::consts::TAU) != 0.
    }

    fn rotate_vector(&self, v: Vec2) -> Vec2 {
        let (sin, cos) = self.angle.sin_cos();
        vec2(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
    }

    fn apply(&self, p: Vec2) -> Vec2 {
        let rotated = self.rotate_vector(p + self.origin);
        vec2(rotated.x * self.scale_x, rotated.y * self.scale_y)
    }

    fn apply_vector(&self, v: Vec2) -> Vec2 {
        let rotated = self.rotate_vector(v);
        vec2(rotated.x * self.scale_x, rotated.y * self.scale_y)
    }

    fn apply_inverse(&self, p: Vec2) -> Vec2 {
        let unscaled = vec2(p.x / self.scale_x, p.y / self.scale_y);
        let (sin, cos) = self.angle.sin_cos();
        let unrotated = vec2(
            unscaled.x * cos + unscaled.y * sin,
            -unscaled.x * sin + unscaled.y * cos,
        );
        unrotated - self.origin
    }
}

/// The stack of logical-to-device mappings.
///
/// `translate`, `scale` and `rotate` modify the current mapping;
/// `push` and `pop` save and restore it.
#[derive(Debug, Clone)]
pub struct TransformStack {
    state: TransformState,
    saved: Vec<TransformState>,
    base: TransformState,
    snap_policy: SnapPolicy,
}

impl TransformStack {
    /// Creates a stack whose base mapping is `base`.
    ///
    /// `base` typically encodes the output surface: a HiDPI
    /// factor for displays, page scale and margins for printers.
    pub fn new(base: TransformState, snap_policy: SnapPolicy) -> Self {
        Self {
            state: base,
            saved: Vec::new(),
            base,
            snap_policy,
        }
    }

    pub fn state(&self) -> &TransformState {
        &self.state
    }

    pub fn snap_policy(&self) -> SnapPolicy {
        self.snap_policy
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.state.origin += vec2(dx, dy);
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.state.scale_x *= sx;
        self.state.scale_y *= sy;
    }

    /// Rotates by `angle` radians.
    pub fn rotate(&mut self, angle: f32) {
        self.state.angle += angle;
    }

    pub fn push(&mut self) {
        self.saved.push(self.state);
    }

    /// Restores the last pushed mapping. Does nothing
    /// when nothing was pushed.
    pub fn pop(&mut self) {
        if let Some(state) = self.saved.pop() {
            self.state = state;
        }
    }

    /// Drops all saved mappings and returns to the base mapping.
    pub fn reset(&mut self) {
        self.saved.clear();
        self.state = self.base;
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn apply(&self, x: f32, y: f32) -> Vec2 {
        self.state.apply(vec2(x, y))
    }

    pub fn apply_inverse(&self, x: f32, y: f32) -> Vec2 {
        self.state.apply_inverse(vec2(x, y))
    }

    /// Maps a displacement, ignoring the origin.
    pub fn apply_vector(&self, dx: f32, dy: f32) -> Vec2 {
        self.state.apply_vector(vec2(dx, dy))
    }

    /// Maps a logical point to device space and applies the snap policy.
    pub fn to_device(&self, x: f32, y: f32) -> Vec2 {
        self.snap(self.apply(x, y))
    }

    pub fn snap(&self, p: Vec2) -> Vec2 {
        vec2(self.snap_value(p.x), self.snap_value(p.y))
    }

    /// Converts a logical horizontal coordinate to a device pixel coordinate.
    ///
    /// Both code paths that must agree on pixel alignment (for example
    /// the sides of a focus rectangle) pre-snap through this function.
    pub fn floor(&self, v: f32) -> f32 {
        self.snap_value(v * self.state.scale_x)
    }

    /// Mean of the absolute axis scales. Used to scale line widths.
    pub fn average_scale(&self) -> f32 {
        (self.state.scale_x.abs() + self.state.scale_y.abs()) * 0.5
    }

    /// The device-space bounding box of a logical rectangle,
    /// expanded outward to whole pixels.
    pub fn device_rect(&self, x: i32, y: i32, w: i32, h: i32) -> IRect {
        let bbox = Rect::from_xywh(x as f32, y as f32, w as f32, h as f32)
            .bbox_mapped(|p| self.state.apply(p));
        let min = bbox.pos;
        let max = bbox.max();
        IRect::from_ltrb(
            snap_down(min.x),
            snap_down(min.y),
            snap_up(max.x),
            snap_up(max.y),
        )
    }

    /// The logical bounding box of a device rectangle, rounded
    /// to the nearest logical unit.
    pub fn logical_rect(&self, rect: IRect) -> IRect {
        let bbox = rect.to_rect().bbox_mapped(|p| self.state.apply_inverse(p));
        let min = bbox.pos.round();
        let max = bbox.max().round();
        IRect::from_ltrb(min.x as i32, min.y as i32, max.x as i32, max.y as i32)
    }

    fn snap_value(&self, v: f32) -> f32 {
        match self.snap_policy {
            SnapPolicy::PixelSnap => (v + SNAP_EPSILON).floor(),
            SnapPolicy::SubPixel => v,
        }
    }
}

fn snap_down(v: f32) -> i32 {
    (v + SNAP_EPSILON).floor() as i32
}

fn snap_up(v: f32) -> i32 {
    (v - SNAP_EPSILON).ceil() as i32
}
