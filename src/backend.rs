use std::ops::{Deref, DerefMut};

use glam::Vec2;

use crate::{
    color::Rgb,
    error::BackendError,
    image::RgbaBuffer,
    path::Path,
    style::{FillRule, StrokeStyle},
    text::ShapedGlyph,
    Rect, Region, SnapPolicy,
};

pub mod command;
pub mod raster;
mod scan;
pub mod vector;

pub use command::{Command, RecordingBackend};
pub use raster::RasterBackend;
pub use vector::VectorBackend;

/// The native drawing primitives a driver renders through.
///
/// Every coordinate is in device space. Clipping is installed by
/// the driver with [`set_clip`](Backend::set_clip) and applied
/// by the backend to every primitive.
pub trait Backend: 'static {
    fn name(&self) -> &'static str;

    /// Surface size in device pixels.
    fn size(&self) -> (u32, u32);

    /// How coordinates should be snapped before reaching this backend.
    fn default_snap_policy(&self) -> SnapPolicy;

    /// Installs the clip. `None` disables clipping;
    /// an empty region suppresses all drawing.
    fn set_clip(&mut self, region: Option<&Region>);

    fn set_color(&mut self, color: Rgb);

    /// Makes `pen` current for strokes and returns the pen it replaces.
    fn select_pen(&mut self, pen: &StrokeStyle) -> Result<StrokeStyle, BackendError>;

    /// Reinstates a pen returned by [`select_pen`](Backend::select_pen).
    fn restore_pen(&mut self, previous: StrokeStyle);

    /// Strokes a polyline with the current pen. `closed`
    /// adds an edge from the last point back to the first.
    fn stroke_polyline(&mut self, points: &[Vec2], closed: bool) -> Result<(), BackendError>;

    /// Fills every contour of `path` as one shape.
    fn fill_polygon(&mut self, path: &Path, rule: FillRule) -> Result<(), BackendError>;

    fn fill_rect(&mut self, rect: Rect) -> Result<(), BackendError>;

    /// Sets the pixel containing each point.
    fn draw_points(&mut self, points: &[Vec2]) -> Result<(), BackendError>;

    /// Draws `image` scaled to cover `dest`.
    fn blit_image(&mut self, image: &RgbaBuffer, dest: Rect) -> Result<(), BackendError>;

    /// Draws glyph masks in the current color. Each glyph's offset
    /// is rotated by `angle` radians about `origin`.
    fn draw_glyphs(
        &mut self,
        origin: Vec2,
        angle: f32,
        glyphs: &[ShapedGlyph],
    ) -> Result<(), BackendError>;

    /// Fills the whole surface, ignoring the clip.
    fn clear(&mut self, color: Rgb);

    /// Reads back the surface as `0xAARRGGBB` pixels, row-major.
    fn to_argb(&self) -> Vec<u32>;
}

/// A pen selected for the lifetime of the scope.
///
/// The previous pen is restored when the scope is dropped,
/// including when a stroke inside it fails.
pub struct PenScope<'a, B: Backend + ?Sized> {
    backend: &'a mut B,
    previous: Option<StrokeStyle>,
}

impl<'a, B: Backend + ?Sized> PenScope<'a, B> {
    pub fn select(backend: &'a mut B, pen: &StrokeStyle) -> Result<Self, BackendError> {
        let previous = backend.select_pen(pen)?;
        Ok(Self {
            backend,
            previous: Some(previous),
        })
    }
}

impl<'a, B: Backend + ?Sized> Deref for PenScope<'a, B> {
    type Target = B;

    fn deref(&self) -> &Self::Target {
        self.backend
    }
}

impl<'a, B: Backend + ?Sized> DerefMut for PenScope<'a, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.backend
    }
}

impl<'a, B: Backend + ?Sized> Drop for PenScope<'a, B> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.backend.restore_pen(previous);
        }
    }
}
