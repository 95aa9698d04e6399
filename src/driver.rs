//! The device-independent drawing interface.
//!
//! [`GraphicsDriver`] is the object-safe contract toolkit code draws
//! through. [`Driver`] implements it once for every [`Backend`]: it owns
//! the transform stack, clip stack and path builder, maps logical
//! coordinates to device space and hands completed shapes to the backend.

use std::mem;

use glam::{vec2, Vec2};

use crate::{
    backend::{Backend, PenScope, RasterBackend, VectorBackend},
    clip::{ClipBox, ClipStack},
    color::{Color, Palette, Rgb},
    config::{BackendKind, DriverConfig},
    error::{BackendError, LogWarnings, WarningSink},
    image::{BitmapView, ImageFormat, ImageView, RgbaBuffer},
    path::{arc_segments, sample_arc, sweep_radians, PathBuilder, Shape, ShapeMode},
    style::{FillRule, LineStyle, StrokeStyle},
    text::{FontSelection, ShapedGlyph, TextShaper},
    transform::{TransformStack, TransformState},
    IRect, Rect, Region,
};

/// The drawing operations available to toolkit code.
///
/// Coordinates are logical unless a method says otherwise. Clip and
/// path operations never fail; overflows are reported on the driver's
/// warning sink. Drawing operations return the backend's errors.
pub trait GraphicsDriver {
    fn backend_name(&self) -> &'static str;

    /// Surface size in device pixels.
    fn size(&self) -> (u32, u32);

    fn set_color(&mut self, color: Color);
    fn color(&self) -> Color;
    /// The current color resolved through the palette.
    fn rgb(&self) -> Rgb;
    fn set_palette_entry(&mut self, index: u8, rgb: Rgb);

    /// Sets the line style. Widths are logical and scaled by the
    /// transform in effect at the time of the call.
    fn set_line_style(&mut self, style: LineStyle);
    fn line_style(&self) -> &LineStyle;

    fn set_fill_rule(&mut self, rule: FillRule);
    fn fill_rule(&self) -> FillRule;

    fn set_font(&mut self, font: FontSelection);
    fn font(&self) -> FontSelection;

    fn push_matrix(&mut self);
    fn pop_matrix(&mut self);
    fn scale(&mut self, sx: f32, sy: f32);
    /// Rotates counter-clockwise by `degrees`.
    fn rotate(&mut self, degrees: f32);
    fn translate(&mut self, dx: f32, dy: f32);
    fn transform_state(&self) -> TransformState;
    /// Maps a logical point to device space without snapping.
    fn apply(&self, x: f32, y: f32) -> Vec2;
    fn apply_inverse(&self, x: f32, y: f32) -> Vec2;
    /// Converts a logical horizontal coordinate to device pixels
    /// under the snap policy.
    fn floor(&self, v: f32) -> f32;

    fn push_clip(&mut self, x: i32, y: i32, w: i32, h: i32);
    fn push_no_clip(&mut self);
    fn pop_clip(&mut self);
    /// Replaces the current clip with a device-space region,
    /// or disables clipping for `None`.
    fn set_clip_region(&mut self, region: Option<Region>);
    fn clip_region(&self) -> Option<&Region>;
    fn clip_box(&self, x: i32, y: i32, w: i32, h: i32) -> ClipBox;
    fn not_clipped(&self, x: i32, y: i32, w: i32, h: i32) -> bool;
    /// Number of clip frames, the base frame included.
    fn clip_depth(&self) -> usize;
    /// Changes whenever the current clip changes.
    fn clip_state_number(&self) -> u64;

    fn begin_points(&mut self);
    fn begin_line(&mut self);
    fn begin_loop(&mut self);
    fn begin_polygon(&mut self);
    fn begin_complex_polygon(&mut self);
    fn vertex(&mut self, x: f32, y: f32);
    /// Appends a vertex already in device coordinates.
    fn transformed_vertex(&mut self, x: f32, y: f32);
    /// Starts a new contour of a polygon.
    fn gap(&mut self);
    fn curve(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, x2: f32, y2: f32, x3: f32, y3: f32);
    /// Appends an arc of radius `r` around (`x`, `y`) from `start` to
    /// `end` degrees, counter-clockwise.
    fn arc(&mut self, x: f32, y: f32, r: f32, start: f32, end: f32);
    fn circle(&mut self, x: f32, y: f32, r: f32);
    fn end_points(&mut self) -> Result<(), BackendError>;
    fn end_line(&mut self) -> Result<(), BackendError>;
    fn end_loop(&mut self) -> Result<(), BackendError>;
    fn end_polygon(&mut self) -> Result<(), BackendError>;
    fn end_complex_polygon(&mut self) -> Result<(), BackendError>;

    fn point(&mut self, x: i32, y: i32) -> Result<(), BackendError>;
    /// Outlines the `w`×`h` pixels at (`x`, `y`).
    fn rect(&mut self, x: i32, y: i32, w: i32, h: i32) -> Result<(), BackendError>;
    fn rectf(&mut self, x: i32, y: i32, w: i32, h: i32) -> Result<(), BackendError>;
    /// Fills a rectangle in the given color, leaving the current color unchanged.
    fn rectf_rgb(&mut self, x: i32, y: i32, w: i32, h: i32, r: u8, g: u8, b: u8)
        -> Result<(), BackendError>;
    fn xyline(&mut self, x: i32, y: i32, x1: i32) -> Result<(), BackendError>;
    fn xyline2(&mut self, x: i32, y: i32, x1: i32, y2: i32) -> Result<(), BackendError>;
    fn xyline3(&mut self, x: i32, y: i32, x1: i32, y2: i32, x3: i32)
        -> Result<(), BackendError>;
    fn yxline(&mut self, x: i32, y: i32, y1: i32) -> Result<(), BackendError>;
    fn yxline2(&mut self, x: i32, y: i32, y1: i32, x2: i32) -> Result<(), BackendError>;
    fn yxline3(&mut self, x: i32, y: i32, y1: i32, x2: i32, y3: i32)
        -> Result<(), BackendError>;
    fn line(&mut self, x: i32, y: i32, x1: i32, y1: i32) -> Result<(), BackendError>;
    fn line_through(&mut self, x: i32, y: i32, x1: i32, y1: i32, x2: i32, y2: i32)
        -> Result<(), BackendError>;
    fn loop_tri(&mut self, x: i32, y: i32, x1: i32, y1: i32, x2: i32, y2: i32)
        -> Result<(), BackendError>;
    fn loop_quad(
        &mut self,
        x: i32,
        y: i32,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        x3: i32,
        y3: i32,
    ) -> Result<(), BackendError>;
    fn polygon_tri(&mut self, x: i32, y: i32, x1: i32, y1: i32, x2: i32, y2: i32)
        -> Result<(), BackendError>;
    fn polygon_quad(
        &mut self,
        x: i32,
        y: i32,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        x3: i32,
        y3: i32,
    ) -> Result<(), BackendError>;
    /// Outlines the part of the ellipse inscribed in the box
    /// between `start` and `end` degrees.
    fn arc_box(&mut self, x: i32, y: i32, w: i32, h: i32, start: f32, end: f32)
        -> Result<(), BackendError>;
    /// Fills a pie slice of the ellipse inscribed in the box.
    fn pie(&mut self, x: i32, y: i32, w: i32, h: i32, start: f32, end: f32)
        -> Result<(), BackendError>;
    /// Draws a dotted outline, setting every other pixel.
    fn focus_rect(&mut self, x: i32, y: i32, w: i32, h: i32) -> Result<(), BackendError>;

    /// Draws the `w`×`h` region of `image` starting at (`cx`, `cy`)
    /// with its top-left corner at (`x`, `y`).
    fn draw_image(
        &mut self,
        image: &ImageView<'_>,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        cx: i32,
        cy: i32,
    ) -> Result<(), BackendError>;
    /// Like [`draw_image`](Self::draw_image) for a 1-bit mask drawn
    /// in the current color.
    fn draw_bitmap(
        &mut self,
        bitmap: &BitmapView<'_>,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        cx: i32,
        cy: i32,
    ) -> Result<(), BackendError>;
    /// Draws an image produced one row at a time. `source(y, row)`
    /// writes row `y` as `w` pixels of `format`.
    fn draw_image_lines(
        &mut self,
        source: &mut dyn FnMut(u32, &mut [u8]),
        format: ImageFormat,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    ) -> Result<(), BackendError>;

    /// Draws `text` with its baseline starting at (`x`, `y`).
    fn draw_text(&mut self, text: &str, x: f32, y: f32) -> Result<(), BackendError>;
    /// Draws `text` rotated counter-clockwise by `degrees` about its origin.
    fn draw_text_rotated(&mut self, degrees: f32, text: &str, x: f32, y: f32)
        -> Result<(), BackendError>;
    /// Draws the characters of `text` in reverse order, ending at `x`.
    fn rtl_draw_text(&mut self, text: &str, x: f32, y: f32) -> Result<(), BackendError>;
    fn text_width(&self, text: &str) -> f32;
    fn text_height(&self) -> f32;
    fn text_descent(&self) -> f32;

    /// Fills the whole surface, ignoring the clip.
    fn clear(&mut self, color: Color);
    /// Reads back the surface as `0xAARRGGBB` pixels.
    fn to_argb(&self) -> Vec<u32>;
}

/// Device coordinates beyond this are clamped when culling.
const DEVICE_LIMIT: f32 = (1 << 29) as f32;

/// One axis of an image source region: the destination offset,
/// first source pixel and length, without the part before the origin.
fn source_span(len: i32, start: i32) -> Option<(i32, u32, u32)> {
    let skip = start.min(0).unsigned_abs();
    if len <= 0 || skip >= len as u32 {
        return None;
    }
    Some((skip as i32, start.max(0) as u32, len as u32 - skip))
}

/// Creates a driver for the backend named by `config`.
pub fn create_driver(
    config: &DriverConfig,
    shaper: Box<dyn TextShaper>,
) -> Result<Box<dyn GraphicsDriver>, BackendError> {
    config.validate()?;
    let driver: Box<dyn GraphicsDriver> = match config.backend {
        BackendKind::Vector => Box::new(Driver::new(
            VectorBackend::new(config.width, config.height, config.anti_alias)?,
            config,
            shaper,
        )),
        BackendKind::Raster => Box::new(Driver::new(
            RasterBackend::new(config.width, config.height)?,
            config,
            shaper,
        )),
    };
    log::info!(
        "Created {} driver ({}x{}, {} surface)",
        driver.backend_name(),
        config.width,
        config.height,
        if config.surface.is_display() {
            "display"
        } else {
            "print"
        }
    );
    Ok(driver)
}

/// A [`GraphicsDriver`] drawing through the backend `B`.
pub struct Driver<B: Backend> {
    backend: B,
    transform: TransformStack,
    clip: ClipStack,
    path: PathBuilder,
    /// Builds the shapes of the fixed-arity helpers, so they never
    /// disturb a path under construction.
    helper_path: PathBuilder,
    palette: Palette,
    color: Color,
    line_style: LineStyle,
    stroke: StrokeStyle,
    fill_rule: FillRule,
    font: FontSelection,
    shaper: Box<dyn TextShaper>,
    warnings: Box<dyn WarningSink>,
    curve_tolerance: f32,

    glyphs: Vec<ShapedGlyph>,
    image: RgbaBuffer,
    row: Vec<u8>,
    points: Vec<Vec2>,
    reversed: String,
}

impl<B: Backend> Driver<B> {
    pub fn new(mut backend: B, config: &DriverConfig, shaper: Box<dyn TextShaper>) -> Self {
        let snap_policy = config
            .snap_policy
            .unwrap_or_else(|| backend.default_snap_policy());
        let curve_tolerance = if config.curve_tolerance > 0. {
            config.curve_tolerance
        } else {
            let fallback = DriverConfig::default().curve_tolerance;
            log::warn!(
                "Curve tolerance {} is not positive, using {}",
                config.curve_tolerance,
                fallback
            );
            fallback
        };
        let palette = Palette::default();
        let color = Color::default();
        backend.set_color(palette.resolve(color));
        Self {
            backend,
            transform: TransformStack::new(config.surface.base_transform(), snap_policy),
            clip: ClipStack::new(config.max_clip_depth),
            path: PathBuilder::new(),
            helper_path: PathBuilder::new(),
            palette,
            color,
            line_style: LineStyle::default(),
            stroke: StrokeStyle::default(),
            fill_rule: FillRule::default(),
            font: FontSelection::default(),
            shaper,
            warnings: Box::new(LogWarnings),
            curve_tolerance,
            glyphs: Vec::new(),
            image: RgbaBuffer::default(),
            row: Vec::new(),
            points: Vec::new(),
            reversed: String::new(),
        }
    }

    /// Sends warnings to `sink` instead of the log.
    pub fn with_warnings(mut self, sink: impl WarningSink + 'static) -> Self {
        self.warnings = Box::new(sink);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn transform(&self) -> &TransformStack {
        &self.transform
    }

    fn warn(&self, error: &dyn std::error::Error) {
        self.warnings.warning(&error.to_string());
    }

    fn install_clip(&mut self) {
        self.backend.set_clip(self.clip.region());
    }

    /// Whether device-space `bounds`, grown by `pad`, may be visible.
    fn visible(&self, bounds: Rect, pad: f32) -> bool {
        // keeps the rectangle's sides representable in i32
        let limit = Vec2::splat(DEVICE_LIMIT);
        let min = (bounds.pos - Vec2::splat(pad)).floor().clamp(-limit, limit);
        let max = ((bounds.max() + Vec2::splat(pad)).ceil() + Vec2::ONE).clamp(-limit, limit);
        let rect = IRect::from_ltrb(min.x as i32, min.y as i32, max.x as i32, max.y as i32);
        self.clip.not_clipped_device(&rect)
    }

    fn stroke_pad(&self) -> f32 {
        // covers miters up to the backends' limit
        self.stroke.width * 2. + 1.
    }

    fn draw_shape(&mut self, shape: &Shape) -> Result<(), BackendError> {
        let pad = match shape {
            Shape::Polyline { .. } => self.stroke_pad(),
            _ => 0.,
        };
        match shape.path().bounds() {
            Some(bounds) if self.visible(bounds, pad) => {}
            _ => return Ok(()),
        }

        match shape {
            Shape::Points(path) => self.backend.draw_points(path.vertices()),
            Shape::Polyline { path, closed } => {
                let mut pen = PenScope::select(&mut self.backend, &self.stroke)?;
                pen.stroke_polyline(path.vertices(), *closed)
            }
            Shape::Polygon(path) => self.backend.fill_polygon(path, self.fill_rule),
        }
    }

    fn end_shape(&mut self, kind: ShapeMode) -> Result<(), BackendError> {
        let shape = match self.path.end(kind) {
            Some(shape) => shape,
            None => return Ok(()),
        };
        let result = self.draw_shape(&shape);
        self.path.recycle(shape.into_path());
        result
    }

    /// Draws a fixed shape from logical vertices, with the same
    /// semantics as the begin/vertex/end sequence for `kind`.
    fn fixed_shape(
        &mut self,
        kind: ShapeMode,
        vertices: impl IntoIterator<Item = Vec2>,
    ) -> Result<(), BackendError> {
        self.helper_path.begin(kind);
        for v in vertices {
            let p = self.transform.to_device(v.x, v.y);
            self.helper_path.vertex(p);
        }
        let shape = match self.helper_path.end(kind) {
            Some(shape) => shape,
            None => return Ok(()),
        };
        let result = self.draw_shape(&shape);
        self.helper_path.recycle(shape.into_path());
        result
    }

    fn fixed_ints(&mut self, kind: ShapeMode, points: &[(i32, i32)]) -> Result<(), BackendError> {
        self.fixed_shape(kind, points.iter().map(|&(x, y)| vec2(x as f32, y as f32)))
    }

    /// Samples the ellipse inscribed in a box, in logical coordinates.
    fn box_arc(
        &self,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        start: f32,
        end: f32,
    ) -> impl Iterator<Item = Vec2> {
        let radius = vec2(w as f32, h as f32) / 2.;
        let center = vec2(x as f32, y as f32) + radius;
        let device_radius = self.transform.apply_vector(radius.x, 0.).length().max(
            self.transform.apply_vector(0., radius.y).length(),
        );
        let segments = arc_segments(
            device_radius,
            sweep_radians(start, end),
            self.curve_tolerance,
        );
        sample_arc(center, radius, start, end, segments)
    }

    /// Blits the scratch image with its top-left corner at (`x`, `y`).
    fn blit_scratch(&mut self, x: i32, y: i32) -> Result<(), BackendError> {
        if self.image.is_empty() {
            return Ok(());
        }
        let logical = Rect::from_xywh(
            x as f32,
            y as f32,
            self.image.width() as f32,
            self.image.height() as f32,
        );
        let transform = &self.transform;
        let dest = logical.bbox_mapped(|p| transform.to_device(p.x, p.y));
        if !self.visible(dest, 0.) {
            return Ok(());
        }
        self.backend.blit_image(&self.image, dest)
    }

    fn draw_glyph_run(&mut self, text: &str, origin: Vec2, angle: f32) -> Result<(), BackendError> {
        let font = FontSelection {
            size: self.font.size * self.transform.average_scale(),
            ..self.font
        };
        if angle == 0. {
            let metrics = self.shaper.line_metrics(font);
            let width = self.shaper.measure(font, text);
            let bounds = Rect::from_xywh(
                origin.x,
                origin.y - metrics.ascent,
                width,
                metrics.height(),
            );
            if !self.visible(bounds, 1.) {
                return Ok(());
            }
        }

        self.glyphs.clear();
        self.shaper.shape(font, text, &mut self.glyphs);
        if self.glyphs.is_empty() {
            return Ok(());
        }
        self.backend.draw_glyphs(origin, angle, &self.glyphs)
    }
}

impl<B: Backend> GraphicsDriver for Driver<B> {
    fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn size(&self) -> (u32, u32) {
        self.backend.size()
    }

    fn set_color(&mut self, color: Color) {
        self.color = color;
        self.backend.set_color(self.palette.resolve(color));
    }

    fn color(&self) -> Color {
        self.color
    }

    fn rgb(&self) -> Rgb {
        self.palette.resolve(self.color)
    }

    fn set_palette_entry(&mut self, index: u8, rgb: Rgb) {
        self.palette.set(index, rgb);
        if self.color == Color::Indexed(index) {
            self.backend.set_color(rgb);
        }
    }

    fn set_line_style(&mut self, style: LineStyle) {
        self.stroke = style.to_stroke(self.transform.average_scale());
        self.line_style = style;
    }

    fn line_style(&self) -> &LineStyle {
        &self.line_style
    }

    fn set_fill_rule(&mut self, rule: FillRule) {
        self.fill_rule = rule;
    }

    fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    fn set_font(&mut self, font: FontSelection) {
        self.font = font;
    }

    fn font(&self) -> FontSelection {
        self.font
    }

    fn push_matrix(&mut self) {
        self.transform.push();
    }

    fn pop_matrix(&mut self) {
        self.transform.pop();
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.transform.scale(sx, sy);
    }

    fn rotate(&mut self, degrees: f32) {
        // device y points down
        self.transform.rotate(-degrees.to_radians());
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.transform.translate(dx, dy);
    }

    fn transform_state(&self) -> TransformState {
        *self.transform.state()
    }

    fn apply(&self, x: f32, y: f32) -> Vec2 {
        self.transform.apply(x, y)
    }

    fn apply_inverse(&self, x: f32, y: f32) -> Vec2 {
        self.transform.apply_inverse(x, y)
    }

    fn floor(&self, v: f32) -> f32 {
        self.transform.floor(v)
    }

    fn push_clip(&mut self, x: i32, y: i32, w: i32, h: i32) {
        match self.clip.push_clip(&self.transform, x, y, w, h) {
            Ok(()) => self.install_clip(),
            Err(overflow) => self.warn(&overflow),
        }
    }

    fn push_no_clip(&mut self) {
        match self.clip.push_no_clip() {
            Ok(()) => self.install_clip(),
            Err(overflow) => self.warn(&overflow),
        }
    }

    fn pop_clip(&mut self) {
        if self.clip.pop_clip() {
            self.install_clip();
        }
    }

    fn set_clip_region(&mut self, region: Option<Region>) {
        match self.clip.set_region(region) {
            Ok(()) => self.install_clip(),
            Err(e) => self.warn(&e),
        }
    }

    fn clip_region(&self) -> Option<&Region> {
        self.clip.region()
    }

    fn clip_box(&self, x: i32, y: i32, w: i32, h: i32) -> ClipBox {
        self.clip.clip_box(&self.transform, x, y, w, h)
    }

    fn not_clipped(&self, x: i32, y: i32, w: i32, h: i32) -> bool {
        self.clip.not_clipped(&self.transform, x, y, w, h)
    }

    fn clip_depth(&self) -> usize {
        self.clip.depth()
    }

    fn clip_state_number(&self) -> u64 {
        self.clip.state_number()
    }

    fn begin_points(&mut self) {
        self.path.begin(ShapeMode::Points);
    }

    fn begin_line(&mut self) {
        self.path.begin(ShapeMode::Line);
    }

    fn begin_loop(&mut self) {
        self.path.begin(ShapeMode::Loop);
    }

    fn begin_polygon(&mut self) {
        self.path.begin(ShapeMode::Polygon);
    }

    fn begin_complex_polygon(&mut self) {
        self.path.begin(ShapeMode::Polygon);
    }

    fn vertex(&mut self, x: f32, y: f32) {
        let p = self.transform.to_device(x, y);
        self.path.vertex(p);
    }

    fn transformed_vertex(&mut self, x: f32, y: f32) {
        self.path.vertex(vec2(x, y));
    }

    fn gap(&mut self) {
        self.path.gap();
    }

    fn curve(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, x2: f32, y2: f32, x3: f32, y3: f32) {
        let t = &self.transform;
        let (from, ctrl1, ctrl2, to) = (
            t.to_device(x0, y0),
            t.apply(x1, y1),
            t.apply(x2, y2),
            t.to_device(x3, y3),
        );
        self.path
            .curve(from, ctrl1, ctrl2, to, self.curve_tolerance);
    }

    fn arc(&mut self, x: f32, y: f32, r: f32, start: f32, end: f32) {
        let device_radius = self.transform.apply_vector(r, 0.).length().max(
            self.transform.apply_vector(0., r).length(),
        );
        let segments = arc_segments(
            device_radius,
            sweep_radians(start, end),
            self.curve_tolerance,
        );
        for p in sample_arc(vec2(x, y), Vec2::splat(r), start, end, segments) {
            let p = self.transform.to_device(p.x, p.y);
            self.transformed_vertex(p.x, p.y);
        }
    }

    fn circle(&mut self, x: f32, y: f32, r: f32) {
        self.arc(x, y, r, 0., 360.);
    }

    fn end_points(&mut self) -> Result<(), BackendError> {
        self.end_shape(ShapeMode::Points)
    }

    fn end_line(&mut self) -> Result<(), BackendError> {
        self.end_shape(ShapeMode::Line)
    }

    fn end_loop(&mut self) -> Result<(), BackendError> {
        self.end_shape(ShapeMode::Loop)
    }

    fn end_polygon(&mut self) -> Result<(), BackendError> {
        self.end_shape(ShapeMode::Polygon)
    }

    fn end_complex_polygon(&mut self) -> Result<(), BackendError> {
        self.end_shape(ShapeMode::Polygon)
    }

    fn point(&mut self, x: i32, y: i32) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Points, &[(x, y)])
    }

    fn rect(&mut self, x: i32, y: i32, w: i32, h: i32) -> Result<(), BackendError> {
        if w <= 0 || h <= 0 {
            return Ok(());
        }
        let (r, b) = (x + w - 1, y + h - 1);
        self.fixed_ints(ShapeMode::Loop, &[(x, y), (r, y), (r, b), (x, b)])
    }

    fn rectf(&mut self, x: i32, y: i32, w: i32, h: i32) -> Result<(), BackendError> {
        if w <= 0 || h <= 0 {
            return Ok(());
        }
        let (r, b) = (x + w, y + h);
        if self.transform.state().is_rotated() {
            return self.fixed_ints(ShapeMode::Polygon, &[(x, y), (r, y), (r, b), (x, b)]);
        }
        let p0 = self.transform.to_device(x as f32, y as f32);
        let p1 = self.transform.to_device(r as f32, b as f32);
        let rect = Rect::new(p0.min(p1), (p1 - p0).abs());
        if !self.visible(rect, 0.) {
            return Ok(());
        }
        self.backend.fill_rect(rect)
    }

    fn rectf_rgb(
        &mut self,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        r: u8,
        g: u8,
        b: u8,
    ) -> Result<(), BackendError> {
        let saved = self.color;
        self.set_color(Color::rgb(r, g, b));
        let result = self.rectf(x, y, w, h);
        self.set_color(saved);
        result
    }

    fn xyline(&mut self, x: i32, y: i32, x1: i32) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Line, &[(x, y), (x1, y)])
    }

    fn xyline2(&mut self, x: i32, y: i32, x1: i32, y2: i32) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Line, &[(x, y), (x1, y), (x1, y2)])
    }

    fn xyline3(
        &mut self,
        x: i32,
        y: i32,
        x1: i32,
        y2: i32,
        x3: i32,
    ) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Line, &[(x, y), (x1, y), (x1, y2), (x3, y2)])
    }

    fn yxline(&mut self, x: i32, y: i32, y1: i32) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Line, &[(x, y), (x, y1)])
    }

    fn yxline2(&mut self, x: i32, y: i32, y1: i32, x2: i32) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Line, &[(x, y), (x, y1), (x2, y1)])
    }

    fn yxline3(
        &mut self,
        x: i32,
        y: i32,
        y1: i32,
        x2: i32,
        y3: i32,
    ) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Line, &[(x, y), (x, y1), (x2, y1), (x2, y3)])
    }

    fn line(&mut self, x: i32, y: i32, x1: i32, y1: i32) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Line, &[(x, y), (x1, y1)])
    }

    fn line_through(
        &mut self,
        x: i32,
        y: i32,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    ) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Line, &[(x, y), (x1, y1), (x2, y2)])
    }

    fn loop_tri(
        &mut self,
        x: i32,
        y: i32,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    ) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Loop, &[(x, y), (x1, y1), (x2, y2)])
    }

    fn loop_quad(
        &mut self,
        x: i32,
        y: i32,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        x3: i32,
        y3: i32,
    ) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Loop, &[(x, y), (x1, y1), (x2, y2), (x3, y3)])
    }

    fn polygon_tri(
        &mut self,
        x: i32,
        y: i32,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    ) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Polygon, &[(x, y), (x1, y1), (x2, y2)])
    }

    fn polygon_quad(
        &mut self,
        x: i32,
        y: i32,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        x3: i32,
        y3: i32,
    ) -> Result<(), BackendError> {
        self.fixed_ints(ShapeMode::Polygon, &[(x, y), (x1, y1), (x2, y2), (x3, y3)])
    }

    fn arc_box(
        &mut self,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        start: f32,
        end: f32,
    ) -> Result<(), BackendError> {
        if w <= 0 || h <= 0 {
            return Ok(());
        }
        let samples = self.box_arc(x, y, w, h, start, end);
        self.fixed_shape(ShapeMode::Line, samples)
    }

    fn pie(
        &mut self,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        start: f32,
        end: f32,
    ) -> Result<(), BackendError> {
        if w <= 0 || h <= 0 {
            return Ok(());
        }
        let center = vec2(x as f32, y as f32) + vec2(w as f32, h as f32) / 2.;
        let full_circle = (end - start).abs() >= 360.;
        let samples = self.box_arc(x, y, w, h, start, end);
        let vertices = (!full_circle).then_some(center).into_iter().chain(samples);
        self.fixed_shape(ShapeMode::Polygon, vertices)
    }

    fn focus_rect(&mut self, x: i32, y: i32, w: i32, h: i32) -> Result<(), BackendError> {
        if w <= 0 || h <= 0 {
            return Ok(());
        }
        // snapped corners, so the dots line up with other outlines
        let transform = &self.transform;
        let bbox = Rect::from_xywh(x as f32, y as f32, w as f32, h as f32)
            .bbox_mapped(|p| transform.to_device(p.x, p.y));
        let corner = bbox.pos;
        let (w, h) = (bbox.size.x as i32, bbox.size.y as i32);
        if w <= 0 || h <= 0 {
            return Ok(());
        }

        let mut points = mem::take(&mut self.points);
        points.clear();
        let mut dot = |dx: i32, dy: i32| {
            if (dx + dy) % 2 == 0 {
                points.push(corner + vec2(dx as f32, dy as f32));
            }
        };
        for dx in 0..w {
            dot(dx, 0);
            if h > 1 {
                dot(dx, h - 1);
            }
        }
        for dy in 1..h - 1 {
            dot(0, dy);
            if w > 1 {
                dot(w - 1, dy);
            }
        }

        let bounds = Rect::new(corner, vec2(w as f32, h as f32));
        let result = if self.visible(bounds, 0.) {
            self.backend.draw_points(&points)
        } else {
            Ok(())
        };
        self.points = points;
        result
    }

    fn draw_image(
        &mut self,
        image: &ImageView<'_>,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        cx: i32,
        cy: i32,
    ) -> Result<(), BackendError> {
        let ((dx, cx, w), (dy, cy, h)) = match (source_span(w, cx), source_span(h, cy)) {
            (Some(columns), Some(rows)) => (columns, rows),
            _ => return Ok(()),
        };
        image.copy_region(cx, cy, w, h, &mut self.image);
        self.blit_scratch(x.saturating_add(dx), y.saturating_add(dy))
    }

    fn draw_bitmap(
        &mut self,
        bitmap: &BitmapView<'_>,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        cx: i32,
        cy: i32,
    ) -> Result<(), BackendError> {
        let ((dx, cx, w), (dy, cy, h)) = match (source_span(w, cx), source_span(h, cy)) {
            (Some(columns), Some(rows)) => (columns, rows),
            _ => return Ok(()),
        };
        let color = self.rgb();
        bitmap.copy_region(cx, cy, w, h, color, &mut self.image);
        self.blit_scratch(x.saturating_add(dx), y.saturating_add(dy))
    }

    fn draw_image_lines(
        &mut self,
        source: &mut dyn FnMut(u32, &mut [u8]),
        format: ImageFormat,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    ) -> Result<(), BackendError> {
        if w <= 0 || h <= 0 {
            return Ok(());
        }
        self.image
            .fill_from_rows(w as u32, h as u32, format, &mut self.row, source);
        self.blit_scratch(x, y)
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32) -> Result<(), BackendError> {
        let origin = self.transform.to_device(x, y);
        let angle = self.transform.state().angle;
        self.draw_glyph_run(text, origin, angle)
    }

    fn draw_text_rotated(
        &mut self,
        degrees: f32,
        text: &str,
        x: f32,
        y: f32,
    ) -> Result<(), BackendError> {
        let origin = self.transform.to_device(x, y);
        let angle = self.transform.state().angle - degrees.to_radians();
        self.draw_glyph_run(text, origin, angle)
    }

    fn rtl_draw_text(&mut self, text: &str, x: f32, y: f32) -> Result<(), BackendError> {
        let mut reversed = mem::take(&mut self.reversed);
        reversed.clear();
        reversed.extend(text.chars().rev());
        let width = self.text_width(&reversed);
        let result = self.draw_text(&reversed, x - width, y);
        self.reversed = reversed;
        result
    }

    fn text_width(&self, text: &str) -> f32 {
        self.shaper.measure(self.font, text)
    }

    fn text_height(&self) -> f32 {
        self.shaper.line_metrics(self.font).height()
    }

    fn text_descent(&self) -> f32 {
        self.shaper.line_metrics(self.font).descent
    }

    fn clear(&mut self, color: Color) {
        self.backend.clear(self.palette.resolve(color));
    }

    fn to_argb(&self) -> Vec<u32> {
        self.backend.to_argb()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{
        backend::{Command, RecordingBackend},
        config::SurfaceKind,
        text::BoxShaper,
    };

    const BLACK: Color = Color::rgb(0, 0, 0);

    fn recording() -> Driver<RecordingBackend> {
        Driver::new(
            RecordingBackend::new(100, 100),
            &DriverConfig::default(),
            Box::new(BoxShaper),
        )
    }

    fn raster(width: u32, height: u32) -> Driver<RasterBackend> {
        let config = DriverConfig {
            backend: BackendKind::Raster,
            width,
            height,
            ..Default::default()
        };
        let mut driver = Driver::new(
            RasterBackend::new(width, height).unwrap(),
            &config,
            Box::new(BoxShaper),
        );
        driver.set_color(BLACK);
        driver
    }

    fn black_pixels(driver: &Driver<RasterBackend>) -> usize {
        driver.backend().count(Rgb::BLACK)
    }

    fn draws(driver: &mut Driver<RecordingBackend>) -> Vec<Command> {
        let commands = driver.backend_mut().take_commands();
        commands.into_iter().filter(Command::is_draw).collect()
    }

    #[test]
    fn nested_clips_intersect() {
        let mut driver = recording();
        assert_eq!(driver.clip_depth(), 1);
        driver.push_clip(10, 10, 50, 50);
        driver.push_clip(20, 20, 10, 10);
        assert_eq!(
            driver.clip_box(0, 0, 100, 100),
            ClipBox::Partial(IRect::new(20, 20, 10, 10))
        );
        assert_eq!(driver.clip_box(22, 22, 4, 4), ClipBox::Inside);
        assert_eq!(driver.clip_box(40, 40, 5, 5), ClipBox::Disjoint);

        driver.pop_clip();
        assert_eq!(
            driver.clip_box(0, 0, 100, 100),
            ClipBox::Partial(IRect::new(10, 10, 50, 50))
        );
        driver.pop_clip();
        assert_eq!(driver.clip_box(0, 0, 100, 100), ClipBox::Inside);
        // popping the base frame is ignored
        driver.pop_clip();
        assert_eq!(driver.clip_depth(), 1);
    }

    #[test]
    fn every_clip_change_reaches_the_backend() {
        let mut driver = recording();
        let before = driver.clip_state_number();
        driver.push_clip(0, 0, 10, 10);
        driver.push_no_clip();
        driver.pop_clip();
        driver.pop_clip();
        let installs: Vec<Option<Region>> = driver
            .backend_mut()
            .take_commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::SetClip(region) => Some(region),
                _ => None,
            })
            .collect();
        let square = Some(Region::from_xywh(0, 0, 10, 10));
        assert_eq!(installs, vec![square.clone(), None, square, None]);
        assert_eq!(driver.clip_state_number(), before + 4);
    }

    #[test]
    fn polygon_fills_exact_square() {
        let mut driver = raster(32, 32);
        assert!(driver.not_clipped(0, 0, 10, 10));
        driver.begin_polygon();
        driver.vertex(0., 0.);
        driver.vertex(10., 0.);
        driver.vertex(10., 10.);
        driver.vertex(0., 10.);
        driver.end_polygon().unwrap();
        assert_eq!(black_pixels(&driver), 100);
        assert_eq!(driver.backend().pixel(9, 9), Rgb::BLACK);
        assert_eq!(driver.backend().pixel(10, 10), Rgb::WHITE);
        assert!(driver.not_clipped(0, 0, 10, 10));
    }

    #[test]
    fn clip_overflow_drops_pushes_and_warns() {
        let warnings = Rc::new(Cell::new(0));
        let counter = Rc::clone(&warnings);
        let mut driver = recording().with_warnings(move |_: &str| counter.set(counter.get() + 1));

        for i in 0..1000 {
            driver.push_clip(i, 0, 100 - i, 100);
        }
        assert_eq!(driver.clip_depth(), 10);
        assert_eq!(warnings.get(), 991);
        // the last accepted push is still current
        assert_eq!(
            driver.clip_box(0, 0, 100, 100),
            ClipBox::Partial(IRect::new(8, 0, 92, 100))
        );

        driver.push_no_clip();
        assert_eq!(warnings.get(), 992);
        for _ in 0..9 {
            driver.pop_clip();
        }
        assert_eq!(driver.clip_box(0, 0, 100, 100), ClipBox::Inside);
    }

    #[test]
    fn base_frame_rejects_a_region() {
        let warnings = Rc::new(Cell::new(0));
        let counter = Rc::clone(&warnings);
        let mut driver = recording().with_warnings(move |_: &str| counter.set(counter.get() + 1));
        driver.set_clip_region(Some(Region::from_xywh(0, 0, 5, 5)));
        assert_eq!(warnings.get(), 1);
        assert!(driver.clip_region().is_none());

        driver.push_clip(0, 0, 50, 50);
        let mut l_shape = Region::from_xywh(0, 0, 10, 30);
        l_shape.union_rect(IRect::new(10, 20, 20, 10));
        driver.set_clip_region(Some(l_shape.clone()));
        assert_eq!(warnings.get(), 1);
        assert_eq!(driver.clip_region(), Some(&l_shape));
        assert_eq!(driver.clip_box(12, 0, 5, 5), ClipBox::Disjoint);
        assert!(driver.not_clipped(12, 22, 5, 5));
    }

    #[test]
    fn print_surface_converts_clip_coordinates() {
        let config = DriverConfig {
            surface: SurfaceKind::Print {
                scale_x: 2.,
                scale_y: 2.,
                angle: 0.,
                left_margin: 100.,
                top_margin: 50.,
            },
            ..Default::default()
        };
        let mut driver = Driver::new(
            RecordingBackend::new(1000, 1000),
            &config,
            Box::new(BoxShaper),
        );
        driver.push_clip(10, 10, 50, 50);
        assert_eq!(
            driver.clip_region(),
            Some(&Region::from_xywh(120, 70, 100, 100))
        );
        assert_eq!(
            driver.clip_box(0, 0, 100, 100),
            ClipBox::Partial(IRect::new(10, 10, 50, 50))
        );
        assert_eq!(driver.clip_box(20, 20, 10, 10), ClipBox::Inside);
        assert!(!driver.not_clipped(70, 70, 10, 10));
    }

    #[test]
    fn loop_matches_line_with_closing_segment() {
        let shapes: [&[(f32, f32)]; 3] = [
            &[(5., 5.), (40., 9.), (22., 50.)],
            &[(3., 3.), (60., 3.), (60., 60.), (3., 60.)],
            &[(10., 30.), (30., 5.), (50., 30.), (40., 55.), (20., 55.), (30., 30.)],
        ];
        for width in [0., 1., 4.] {
            for vertices in shapes {
                let mut looped = raster(64, 64);
                looped.set_line_style(LineStyle::solid().width(width));
                looped.begin_loop();
                for &(x, y) in vertices {
                    looped.vertex(x, y);
                }
                looped.end_loop().unwrap();

                let mut lined = raster(64, 64);
                lined.set_line_style(LineStyle::solid().width(width));
                lined.begin_line();
                for &(x, y) in vertices.iter().chain(&vertices[..1]) {
                    lined.vertex(x, y);
                }
                lined.end_line().unwrap();

                assert!(black_pixels(&looped) > 0);
                assert_eq!(looped.backend().pixels(), lined.backend().pixels());
            }
        }
    }

    #[test]
    fn gap_separates_contours() {
        let mut driver = raster(64, 64);
        driver.begin_polygon();
        for (x, y) in [(0., 0.), (10., 0.), (10., 10.), (0., 10.)] {
            driver.vertex(x, y);
        }
        driver.gap();
        for (x, y) in [(20., 0.), (30., 0.), (30., 10.), (20., 10.)] {
            driver.vertex(x, y);
        }
        driver.end_polygon().unwrap();
        assert_eq!(black_pixels(&driver), 200);
        // no edge joins the two squares
        assert_eq!(driver.backend().pixel(15, 5), Rgb::WHITE);

        let mut holed = raster(64, 64);
        holed.begin_complex_polygon();
        for (x, y) in [(0., 0.), (20., 0.), (20., 20.), (0., 20.)] {
            holed.vertex(x, y);
        }
        holed.gap();
        for (x, y) in [(5., 5.), (15., 5.), (15., 15.), (5., 15.)] {
            holed.vertex(x, y);
        }
        holed.end_complex_polygon().unwrap();
        assert_eq!(black_pixels(&holed), 400 - 100);
        assert_eq!(holed.backend().pixel(10, 10), Rgb::WHITE);
    }

    #[test]
    fn pens_are_restored_after_every_stroke() {
        let mut driver = recording();
        driver.set_line_style(LineStyle::solid().width(3.));
        driver.line(0, 0, 10, 10).unwrap();
        driver.rect(5, 5, 10, 10).unwrap();
        driver.arc_box(0, 0, 20, 20, 0., 90.).unwrap();
        driver.backend_mut().fail_strokes(true);
        assert!(driver.loop_tri(0, 0, 10, 0, 5, 5).is_err());

        let commands = driver.backend_mut().take_commands();
        let selects = commands
            .iter()
            .filter(|c| matches!(c, Command::SelectPen(_)))
            .count();
        let restores = commands
            .iter()
            .filter(|c| matches!(c, Command::RestorePen(_)))
            .count();
        assert_eq!(selects, 4);
        assert_eq!(selects, restores);
        assert_eq!(driver.backend().pen(), &StrokeStyle::default());
    }

    #[test]
    fn helpers_match_path_sequences() {
        fn path(driver: &mut Driver<RecordingBackend>, mode: ShapeMode, points: &[(i32, i32)]) {
            match mode {
                ShapeMode::Points => driver.begin_points(),
                ShapeMode::Line => driver.begin_line(),
                ShapeMode::Loop => driver.begin_loop(),
                _ => driver.begin_polygon(),
            }
            for &(x, y) in points {
                driver.vertex(x as f32, y as f32);
            }
            match mode {
                ShapeMode::Points => driver.end_points(),
                ShapeMode::Line => driver.end_line(),
                ShapeMode::Loop => driver.end_loop(),
                _ => driver.end_polygon(),
            }
            .unwrap();
        }

        let mut driver = recording();
        driver.translate(3., 4.);
        driver.set_line_style(LineStyle::solid().width(2.));

        let cases: Vec<(ShapeMode, Vec<(i32, i32)>)> = vec![
            (ShapeMode::Points, vec![(7, 8)]),
            (ShapeMode::Line, vec![(1, 2), (30, 2)]),
            (ShapeMode::Line, vec![(1, 2), (30, 2), (30, 40), (5, 40)]),
            (ShapeMode::Line, vec![(1, 2), (1, 30), (20, 30)]),
            (ShapeMode::Line, vec![(1, 2), (15, 18), (40, 3)]),
            (ShapeMode::Loop, vec![(5, 5), (14, 5), (14, 14), (5, 14)]),
            (ShapeMode::Loop, vec![(0, 0), (10, 0), (5, 8)]),
            (ShapeMode::Polygon, vec![(0, 0), (10, 0), (12, 9), (1, 7)]),
        ];
        let helpers: [fn(&mut Driver<RecordingBackend>); 8] = [
            |d| d.point(7, 8).unwrap(),
            |d| d.xyline(1, 2, 30).unwrap(),
            |d| d.xyline3(1, 2, 30, 40, 5).unwrap(),
            |d| d.yxline2(1, 2, 30, 20).unwrap(),
            |d| d.line_through(1, 2, 15, 18, 40, 3).unwrap(),
            |d| d.rect(5, 5, 10, 10).unwrap(),
            |d| d.loop_tri(0, 0, 10, 0, 5, 8).unwrap(),
            |d| d.polygon_quad(0, 0, 10, 0, 12, 9, 1, 7).unwrap(),
        ];

        for ((mode, points), helper) in cases.iter().zip(helpers) {
            draws(&mut driver);
            helper(&mut driver);
            let fast = draws(&mut driver);
            path(&mut driver, *mode, points);
            let general = draws(&mut driver);
            assert_eq!(fast.len(), 1, "{:?}", mode);
            assert_eq!(fast, general, "{:?}", mode);
        }
    }

    #[test]
    fn rectf_matches_polygon_pixels() {
        let mut fast = raster(40, 40);
        fast.rectf(3, 4, 17, 9).unwrap();
        let mut general = raster(40, 40);
        general.polygon_quad(3, 4, 20, 4, 20, 13, 3, 13).unwrap();
        assert_eq!(black_pixels(&fast), 17 * 9);
        assert_eq!(fast.backend().pixels(), general.backend().pixels());

        let mut rotated = recording();
        rotated.rotate(30.);
        rotated.rectf(3, 4, 17, 9).unwrap();
        assert!(matches!(
            draws(&mut rotated).as_slice(),
            [Command::FillPolygon { .. }]
        ));
    }

    #[test]
    fn rectf_rgb_keeps_current_color() {
        let mut driver = raster(16, 16);
        driver.rectf_rgb(0, 0, 4, 4, 255, 0, 0).unwrap();
        assert_eq!(driver.backend().pixel(1, 1), Rgb::new(255, 0, 0));
        assert_eq!(driver.color(), BLACK);
        driver.rectf(8, 8, 2, 2).unwrap();
        assert_eq!(driver.backend().pixel(8, 8), Rgb::BLACK);
    }

    #[test]
    fn empty_clip_suppresses_drawing() {
        let mut driver = recording();
        driver.push_clip(10, 10, 0, 5);
        assert!(!driver.not_clipped(0, 0, 100, 100));
        driver.rectf(0, 0, 50, 50).unwrap();
        driver.line(0, 0, 50, 50).unwrap();
        driver.begin_polygon();
        driver.vertex(0., 0.);
        driver.vertex(10., 0.);
        driver.vertex(10., 10.);
        driver.end_polygon().unwrap();
        assert!(draws(&mut driver).is_empty());

        driver.pop_clip();
        driver.rectf(0, 0, 50, 50).unwrap();
        assert_eq!(draws(&mut driver).len(), 1);
    }

    #[test]
    fn clipped_raster_fill() {
        let mut driver = raster(32, 32);
        driver.push_clip(5, 5, 10, 10);
        driver.rectf(0, 0, 32, 32).unwrap();
        assert_eq!(black_pixels(&driver), 100);
        assert_eq!(driver.backend().pixel(5, 5), Rgb::BLACK);
        assert_eq!(driver.backend().pixel(15, 15), Rgb::WHITE);
    }

    #[test]
    fn circle_stays_within_tolerance() {
        let mut driver = recording();
        driver.begin_loop();
        driver.circle(50., 50., 20.);
        driver.end_loop().unwrap();
        let commands = draws(&mut driver);
        let points = match commands.as_slice() {
            [Command::StrokePolyline {
                points,
                closed: true,
            }] => points.clone(),
            other => panic!("unexpected commands {:?}", other),
        };
        assert!(points.len() > 16);
        for p in points {
            // recording backends snap to pixels
            let distance = p.distance(vec2(50., 50.));
            assert!((distance - 20.).abs() <= 1.5, "{}", distance);
        }
    }

    #[test]
    fn curve_flattens_between_end_points() {
        let mut driver = recording();
        driver.begin_line();
        driver.curve(0., 50., 0., 0., 100., 0., 100., 50.);
        driver.end_line().unwrap();
        let commands = draws(&mut driver);
        let points = match commands.as_slice() {
            [Command::StrokePolyline { points, .. }] => points.clone(),
            other => panic!("unexpected commands {:?}", other),
        };
        assert_eq!(points.first(), Some(&vec2(0., 50.)));
        assert_eq!(points.last(), Some(&vec2(100., 50.)));
        assert!(points.len() > 4);
    }

    #[test]
    fn pie_includes_center_unless_full() {
        let mut driver = recording();
        driver.pie(0, 0, 40, 40, 0., 90.).unwrap();
        match draws(&mut driver).as_slice() {
            [Command::FillPolygon { path, .. }] => {
                assert_eq!(path.vertices()[0], vec2(20., 20.))
            }
            other => panic!("unexpected commands {:?}", other),
        }

        driver.pie(0, 0, 40, 40, 0., 360.).unwrap();
        match draws(&mut driver).as_slice() {
            [Command::FillPolygon { path, .. }] => {
                assert!(!path.vertices().contains(&vec2(20., 20.)))
            }
            other => panic!("unexpected commands {:?}", other),
        }
    }

    #[test]
    fn focus_rect_dots_alternate() {
        let mut driver = raster(20, 20);
        driver.focus_rect(2, 2, 6, 4).unwrap();
        let backend = driver.backend();
        assert_eq!(backend.pixel(2, 2), Rgb::BLACK);
        assert_eq!(backend.pixel(3, 2), Rgb::WHITE);
        assert_eq!(backend.pixel(4, 2), Rgb::BLACK);
        assert_eq!(backend.pixel(2, 3), Rgb::WHITE);
        assert_eq!(backend.pixel(2, 4), Rgb::BLACK);
        // outline of 6x4 has 16 pixels, half of them set
        assert_eq!(black_pixels(&driver), 8);
    }

    #[test]
    fn text_draws_on_the_baseline() {
        let mut driver = raster(64, 32);
        // boxes are 6 wide and 11 tall with a 7 pixel advance
        driver.draw_text("ab", 10., 20.).unwrap();
        assert_eq!(black_pixels(&driver), 2 * 6 * 11);
        assert_eq!(driver.backend().pixel(10, 9), Rgb::BLACK);
        assert_eq!(driver.backend().pixel(10, 20), Rgb::WHITE);
        assert_eq!(driver.backend().pixel(16, 15), Rgb::WHITE);
        assert_eq!(driver.backend().pixel(17, 15), Rgb::BLACK);

        assert_eq!(driver.text_width("ab"), 14.);
        assert_eq!(driver.text_height(), 15.);
        assert_eq!(driver.text_descent(), 4.);
    }

    #[test]
    fn rtl_text_ends_at_x() {
        let mut driver = recording();
        driver.rtl_draw_text("ab", 30., 20.).unwrap();
        match draws(&mut driver).as_slice() {
            [Command::DrawGlyphs { origin, offsets, .. }] => {
                assert_eq!(*origin, vec2(16., 20.));
                assert_eq!(offsets.len(), 2);
            }
            other => panic!("unexpected commands {:?}", other),
        }
    }

    #[test]
    fn rotated_text_passes_the_angle() {
        let mut driver = recording();
        driver.draw_text_rotated(90., "a", 10., 10.).unwrap();
        match draws(&mut driver).as_slice() {
            [Command::DrawGlyphs { angle, .. }] => {
                assert!((angle + std::f32::consts::FRAC_PI_2).abs() < 1e-6)
            }
            other => panic!("unexpected commands {:?}", other),
        }
    }

    #[test]
    fn images_draw_sub_regions() {
        let mut driver = raster(16, 16);
        #[rustfmt::skip]
        let data = [
            10, 10, 10, 200, 0, 0, 0, 200, 0,
            0, 0, 200, 50, 50, 50, 60, 60, 60,
        ];
        let image = ImageView::new(&data, 3, 2, ImageFormat::Rgb).unwrap();
        driver.draw_image(&image, 5, 5, 2, 2, 1, 0).unwrap();
        assert_eq!(driver.backend().pixel(5, 5), Rgb::new(200, 0, 0));
        assert_eq!(driver.backend().pixel(6, 5), Rgb::new(0, 200, 0));
        assert_eq!(driver.backend().pixel(6, 6), Rgb::new(60, 60, 60));
        assert_eq!(driver.backend().pixel(7, 5), Rgb::WHITE);

        driver.set_color(Color::rgb(255, 0, 0));
        let bits = [0b0000_0101];
        let bitmap = BitmapView::new(&bits, 8, 1).unwrap();
        driver.draw_bitmap(&bitmap, 0, 0, 8, 1, 0, 0).unwrap();
        assert_eq!(driver.backend().pixel(0, 0), Rgb::new(255, 0, 0));
        assert_eq!(driver.backend().pixel(1, 0), Rgb::WHITE);
        assert_eq!(driver.backend().pixel(2, 0), Rgb::new(255, 0, 0));

        let mut source = |y: u32, row: &mut [u8]| row.fill(if y == 0 { 0 } else { 255 });
        driver
            .draw_image_lines(&mut source, ImageFormat::Gray, 0, 10, 4, 2)
            .unwrap();
        assert_eq!(driver.backend().pixel(3, 10), Rgb::BLACK);
        assert_eq!(driver.backend().pixel(3, 11), Rgb::WHITE);
    }

    #[test]
    fn negative_source_offsets_shift_the_destination() {
        let mut driver = raster(16, 16);
        let data = [10, 10, 10, 200, 0, 0, 0, 200, 0, 0, 0, 200, 50, 50, 50, 60, 60, 60];
        let image = ImageView::new(&data, 3, 2, ImageFormat::Rgb).unwrap();
        driver.draw_image(&image, 5, 5, 3, 2, -1, 0).unwrap();
        assert_eq!(driver.backend().pixel(5, 5), Rgb::WHITE);
        assert_eq!(driver.backend().pixel(6, 5), Rgb::new(10, 10, 10));
        assert_eq!(driver.backend().pixel(7, 5), Rgb::new(200, 0, 0));
        assert_eq!(driver.backend().pixel(8, 5), Rgb::WHITE);

        let mut driver = recording();
        driver.draw_image(&image, 5, 5, 4, 2, 0, -1).unwrap();
        match draws(&mut driver).as_slice() {
            [Command::BlitImage {
                width: 3,
                height: 1,
                dest,
            }] => assert_eq!(dest.pos, vec2(5., 6.)),
            other => panic!("unexpected commands {:?}", other),
        }
        driver.draw_image(&image, 5, 5, 2, 2, -5, 0).unwrap();
        assert!(draws(&mut driver).is_empty());
    }

    #[test]
    fn far_off_screen_lines_are_cut_to_the_surface() {
        let mut driver = raster(32, 32);
        driver.line(-2_000_000_000, 5, 2_000_000_000, 5).unwrap();
        assert_eq!(black_pixels(&driver), 32);
        assert!((0..32).all(|x| driver.backend().pixel(x, 5) == Rgb::BLACK));

        let mut driver = raster(32, 32);
        driver.set_line_style(LineStyle::solid().width(3.));
        driver.line(-2_000_000_000, 5, 2_000_000_000, 5).unwrap();
        assert_eq!(black_pixels(&driver), 3 * 32);

        let mut driver = raster(32, 32);
        driver.set_line_style(LineStyle::solid().dashes(&[4, 4]));
        driver.line(0, 5, 1_000_000_000, 5).unwrap();
        let backend = driver.backend();
        assert_eq!(backend.pixel(0, 5), Rgb::BLACK);
        assert_eq!(backend.pixel(2, 5), Rgb::BLACK);
        assert_eq!(backend.pixel(6, 5), Rgb::WHITE);
        assert_eq!(backend.pixel(10, 5), Rgb::BLACK);
        assert!((16..=24).contains(&black_pixels(&driver)));

        let mut driver = recording();
        driver.line(-2_100_000_000, 5, -2_000_000_000, 5).unwrap();
        driver.rect(-2_000_000_000, -2_000_000_000, 10, 10).unwrap();
        assert!(draws(&mut driver).is_empty());
        driver.line(-2_000_000_000, 5, 2_000_000_000, 5).unwrap();
        assert_eq!(draws(&mut driver).len(), 1);
    }

    #[test]
    fn invalid_configs_are_rejected_or_repaired() {
        let config = DriverConfig {
            curve_tolerance: 0.,
            ..Default::default()
        };
        assert!(matches!(
            create_driver(&config, Box::new(BoxShaper)),
            Err(BackendError::Config(_))
        ));

        let mut driver = Driver::new(RecordingBackend::new(100, 100), &config, Box::new(BoxShaper));
        driver.begin_line();
        driver.curve(0., 0., 0., 10., 10., 10., 10., 0.);
        driver.end_line().unwrap();
        match draws(&mut driver).as_slice() {
            [Command::StrokePolyline { points, .. }] => assert!(points.len() > 2),
            other => panic!("unexpected commands {:?}", other),
        }
    }

    #[test]
    fn focus_rect_follows_both_axes() {
        let mut driver = raster(20, 20);
        driver.scale(1., 2.);
        driver.focus_rect(2, 2, 6, 4).unwrap();
        let backend = driver.backend();
        let mut rows = Vec::new();
        let mut columns = Vec::new();
        for y in 0..20 {
            for x in 0..20 {
                if backend.pixel(x, y) == Rgb::BLACK {
                    rows.push(y);
                    columns.push(x);
                }
            }
        }
        rows.dedup();
        columns.sort_unstable();
        columns.dedup();
        assert_eq!(rows, (4..12).collect::<Vec<_>>());
        assert_eq!(columns, (2..8).collect::<Vec<_>>());
        // outline of 6x8 has 24 pixels, half of them set
        assert_eq!(black_pixels(&driver), 12);
    }

    #[test]
    fn palette_changes_follow_the_current_color() {
        let mut driver = recording();
        driver.set_color(Color::Indexed(9));
        driver.set_palette_entry(9, Rgb::new(1, 2, 3));
        assert_eq!(driver.rgb(), Rgb::new(1, 2, 3));
        assert_eq!(
            driver.backend().commands().last(),
            Some(&Command::SetColor(Rgb::new(1, 2, 3)))
        );
    }

    #[test]
    fn line_widths_scale_with_the_surface() {
        let config = DriverConfig {
            surface: SurfaceKind::Display { scale: 2. },
            ..Default::default()
        };
        let mut driver = Driver::new(
            RecordingBackend::new(100, 100),
            &config,
            Box::new(BoxShaper),
        );
        driver.set_line_style(LineStyle::solid().width(3.));
        driver.line(0, 0, 10, 0).unwrap();
        let pen = driver
            .backend()
            .commands()
            .iter()
            .find_map(|c| match c {
                Command::SelectPen(pen) => Some(pen.clone()),
                _ => None,
            });
        assert_eq!(pen.map(|p| p.width), Some(6.));
    }

    #[test]
    fn factory_builds_either_backend() {
        for (kind, name) in [(BackendKind::Vector, "vector"), (BackendKind::Raster, "raster")] {
            let config = DriverConfig {
                backend: kind,
                width: 16,
                height: 8,
                ..Default::default()
            };
            let mut driver = create_driver(&config, Box::new(BoxShaper)).unwrap();
            assert_eq!(driver.backend_name(), name);
            assert_eq!(driver.size(), (16, 8));
            driver.set_color(BLACK);
            driver.rectf(0, 0, 4, 4).unwrap();
            let pixels = driver.to_argb();
            assert_eq!(pixels.len(), 16 * 8);
            assert_eq!(pixels[0], 0xFF00_0000);
            assert_eq!(pixels[5], 0xFFFF_FFFF);
        }
    }
}
