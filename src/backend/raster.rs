//! A backend drawing on an integer pixel grid without anti-aliasing.
//!
//! Pens follow the geometric-pen model of legacy raster APIs: one pixel
//! wide lines are plotted with Bresenham's algorithm, end pixel included,
//! and wider pens are built from filled segment quads with flat caps
//! and round joins unless the style asks otherwise.

use glam::{vec2, Vec2};

use crate::{
    color::Rgb,
    error::BackendError,
    image::RgbaBuffer,
    path::Path,
    style::{FillRule, LineCap, LineJoin, StrokeStyle},
    text::ShapedGlyph,
    IRect, Rect, Region, SnapPolicy,
};

use super::{
    scan::{self, Scanner},
    Backend,
};

/// Widest pen the backend can create, in pixels.
pub const MAX_PEN_WIDTH: u32 = 256;

/// Miter joins longer than this many half-widths are beveled.
const MITER_LIMIT: f32 = 4.;

struct Surface {
    width: i32,
    height: i32,
    pixels: Vec<u32>,
}

impl Surface {
    fn rows(&self) -> (i32, i32) {
        (0, self.height)
    }

    fn bounds(&self) -> IRect {
        IRect::new(0, 0, self.width, self.height)
    }

    fn span(&mut self, clip: Option<&Region>, y: i32, x0: i32, x1: i32, color: u32) {
        if y < 0 || y >= self.height {
            return;
        }
        let x0 = x0.max(0);
        let x1 = x1.min(self.width);
        if x1 <= x0 {
            return;
        }
        let row = (y * self.width) as usize;
        match clip {
            None => self.pixels[row + x0 as usize..row + x1 as usize].fill(color),
            Some(region) => {
                for rect in region.rects() {
                    if y < rect.y || y >= rect.bottom() {
                        continue;
                    }
                    let left = x0.max(rect.x);
                    let right = x1.min(rect.right());
                    if right > left {
                        self.pixels[row + left as usize..row + right as usize].fill(color);
                    }
                }
            }
        }
    }

    fn visible(&self, clip: Option<&Region>, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && x < self.width
            && y < self.height
            && clip.map_or(true, |region| region.contains_point(x, y))
    }

    fn plot(&mut self, clip: Option<&Region>, x: i32, y: i32, color: u32) {
        if self.visible(clip, x, y) {
            self.pixels[(y * self.width + x) as usize] = color;
        }
    }

    fn blend(&mut self, clip: Option<&Region>, x: i32, y: i32, rgb: [u8; 3], alpha: u8) {
        if alpha == 0 || !self.visible(clip, x, y) {
            return;
        }
        let index = (y * self.width + x) as usize;
        let dst = Rgb::from_xrgb(self.pixels[index]).to_array();
        let a = alpha as u32;
        let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8;
        self.pixels[index] =
            Rgb::new(mix(rgb[0], dst[0]), mix(rgb[1], dst[1]), mix(rgb[2], dst[2])).to_xrgb();
    }
}

/// A software raster backend with a `0x00RRGGBB` framebuffer.
pub struct RasterBackend {
    surface: Surface,
    clip: Option<Region>,
    color: Rgb,
    pen: StrokeStyle,
    scanner: Scanner,
    polyline: Vec<Vec2>,
    dash: Vec<Vec2>,
}

impl RasterBackend {
    pub fn new(width: u32, height: u32) -> Result<Self, BackendError> {
        let fits = |v: u32| v > 0 && v <= i32::MAX as u32;
        let pixels = match (width as usize).checked_mul(height as usize) {
            Some(len) if fits(width) && fits(height) => vec![Rgb::WHITE.to_xrgb(); len],
            _ => return Err(BackendError::SurfaceAllocation { width, height }),
        };
        log::info!("Created {}x{} raster surface", width, height);
        Ok(Self {
            surface: Surface {
                width: width as i32,
                height: height as i32,
                pixels,
            },
            clip: None,
            color: Rgb::BLACK,
            pen: StrokeStyle::default(),
            scanner: Scanner::default(),
            polyline: Vec::new(),
            dash: Vec::new(),
        })
    }

    pub fn pixels(&self) -> &[u32] {
        &self.surface.pixels
    }

    pub fn pixels_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.surface.pixels)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        Rgb::from_xrgb(self.surface.pixels[(y * self.surface.width as u32 + x) as usize])
    }

    /// Number of pixels equal to `color`.
    pub fn count(&self, color: Rgb) -> usize {
        let color = color.to_xrgb();
        self.surface.pixels.iter().filter(|&&p| p == color).count()
    }
}

/// Strokes an open polyline, or a closed one when its last point
/// repeats the first.
fn stroke(
    surface: &mut Surface,
    scanner: &mut Scanner,
    clip: Option<&Region>,
    color: u32,
    pen: &StrokeStyle,
    points: &[Vec2],
) {
    if pen.pixel_width() <= 1 {
        let pixel = |p: Vec2| (p.x.floor() as i32, p.y.floor() as i32);
        if let [p] = points {
            let (x, y) = pixel(*p);
            surface.plot(clip, x, y, color);
        }
        let bounds = surface.bounds();
        for segment in points.windows(2) {
            scan::line(pixel(segment[0]), pixel(segment[1]), bounds, |x, y| {
                surface.plot(clip, x, y, color)
            });
        }
        return;
    }

    let half = pen.pixel_width() as f32 / 2.;
    // pixel centers of integer device coordinates
    let center = |p: Vec2| p + vec2(0.5, 0.5);
    let closed = points.len() > 2 && points.first() == points.last();
    let rows = surface.rows();
    let fill = |scanner: &mut Scanner, surface: &mut Surface, polygon: &[Vec2]| {
        scanner.fill([polygon], FillRule::NonZero, rows, |y, x0, x1| {
            surface.span(clip, y, x0, x1, color)
        });
    };

    let cap = match pen.cap {
        LineCap::Default => LineCap::Flat,
        cap => cap,
    };
    let join = match pen.join {
        LineJoin::Default => LineJoin::Round,
        join => join,
    };

    let last = points.len().saturating_sub(2);
    for (i, segment) in points.windows(2).enumerate() {
        let extend = |end: bool| {
            if cap == LineCap::Square && !closed && end {
                half
            } else {
                0.
            }
        };
        let (a, b) = (center(segment[0]), center(segment[1]));
        if let Some(quad) = scan::segment_quad(a, b, half, extend(i == 0), extend(i == last)) {
            fill(scanner, surface, &quad);
        }
    }

    if cap == LineCap::Round && !closed {
        for p in [points.first(), points.last()].into_iter().flatten() {
            scan::disk(center(*p), half, rows, |y, x0, x1| {
                surface.span(clip, y, x0, x1, color)
            });
        }
    }

    let joins = if closed {
        // the repeated point closes the outline
        1..points.len()
    } else {
        1..points.len().saturating_sub(1)
    };
    for i in joins {
        let next = if i == points.len() - 1 { 1 } else { i + 1 };
        let v = center(points[i]);
        let prev = center(points[i - 1]);
        let d1 = (v - prev).normalize_or_zero();
        let d2 = (center(points[next]) - v).normalize_or_zero();
        if d1 == Vec2::ZERO || d2 == Vec2::ZERO {
            continue;
        }
        match join {
            LineJoin::Round | LineJoin::Default => {
                scan::disk(v, half, rows, |y, x0, x1| surface.span(clip, y, x0, x1, color))
            }
            LineJoin::Bevel | LineJoin::Miter => {
                let n1 = vec2(-d1.y, d1.x) * half;
                let n2 = vec2(-d2.y, d2.x) * half;
                fill(scanner, surface, &[v, v + n1, v + n2]);
                fill(scanner, surface, &[v, v - n1, v - n2]);
                if join == LineJoin::Miter {
                    let bisector = (n1 + n2).normalize_or_zero();
                    let cos = bisector.dot(n1) / half;
                    if cos > 1. / MITER_LIMIT {
                        let tip = bisector * (half / cos);
                        fill(scanner, surface, &[v, v + n1, v + tip, v + n2]);
                        fill(scanner, surface, &[v, v - n1, v - tip, v - n2]);
                    }
                }
            }
        }
    }
}

impl Backend for RasterBackend {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn size(&self) -> (u32, u32) {
        (self.surface.width as u32, self.surface.height as u32)
    }

    fn default_snap_policy(&self) -> SnapPolicy {
        SnapPolicy::PixelSnap
    }

    fn set_clip(&mut self, region: Option<&Region>) {
        log::trace!("raster clip: {:?}", region.map(Region::bounding_box));
        self.clip = region.cloned();
    }

    fn set_color(&mut self, color: Rgb) {
        self.color = color;
    }

    fn select_pen(&mut self, pen: &StrokeStyle) -> Result<StrokeStyle, BackendError> {
        if pen.pixel_width() > MAX_PEN_WIDTH {
            return Err(BackendError::PenAllocation {
                width: pen.pixel_width(),
                max: MAX_PEN_WIDTH,
            });
        }
        if pen.dashes.iter().any(|d| !d.is_finite() || *d < 0.) {
            return Err(BackendError::InvalidDash(pen.dashes.to_vec()));
        }
        Ok(std::mem::replace(&mut self.pen, pen.clone()))
    }

    fn restore_pen(&mut self, previous: StrokeStyle) {
        self.pen = previous;
    }

    fn stroke_polyline(&mut self, points: &[Vec2], closed: bool) -> Result<(), BackendError> {
        if points.is_empty() {
            return Ok(());
        }
        self.polyline.clear();
        self.polyline.extend_from_slice(points);
        if closed && points.len() > 2 {
            self.polyline.push(points[0]);
        }

        let Self {
            surface,
            clip,
            color,
            pen,
            scanner,
            polyline,
            dash,
        } = self;
        let clip = clip.as_ref();
        let color = color.to_xrgb();
        if pen.is_dashed() {
            // dashes beyond the pen's reach of the surface are never drawn
            let margin = pen.pixel_width() as f32 + 1.;
            let visible = surface.bounds().to_rect().expand(margin);
            scan::dash(polyline, &pen.dashes, visible, dash, |piece| {
                stroke(surface, scanner, clip, color, pen, piece)
            });
        } else {
            stroke(surface, scanner, clip, color, pen, polyline);
        }
        Ok(())
    }

    fn fill_polygon(&mut self, path: &Path, rule: FillRule) -> Result<(), BackendError> {
        let Self {
            surface,
            clip,
            color,
            scanner,
            ..
        } = self;
        let (clip, color, rows) = (clip.as_ref(), color.to_xrgb(), surface.rows());
        scanner.fill(path.contours(), rule, rows, |y, x0, x1| {
            surface.span(clip, y, x0, x1, color)
        });
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect) -> Result<(), BackendError> {
        let (clip, color, rows) = (self.clip.as_ref(), self.color.to_xrgb(), self.surface.rows());
        let surface = &mut self.surface;
        scan::rect(rect.pos, rect.max(), rows, |y, x0, x1| {
            surface.span(clip, y, x0, x1, color)
        });
        Ok(())
    }

    fn draw_points(&mut self, points: &[Vec2]) -> Result<(), BackendError> {
        let color = self.color.to_xrgb();
        for p in points {
            self.surface
                .plot(self.clip.as_ref(), p.x.floor() as i32, p.y.floor() as i32, color);
        }
        Ok(())
    }

    fn blit_image(&mut self, image: &RgbaBuffer, dest: Rect) -> Result<(), BackendError> {
        if image.is_empty() || dest.size.x <= 0. || dest.size.y <= 0. {
            return Ok(());
        }
        let scale = vec2(
            image.width() as f32 / dest.size.x,
            image.height() as f32 / dest.size.y,
        );
        let (clip, rows) = (self.clip.as_ref(), self.surface.rows());
        let surface = &mut self.surface;
        scan::rect(dest.pos, dest.max(), rows, |y, x0, x1| {
            let sy = ((y as f32 + 0.5 - dest.pos.y) * scale.y) as u32;
            for x in x0..x1 {
                let sx = ((x as f32 + 0.5 - dest.pos.x) * scale.x) as u32;
                let [r, g, b, a] = image.get(sx.min(image.width() - 1), sy.min(image.height() - 1));
                surface.blend(clip, x, y, [r, g, b], a);
            }
        });
        Ok(())
    }

    fn draw_glyphs(
        &mut self,
        origin: Vec2,
        angle: f32,
        glyphs: &[ShapedGlyph],
    ) -> Result<(), BackendError> {
        let rgb = self.color.to_array();
        let clip = self.clip.as_ref();
        let (sin, cos) = angle.sin_cos();
        let rotate = |v: Vec2| vec2(v.x * cos - v.y * sin, v.x * sin + v.y * cos);

        for glyph in glyphs {
            let bitmap = &glyph.bitmap;
            let pen = origin + rotate(glyph.offset);
            let corner = vec2(bitmap.left as f32, bitmap.top as f32);

            if angle == 0. {
                let x0 = pen.x.round() as i32 + bitmap.left;
                let y0 = pen.y.round() as i32 + bitmap.top;
                for gy in 0..bitmap.height {
                    for gx in 0..bitmap.width {
                        let alpha = bitmap.coverage_at(gx, gy);
                        self.surface
                            .blend(clip, x0 + gx as i32, y0 + gy as i32, rgb, alpha);
                    }
                }
                continue;
            }

            // sample the mask at the inverse-rotated center of each device pixel
            let size = vec2(bitmap.width as f32, bitmap.height as f32);
            let bounds = Rect::new(corner, size).bbox_mapped(|p| pen + rotate(p));
            let (x0, y0) = (bounds.pos.x.floor() as i32, bounds.pos.y.floor() as i32);
            let (x1, y1) = (bounds.max().x.ceil() as i32, bounds.max().y.ceil() as i32);
            for y in y0..y1 {
                for x in x0..x1 {
                    let d = vec2(x as f32 + 0.5, y as f32 + 0.5) - pen;
                    let local = vec2(d.x * cos + d.y * sin, -d.x * sin + d.y * cos) - corner;
                    if local.x < 0. || local.y < 0. || local.x >= size.x || local.y >= size.y {
                        continue;
                    }
                    let alpha = bitmap.coverage_at(local.x as u32, local.y as u32);
                    self.surface.blend(clip, x, y, rgb, alpha);
                }
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Rgb) {
        self.surface.pixels.fill(color.to_xrgb());
    }

    fn to_argb(&self) -> Vec<u32> {
        self.surface
            .pixels
            .iter()
            .map(|&p| 0xFF00_0000 | p)
            .collect()
    }
}
