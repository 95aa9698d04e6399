//! A software rendering backend using [`tiny-skia`](https://docs.rs/tiny-skia).

use std::mem;

use glam::{vec2, Affine2, Vec2};
use tiny_skia::{
    ClipMask, ColorU8, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, StrokeDash,
    Transform,
};

use crate::{
    color::Rgb,
    error::BackendError,
    image::RgbaBuffer,
    path::Path,
    style::{FillRule, LineCap, LineJoin, StrokeStyle},
    text::ShapedGlyph,
    IRect, Rect, Region, SnapPolicy,
};

use super::Backend;

struct Clip {
    mask: ClipMask,
    enabled: bool,
    /// The clip region is empty.
    suppressed: bool,
}

impl Clip {
    fn new() -> Self {
        Self {
            mask: ClipMask::new(),
            enabled: false,
            suppressed: false,
        }
    }

    fn mask(&self) -> Option<&ClipMask> {
        self.enabled.then_some(&self.mask)
    }
}

/// An anti-aliased backend drawing into a `tiny-skia` pixmap.
pub struct VectorBackend {
    pixmap: Pixmap,
    clip: Clip,
    color: Rgb,
    pen: StrokeStyle,
    anti_alias: bool,
    path_builder: PathBuilder,
}

impl VectorBackend {
    pub fn new(width: u32, height: u32, anti_alias: bool) -> Result<Self, BackendError> {
        let mut pixmap =
            Pixmap::new(width, height).ok_or(BackendError::SurfaceAllocation { width, height })?;
        pixmap.fill(convert_color(Rgb::WHITE));
        log::info!(
            "Created {}x{} vector surface (anti-aliasing {})",
            width,
            height,
            if anti_alias { "on" } else { "off" }
        );
        Ok(Self {
            pixmap,
            clip: Clip::new(),
            color: Rgb::BLACK,
            pen: StrokeStyle::default(),
            anti_alias,
            path_builder: PathBuilder::new(),
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        self.pixmap
            .pixel(x, y)
            .map(|p| {
                let c = p.demultiply();
                Rgb::new(c.red(), c.green(), c.blue())
            })
            .unwrap_or(Rgb::BLACK)
    }

    fn paint(&self) -> Paint<'static> {
        let mut paint = Paint::default();
        let [r, g, b] = self.color.to_array();
        paint.set_color_rgba8(r, g, b, u8::MAX);
        paint.anti_alias = self.anti_alias;
        paint
    }

    fn stroke(&self) -> Result<Stroke, BackendError> {
        let pen = &self.pen;
        let dash = if pen.is_dashed() {
            let mut dashes = pen.dashes.to_vec();
            if dashes.len() % 2 == 1 {
                dashes.extend_from_within(..);
            }
            let dash = StrokeDash::new(dashes, 0.)
                .ok_or_else(|| BackendError::InvalidDash(pen.dashes.to_vec()))?;
            Some(dash)
        } else {
            None
        };
        Ok(Stroke {
            width: pen.width,
            line_cap: convert_line_cap(pen.cap, pen.is_hairline()),
            line_join: convert_line_join(pen.join),
            dash,
            ..Default::default()
        })
    }

    /// Builds a path with the reusable builder and hands it to `draw`.
    /// Degenerate paths are skipped.
    fn with_path(
        &mut self,
        build: impl FnOnce(&mut PathBuilder),
        draw: impl FnOnce(&mut Self, &tiny_skia::Path),
    ) {
        let mut builder = mem::take(&mut self.path_builder);
        build(&mut builder);
        if let Some(path) = builder.finish() {
            draw(self, &path);
            // Reuse the builder's allocated space.
            self.path_builder = path.clear();
        }
    }
}

impl Backend for VectorBackend {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    fn default_snap_policy(&self) -> SnapPolicy {
        SnapPolicy::SubPixel
    }

    fn set_clip(&mut self, region: Option<&Region>) {
        let region = match region {
            Some(region) => region.intersect_rect(&IRect::new(
                0,
                0,
                self.pixmap.width() as i32,
                self.pixmap.height() as i32,
            )),
            None => {
                self.clip.enabled = false;
                self.clip.suppressed = false;
                return;
            }
        };
        if region.is_empty() {
            self.clip.enabled = false;
            self.clip.suppressed = true;
            return;
        }

        let mut builder = PathBuilder::new();
        for rect in region.rects() {
            builder.push_rect(rect.x as f32, rect.y as f32, rect.w as f32, rect.h as f32);
        }
        match builder.finish() {
            Some(path) => {
                self.clip.mask.set_path(
                    self.pixmap.width(),
                    self.pixmap.height(),
                    &path,
                    tiny_skia::FillRule::Winding,
                    false,
                );
                self.clip.enabled = true;
                self.clip.suppressed = false;
            }
            None => {
                self.clip.enabled = false;
                self.clip.suppressed = true;
            }
        }
    }

    fn set_color(&mut self, color: Rgb) {
        self.color = color;
    }

    fn select_pen(&mut self, pen: &StrokeStyle) -> Result<StrokeStyle, BackendError> {
        let previous = mem::replace(&mut self.pen, pen.clone());
        // validate the dash pattern up front
        if let Err(e) = self.stroke() {
            self.pen = previous;
            return Err(e);
        }
        Ok(previous)
    }

    fn restore_pen(&mut self, previous: StrokeStyle) {
        self.pen = previous;
    }

    fn stroke_polyline(&mut self, points: &[Vec2], closed: bool) -> Result<(), BackendError> {
        if self.clip.suppressed || points.is_empty() {
            return Ok(());
        }
        let stroke = self.stroke()?;
        // Center thin and odd-width lines on pixel centers.
        let offset = if self.pen.is_hairline() || self.pen.pixel_width() % 2 == 1 {
            0.5
        } else {
            0.
        };
        let paint = self.paint();

        if let [p] = points {
            return self.draw_points(&[*p]);
        }
        self.with_path(
            |builder| {
                builder.move_to(points[0].x + offset, points[0].y + offset);
                for p in &points[1..] {
                    builder.line_to(p.x + offset, p.y + offset);
                }
                if closed {
                    builder.close();
                }
            },
            |this, path| {
                this.pixmap
                    .stroke_path(path, &paint, &stroke, Transform::identity(), this.clip.mask());
            },
        );
        Ok(())
    }

    fn fill_polygon(&mut self, path: &Path, rule: FillRule) -> Result<(), BackendError> {
        if self.clip.suppressed || path.is_empty() {
            return Ok(());
        }
        let paint = self.paint();
        self.with_path(
            |builder| {
                for contour in path.contours() {
                    builder.move_to(contour[0].x, contour[0].y);
                    for p in &contour[1..] {
                        builder.line_to(p.x, p.y);
                    }
                    builder.close();
                }
            },
            |this, path| {
                this.pixmap.fill_path(
                    path,
                    &paint,
                    convert_fill_rule(rule),
                    Transform::identity(),
                    this.clip.mask(),
                );
            },
        );
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect) -> Result<(), BackendError> {
        if self.clip.suppressed {
            return Ok(());
        }
        if let Some(rect) = convert_rect(rect) {
            let paint = self.paint();
            self.pixmap
                .fill_rect(rect, &paint, Transform::identity(), self.clip.mask());
        }
        Ok(())
    }

    fn draw_points(&mut self, points: &[Vec2]) -> Result<(), BackendError> {
        if self.clip.suppressed {
            return Ok(());
        }
        let paint = self.paint();
        for p in points {
            let pixel = Rect::from_xywh(p.x.floor(), p.y.floor(), 1., 1.);
            if let Some(rect) = convert_rect(pixel) {
                self.pixmap
                    .fill_rect(rect, &paint, Transform::identity(), self.clip.mask());
            }
        }
        Ok(())
    }

    fn blit_image(&mut self, image: &RgbaBuffer, dest: Rect) -> Result<(), BackendError> {
        if self.clip.suppressed || image.is_empty() {
            return Ok(());
        }
        let source = pixmap_from_rgba(image)?;
        let transform = Affine2::from_translation(dest.pos)
            * Affine2::from_scale(dest.size / vec2(image.width() as f32, image.height() as f32));
        let paint = PixmapPaint {
            quality: FilterQuality::Nearest,
            ..Default::default()
        };
        self.pixmap.draw_pixmap(
            0,
            0,
            source.as_ref(),
            &paint,
            convert_transform(transform),
            self.clip.mask(),
        );
        Ok(())
    }

    fn draw_glyphs(
        &mut self,
        origin: Vec2,
        angle: f32,
        glyphs: &[ShapedGlyph],
    ) -> Result<(), BackendError> {
        if self.clip.suppressed {
            return Ok(());
        }
        let [r, g, b] = self.color.to_array();
        let paint = PixmapPaint::default();

        for glyph in glyphs {
            let bitmap = &glyph.bitmap;
            let mut mask = match Pixmap::new(bitmap.width, bitmap.height) {
                Some(mask) => mask,
                None => continue,
            };
            for (pixel, &coverage) in mask.pixels_mut().iter_mut().zip(&bitmap.coverage) {
                *pixel = ColorU8::from_rgba(r, g, b, coverage).premultiply();
            }

            let corner = vec2(bitmap.left as f32, bitmap.top as f32);
            let transform = if angle == 0. {
                Affine2::from_translation((origin + glyph.offset).round() + corner)
            } else {
                Affine2::from_angle_translation(angle, origin)
                    * Affine2::from_translation(glyph.offset + corner)
            };
            self.pixmap.draw_pixmap(
                0,
                0,
                mask.as_ref(),
                &paint,
                convert_transform(transform),
                self.clip.mask(),
            );
        }
        Ok(())
    }

    fn clear(&mut self, color: Rgb) {
        self.pixmap.fill(convert_color(color));
    }

    fn to_argb(&self) -> Vec<u32> {
        self.pixmap
            .pixels()
            .iter()
            .map(|p| {
                let c = p.demultiply();
                (c.alpha() as u32) << 24
                    | (c.red() as u32) << 16
                    | (c.green() as u32) << 8
                    | c.blue() as u32
            })
            .collect()
    }
}

fn pixmap_from_rgba(image: &RgbaBuffer) -> Result<Pixmap, BackendError> {
    let mut pixmap = Pixmap::new(image.width(), image.height()).ok_or(
        BackendError::SurfaceAllocation {
            width: image.width(),
            height: image.height(),
        },
    )?;
    for (dst, &[r, g, b, a]) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

fn convert_color(color: Rgb) -> tiny_skia::Color {
    let [r, g, b] = color.to_array();
    tiny_skia::Color::from_rgba8(r, g, b, u8::MAX)
}

fn convert_transform(transform: Affine2) -> Transform {
    let cols = transform.to_cols_array();
    Transform::from_row(cols[0], cols[1], cols[2], cols[3], cols[4], cols[5])
}

fn convert_rect(rect: Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(rect.pos.x, rect.pos.y, rect.size.x, rect.size.y)
}

fn convert_line_cap(cap: LineCap, hairline: bool) -> tiny_skia::LineCap {
    match cap {
        LineCap::Default if hairline => tiny_skia::LineCap::Square,
        LineCap::Default | LineCap::Flat => tiny_skia::LineCap::Butt,
        LineCap::Round => tiny_skia::LineCap::Round,
        LineCap::Square => tiny_skia::LineCap::Square,
    }
}

fn convert_line_join(join: LineJoin) -> tiny_skia::LineJoin {
    match join {
        LineJoin::Default | LineJoin::Miter => tiny_skia::LineJoin::Miter,
        LineJoin::Round => tiny_skia::LineJoin::Round,
        LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
    }
}

fn convert_fill_rule(rule: FillRule) -> tiny_skia::FillRule {
    match rule {
        FillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
        FillRule::NonZero => tiny_skia::FillRule::Winding,
    }
}
