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

use super::Backend;

/// A native primitive as received by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetClip(Option<Region>),
    SetColor(Rgb),
    SelectPen(StrokeStyle),
    RestorePen(StrokeStyle),
    StrokePolyline {
        points: Vec<Vec2>,
        closed: bool,
    },
    FillPolygon {
        path: Path,
        rule: FillRule,
    },
    FillRect(Rect),
    DrawPoints(Vec<Vec2>),
    BlitImage {
        width: u32,
        height: u32,
        dest: Rect,
    },
    DrawGlyphs {
        origin: Vec2,
        angle: f32,
        offsets: Vec<Vec2>,
    },
    Clear(Rgb),
}

impl Command {
    /// Returns whether the command puts pixels on the surface.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Command::StrokePolyline { .. }
                | Command::FillPolygon { .. }
                | Command::FillRect(_)
                | Command::DrawPoints(_)
                | Command::BlitImage { .. }
                | Command::DrawGlyphs { .. }
        )
    }
}

/// A backend recording the primitive stream instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    width: u32,
    height: u32,
    commands: Vec<Command>,
    pen: StrokeStyle,
    fail_strokes: bool,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Drawing commands only, without state changes.
    pub fn draw_commands(&self) -> impl Iterator<Item = &Command> + '_ {
        self.commands.iter().filter(|c| c.is_draw())
    }

    pub fn pen(&self) -> &StrokeStyle {
        &self.pen
    }

    /// Makes every subsequent stroke fail with a pen allocation error.
    pub fn fail_strokes(&mut self, fail: bool) {
        self.fail_strokes = fail;
    }
}

impl Backend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn default_snap_policy(&self) -> SnapPolicy {
        SnapPolicy::PixelSnap
    }

    fn set_clip(&mut self, region: Option<&Region>) {
        self.commands.push(Command::SetClip(region.cloned()));
    }

    fn set_color(&mut self, color: Rgb) {
        self.commands.push(Command::SetColor(color));
    }

    fn select_pen(&mut self, pen: &StrokeStyle) -> Result<StrokeStyle, BackendError> {
        self.commands.push(Command::SelectPen(pen.clone()));
        Ok(std::mem::replace(&mut self.pen, pen.clone()))
    }

    fn restore_pen(&mut self, previous: StrokeStyle) {
        self.commands.push(Command::RestorePen(previous.clone()));
        self.pen = previous;
    }

    fn stroke_polyline(&mut self, points: &[Vec2], closed: bool) -> Result<(), BackendError> {
        if self.fail_strokes {
            return Err(BackendError::PenAllocation {
                width: self.pen.pixel_width(),
                max: 0,
            });
        }
        self.commands.push(Command::StrokePolyline {
            points: points.to_vec(),
            closed,
        });
        Ok(())
    }

    fn fill_polygon(&mut self, path: &Path, rule: FillRule) -> Result<(), BackendError> {
        self.commands.push(Command::FillPolygon {
            path: path.clone(),
            rule,
        });
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect) -> Result<(), BackendError> {
        self.commands.push(Command::FillRect(rect));
        Ok(())
    }

    fn draw_points(&mut self, points: &[Vec2]) -> Result<(), BackendError> {
        self.commands.push(Command::DrawPoints(points.to_vec()));
        Ok(())
    }

    fn blit_image(&mut self, image: &RgbaBuffer, dest: Rect) -> Result<(), BackendError> {
        self.commands.push(Command::BlitImage {
            width: image.width(),
            height: image.height(),
            dest,
        });
        Ok(())
    }

    fn draw_glyphs(
        &mut self,
        origin: Vec2,
        angle: f32,
        glyphs: &[ShapedGlyph],
    ) -> Result<(), BackendError> {
        self.commands.push(Command::DrawGlyphs {
            origin,
            angle,
            offsets: glyphs.iter().map(|g| g.offset).collect(),
        });
        Ok(())
    }

    fn clear(&mut self, color: Rgb) {
        self.commands.push(Command::Clear(color));
    }

    fn to_argb(&self) -> Vec<u32> {
        vec![0xFF00_0000; (self.width * self.height) as usize]
    }
}
