//! Text shaping: the collaborator interface the driver measures and
//! draws text through, plus a `fontdue` implementation.

use std::{path::Path, sync::Arc};

use anyhow::Context as _;
use glam::{vec2, Vec2};
use lru::LruCache;

use crate::error::MalformedFont;

const CACHE_CAPACITY: usize = 4096;

/// A font registered with a shaper.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct FaceId(usize);

/// Face and pixel size used for text operations.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FontSelection {
    pub face: FaceId,
    pub size: f32,
}

impl Default for FontSelection {
    fn default() -> Self {
        Self {
            face: FaceId::default(),
            size: 14.,
        }
    }
}

/// Vertical metrics of a font at some size. Both values are positive.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct LineMetrics {
    pub ascent: f32,
    pub descent: f32,
}

impl LineMetrics {
    pub fn height(&self) -> f32 {
        self.ascent + self.descent
    }
}

/// A rasterized glyph coverage mask.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    /// Offset from the pen position to the left edge of the mask.
    pub left: i32,
    /// Offset from the baseline to the top edge of the mask (negative is up).
    pub top: i32,
    /// One coverage byte per pixel, row-major.
    pub coverage: Vec<u8>,
}

impl GlyphBitmap {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn coverage_at(&self, x: u32, y: u32) -> u8 {
        self.coverage[(y * self.width + x) as usize]
    }
}

/// A glyph positioned relative to the start of a run on its baseline.
#[derive(Debug, Clone)]
pub struct ShapedGlyph {
    pub offset: Vec2,
    pub bitmap: Arc<GlyphBitmap>,
}

/// Measures and shapes text. Sizes and positions are in pixels.
pub trait TextShaper {
    fn line_metrics(&self, font: FontSelection) -> LineMetrics;

    /// The advance width of `text`.
    fn measure(&self, font: FontSelection, text: &str) -> f32;

    /// Shapes `text` into positioned glyph masks, appended to `out`.
    fn shape(&mut self, font: FontSelection, text: &str, out: &mut Vec<ShapedGlyph>);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct GlyphKey {
    c: char,
    face: FaceId,
    size: u64, // fixed point in 1/1000s of a pixel
}

/// A [`TextShaper`] using `fontdue` for rasterization.
///
/// Glyph masks are cached by face, character and size.
pub struct FontdueShaper {
    fonts: Vec<fontdue::Font>,
    glyphs: LruCache<GlyphKey, Arc<GlyphBitmap>, ahash::RandomState>,
}

impl Default for FontdueShaper {
    fn default() -> Self {
        Self::new()
    }
}

impl FontdueShaper {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            glyphs: LruCache::with_hasher(CACHE_CAPACITY, ahash::RandomState::new()),
        }
    }

    /// Registers a TrueType or OpenType font.
    pub fn add_font(&mut self, data: &[u8]) -> Result<FaceId, MalformedFont> {
        let font = fontdue::Font::from_bytes(data, fontdue::FontSettings::default())
            .map_err(MalformedFont)?;
        let id = FaceId(self.fonts.len());
        log::info!("Loaded font {:?} ({} bytes)", id, data.len());
        self.fonts.push(font);
        Ok(id)
    }

    pub fn load_font_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<FaceId> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font file '{}'", path.display()))?;
        let id = self
            .add_font(&data)
            .with_context(|| format!("failed to load font file '{}'", path.display()))?;
        Ok(id)
    }

    pub fn num_fonts(&self) -> usize {
        self.fonts.len()
    }

    fn font(&self, face: FaceId) -> Option<&fontdue::Font> {
        self.fonts.get(face.0).or_else(|| self.fonts.first())
    }

    fn glyph(&mut self, face: FaceId, c: char, size: f32) -> Option<Arc<GlyphBitmap>> {
        let key = GlyphKey {
            c,
            face,
            size: (size * 1000.) as u64,
        };
        if let Some(glyph) = self.glyphs.get(&key) {
            return Some(Arc::clone(glyph));
        }

        let font = self.font(face)?;
        let (metrics, coverage) = font.rasterize(c, size);
        let glyph = Arc::new(GlyphBitmap {
            width: metrics.width as u32,
            height: metrics.height as u32,
            left: metrics.xmin,
            top: -(metrics.ymin + metrics.height as i32),
            coverage,
        });
        self.glyphs.put(key, Arc::clone(&glyph));
        Some(glyph)
    }
}

impl TextShaper for FontdueShaper {
    fn line_metrics(&self, font: FontSelection) -> LineMetrics {
        self.font(font.face)
            .and_then(|f| f.horizontal_line_metrics(font.size))
            .map(|m| LineMetrics {
                ascent: m.ascent,
                descent: -m.descent,
            })
            .unwrap_or(LineMetrics {
                ascent: font.size * 0.8,
                descent: font.size * 0.2,
            })
    }

    fn measure(&self, font: FontSelection, text: &str) -> f32 {
        match self.font(font.face) {
            Some(f) => text
                .chars()
                .map(|c| f.metrics(c, font.size).advance_width)
                .sum(),
            None => 0.,
        }
    }

    fn shape(&mut self, font: FontSelection, text: &str, out: &mut Vec<ShapedGlyph>) {
        let mut pen = 0.;
        for c in text.chars() {
            let advance = match self.font(font.face) {
                Some(f) => f.metrics(c, font.size).advance_width,
                None => return,
            };
            if let Some(bitmap) = self.glyph(font.face, c, font.size) {
                if !bitmap.is_empty() {
                    out.push(ShapedGlyph {
                        offset: vec2(pen, 0.),
                        bitmap,
                    });
                }
            }
            pen += advance;
        }
    }
}

/// A shaper drawing every character as a solid box. Used in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct BoxShaper;

#[cfg(test)]
impl BoxShaper {
    pub fn advance(size: f32) -> f32 {
        (size * 0.5).round()
    }
}

#[cfg(test)]
impl TextShaper for BoxShaper {
    fn line_metrics(&self, font: FontSelection) -> LineMetrics {
        LineMetrics {
            ascent: (font.size * 0.75).round(),
            descent: (font.size * 0.25).round(),
        }
    }

    fn measure(&self, font: FontSelection, text: &str) -> f32 {
        text.chars().count() as f32 * Self::advance(font.size)
    }

    fn shape(&mut self, font: FontSelection, text: &str, out: &mut Vec<ShapedGlyph>) {
        let advance = Self::advance(font.size);
        let ascent = self.line_metrics(font).ascent as u32;
        let width = (advance as u32).saturating_sub(1).max(1);
        let bitmap = Arc::new(GlyphBitmap {
            width,
            height: ascent,
            left: 0,
            top: -(ascent as i32),
            coverage: vec![u8::MAX; (width * ascent) as usize],
        });
        for (i, c) in text.chars().enumerate() {
            if c != ' ' {
                out.push(ShapedGlyph {
                    offset: vec2(i as f32 * advance, 0.),
                    bitmap: Arc::clone(&bitmap),
                });
            }
        }
    }
}
