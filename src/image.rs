//! Borrowed views of caller-decoded pixel buffers.

use crate::{color::Rgb, error::BackendError};

/// Channel layout of an image buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl ImageFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ImageFormat::Gray => 1,
            ImageFormat::GrayAlpha => 2,
            ImageFormat::Rgb => 3,
            ImageFormat::Rgba => 4,
        }
    }

    fn to_rgba(self, px: &[u8]) -> [u8; 4] {
        match self {
            ImageFormat::Gray => [px[0], px[0], px[0], u8::MAX],
            ImageFormat::GrayAlpha => [px[0], px[0], px[0], px[1]],
            ImageFormat::Rgb => [px[0], px[1], px[2], u8::MAX],
            ImageFormat::Rgba => [px[0], px[1], px[2], px[3]],
        }
    }
}

/// A read-only image over a borrowed buffer.
///
/// Pixel `(x, y)` starts at byte `y * stride + x * delta`.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    format: ImageFormat,
    delta: usize,
    stride: usize,
}

impl<'a> ImageView<'a> {
    /// A tightly packed image.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> Result<Self, BackendError> {
        let delta = format.bytes_per_pixel();
        Self::with_layout(data, width, height, format, delta, delta * width as usize)
    }

    /// An image with explicit pixel and line spacing. `delta` may
    /// exceed the pixel size to skip padding channels.
    pub fn with_layout(
        data: &'a [u8],
        width: u32,
        height: u32,
        format: ImageFormat,
        delta: usize,
        stride: usize,
    ) -> Result<Self, BackendError> {
        let expected = if width == 0 || height == 0 {
            0
        } else {
            (height as usize - 1) * stride
                + (width as usize - 1) * delta
                + format.bytes_per_pixel()
        };
        if data.len() < expected {
            return Err(BackendError::ImageTooSmall {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            delta,
            stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = y as usize * self.stride + x as usize * self.delta;
        self.format
            .to_rgba(&self.data[offset..offset + self.format.bytes_per_pixel()])
    }

    /// Copies the `w`×`h` region at (`cx`, `cy`) into `out`,
    /// clamped to the image bounds.
    pub fn copy_region(&self, cx: u32, cy: u32, w: u32, h: u32, out: &mut RgbaBuffer) {
        let w = w.min(self.width.saturating_sub(cx));
        let h = h.min(self.height.saturating_sub(cy));
        out.reset(w, h);
        for y in 0..h {
            for x in 0..w {
                out.pixels.push(self.rgba(cx + x, cy + y));
            }
        }
    }
}

#[cfg(feature = "image")]
impl<'a> From<&'a ::image::RgbaImage> for ImageView<'a> {
    fn from(image: &'a ::image::RgbaImage) -> Self {
        Self {
            data: image.as_raw(),
            width: image.width(),
            height: image.height(),
            format: ImageFormat::Rgba,
            delta: 4,
            stride: 4 * image.width() as usize,
        }
    }
}

/// A 1-bit image: rows of bits, least significant bit first,
/// each row padded to a whole byte.
#[derive(Copy, Clone, Debug)]
pub struct BitmapView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> BitmapView<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Result<Self, BackendError> {
        let expected = Self::stride(width) * height as usize;
        if data.len() < expected {
            return Err(BackendError::ImageTooSmall {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    fn stride(width: u32) -> usize {
        (width as usize + 7) / 8
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        let byte = self.data[y as usize * Self::stride(self.width) + x as usize / 8];
        byte & (1 << (x % 8)) != 0
    }

    /// Expands the region at (`cx`, `cy`) into `out`: set bits become
    /// `color`, clear bits become transparent.
    pub fn copy_region(&self, cx: u32, cy: u32, w: u32, h: u32, color: Rgb, out: &mut RgbaBuffer) {
        let w = w.min(self.width.saturating_sub(cx));
        let h = h.min(self.height.saturating_sub(cy));
        let [r, g, b] = color.to_array();
        out.reset(w, h);
        for y in 0..h {
            for x in 0..w {
                let alpha = if self.is_set(cx + x, cy + y) { u8::MAX } else { 0 };
                out.pixels.push([r, g, b, alpha]);
            }
        }
    }
}

/// Tightly packed, straight-alpha RGBA pixels handed to backends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RgbaBuffer {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl RgbaBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let mut buffer = Self::default();
        buffer.reset(width, height);
        buffer.pixels.resize((width * height) as usize, [0; 4]);
        buffer
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Fills the buffer from a row source. `source(y, row)` must write
    /// `width` pixels of `format` into `row`.
    pub fn fill_from_rows(
        &mut self,
        width: u32,
        height: u32,
        format: ImageFormat,
        row: &mut Vec<u8>,
        source: &mut dyn FnMut(u32, &mut [u8]),
    ) {
        let bpp = format.bytes_per_pixel();
        self.reset(width, height);
        row.clear();
        row.resize(width as usize * bpp, 0);
        for y in 0..height {
            source(y, row.as_mut_slice());
            self.pixels
                .extend(row.chunks_exact(bpp).map(|px| format.to_rgba(px)));
        }
    }

    /// Empties the buffer, keeping its allocation.
    fn reset(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
    }
}
