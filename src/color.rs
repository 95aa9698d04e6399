use std::fmt::Display;

/// An opaque sRGB color.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rgb([u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(u8::MAX, u8::MAX, u8::MAX);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Gets the red component.
    pub fn red(&self) -> u8 {
        self.0[0]
    }

    /// Gets the green component.
    pub fn green(&self) -> u8 {
        self.0[1]
    }

    /// Gets the blue component.
    pub fn blue(&self) -> u8 {
        self.0[2]
    }

    pub fn to_array(&self) -> [u8; 3] {
        self.0
    }

    /// Packs the color as `0x00RRGGBB`.
    pub fn to_xrgb(&self) -> u32 {
        (self.red() as u32) << 16 | (self.green() as u32) << 8 | self.blue() as u32
    }

    pub fn from_xrgb(pixel: u32) -> Self {
        Self::new((pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8)
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red(), self.green(), self.blue())
    }
}

/// A drawing color: a palette index or an explicit RGB triple.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Indexed(u8),
    Rgb(Rgb),
}

impl Color {
    pub const FOREGROUND: Color = Color::Indexed(0);
    pub const BACKGROUND2: Color = Color::Indexed(7);
    pub const INACTIVE: Color = Color::Indexed(8);
    pub const SELECTION: Color = Color::Indexed(15);
    pub const BACKGROUND: Color = Color::Indexed(49);
    pub const BLACK: Color = Color::Indexed(56);
    pub const GREEN: Color = Color::Indexed(63);
    pub const RED: Color = Color::Indexed(88);
    pub const YELLOW: Color = Color::Indexed(95);
    pub const BLUE: Color = Color::Indexed(216);
    pub const CYAN: Color = Color::Indexed(223);
    pub const MAGENTA: Color = Color::Indexed(248);
    pub const WHITE: Color = Color::Indexed(255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::Rgb(Rgb::new(r, g, b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::FOREGROUND
    }
}

impl From<Rgb> for Color {
    fn from(rgb: Rgb) -> Self {
        Color::Rgb(rgb)
    }
}

/// First index of the 24-step gray ramp.
pub const GRAY_RAMP: u8 = 32;
const NUM_GRAY: u32 = 24;
/// First index of the color cube.
pub const COLOR_CUBE: u8 = 56;
const NUM_RED: u32 = 5;
const NUM_GREEN: u32 = 8;
const NUM_BLUE: u32 = 5;

const BASE_COLORS: [Rgb; 16] = [
    Rgb::new(0x00, 0x00, 0x00),
    Rgb::new(0xff, 0x00, 0x00),
    Rgb::new(0x00, 0xff, 0x00),
    Rgb::new(0xff, 0xff, 0x00),
    Rgb::new(0x00, 0x00, 0xff),
    Rgb::new(0xff, 0x00, 0xff),
    Rgb::new(0x00, 0xff, 0xff),
    Rgb::new(0xff, 0xff, 0xff),
    Rgb::new(0x55, 0x55, 0x55),
    Rgb::new(0xc6, 0x71, 0x71),
    Rgb::new(0x71, 0xc6, 0x71),
    Rgb::new(0x8e, 0x8e, 0x38),
    Rgb::new(0x71, 0x71, 0xc6),
    Rgb::new(0x8e, 0x38, 0x8e),
    Rgb::new(0x38, 0x8e, 0x8e),
    Rgb::new(0x00, 0x00, 0x80),
];

/// Index of the color-cube entry closest to the given components.
pub fn color_cube(r: u8, g: u8, b: u8) -> u8 {
    let level = |c: u8, n: u32| ((c as u32 * (n - 1) + 127) / 255) as u8;
    let (r, g, b) = (level(r, NUM_RED), level(g, NUM_GREEN), level(b, NUM_BLUE));
    COLOR_CUBE + (b * NUM_RED as u8 + r) * NUM_GREEN as u8 + g
}

/// Index of the gray-ramp entry closest to the given intensity.
pub fn gray_ramp(intensity: u8) -> u8 {
    GRAY_RAMP + ((intensity as u32 * (NUM_GRAY - 1) + 127) / 255) as u8
}

/// The 256-entry color map used to resolve [`Color::Indexed`].
///
/// Each driver owns its palette, so changing an entry affects
/// only that driver.
#[derive(Debug, Clone)]
pub struct Palette {
    entries: [Rgb; 256],
}

impl Default for Palette {
    fn default() -> Self {
        let mut entries = [Rgb::BLACK; 256];
        entries[..BASE_COLORS.len()].copy_from_slice(&BASE_COLORS);

        // 16..32 are left for the host's widget colors; seed them with grays.
        for (i, entry) in entries[16..GRAY_RAMP as usize].iter_mut().enumerate() {
            let v = (i * 255 / 15) as u8;
            *entry = Rgb::new(v, v, v);
        }

        for i in 0..NUM_GRAY {
            let v = (i * 255 / (NUM_GRAY - 1)) as u8;
            entries[(GRAY_RAMP as u32 + i) as usize] = Rgb::new(v, v, v);
        }

        for b in 0..NUM_BLUE {
            for r in 0..NUM_RED {
                for g in 0..NUM_GREEN {
                    let index = COLOR_CUBE as u32 + (b * NUM_RED + r) * NUM_GREEN + g;
                    entries[index as usize] = Rgb::new(
                        (r * 255 / (NUM_RED - 1)) as u8,
                        (g * 255 / (NUM_GREEN - 1)) as u8,
                        (b * 255 / (NUM_BLUE - 1)) as u8,
                    );
                }
            }
        }

        Self { entries }
    }
}

impl Palette {
    pub fn get(&self, index: u8) -> Rgb {
        self.entries[index as usize]
    }

    pub fn set(&mut self, index: u8, rgb: Rgb) {
        self.entries[index as usize] = rgb;
    }

    pub fn resolve(&self, color: Color) -> Rgb {
        match color {
            Color::Indexed(index) => self.get(index),
            Color::Rgb(rgb) => rgb,
        }
    }
}
