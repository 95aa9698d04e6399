use smallvec::SmallVec;

/// Capacity of the dash pattern buffer. Longer patterns are truncated.
pub const MAX_DASHES: usize = 16;

/// Determines how polygons with several contours or
/// self-intersections are filled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FillRule {
    EvenOdd,
    NonZero,
}

impl Default for FillRule {
    fn default() -> Self {
        FillRule::EvenOdd
    }
}

/// The predefined dash patterns.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum DashKind {
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum LineCap {
    /// Backend preference.
    #[default]
    Default,
    Flat,
    Round,
    Square,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum LineJoin {
    /// Backend preference.
    #[default]
    Default,
    Miter,
    Round,
    Bevel,
}

pub type DashPattern = SmallVec<[u8; MAX_DASHES]>;

/// How lines are stroked.
///
/// Built by the caller with logical widths; a driver converts the
/// width to device units when the style is set.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LineStyle {
    kind: DashKind,
    cap: LineCap,
    join: LineJoin,
    width: f32,
    dashes: DashPattern,
}

impl LineStyle {
    /// A solid hairline.
    pub fn solid() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: DashKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn cap(mut self, cap: LineCap) -> Self {
        self.cap = cap;
        self
    }

    pub fn join(mut self, join: LineJoin) -> Self {
        self.join = join;
        self
    }

    /// Sets the width. Zero draws the thinnest visible line.
    pub fn width(mut self, width: f32) -> Self {
        self.width = width.max(0.);
        self
    }

    /// Sets an explicit pattern of alternating on/off lengths,
    /// overriding the pattern of the dash kind.
    ///
    /// Zero lengths end the pattern; at most [`MAX_DASHES`]
    /// lengths are kept.
    pub fn dashes(mut self, dashes: &[u8]) -> Self {
        let len = dashes.iter().position(|&d| d == 0).unwrap_or(dashes.len());
        if len > MAX_DASHES {
            log::debug!(
                "dash pattern of {} entries truncated to {}",
                len,
                MAX_DASHES
            );
        }
        self.dashes = dashes[..len.min(MAX_DASHES)].iter().copied().collect();
        self
    }

    pub fn dash_kind(&self) -> DashKind {
        self.kind
    }

    pub fn line_cap(&self) -> LineCap {
        self.cap
    }

    pub fn line_join(&self) -> LineJoin {
        self.join
    }

    pub fn line_width(&self) -> f32 {
        self.width
    }

    pub fn explicit_dashes(&self) -> &[u8] {
        &self.dashes
    }

    pub fn is_hairline(&self) -> bool {
        self.width == 0.
    }

    /// Resolves the style into device units for a mapping whose
    /// average scale is `scale`.
    ///
    /// Hairlines stay one device pixel wide at every scale.
    pub fn to_stroke(&self, scale: f32) -> StrokeStyle {
        let width = if self.is_hairline() {
            0.
        } else {
            self.width * scale
        };
        let unit = width.max(1.);
        let dashes = if !self.dashes.is_empty() {
            self.dashes.iter().map(|&d| d as f32 * scale).collect()
        } else {
            let (dash, dot, gap) = match self.cap {
                // Round and square caps grow every dash by one width.
                LineCap::Round | LineCap::Square => (2. * unit, 0.01, 2. * unit),
                _ => (3. * unit, unit, unit),
            };
            let pattern: &[f32] = match self.kind {
                DashKind::Solid => &[],
                DashKind::Dash => &[dash, gap],
                DashKind::Dot => &[dot, gap],
                DashKind::DashDot => &[dash, gap, dot, gap],
                DashKind::DashDotDot => &[dash, gap, dot, gap, dot, gap],
            };
            pattern.iter().copied().collect()
        };
        StrokeStyle {
            width,
            cap: self.cap,
            join: self.join,
            dashes,
        }
    }
}

/// A line style resolved to device units: the description of a pen.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct StrokeStyle {
    /// Device width; zero is a hairline.
    pub width: f32,
    pub cap: LineCap,
    pub join: LineJoin,
    /// Alternating on/off lengths in device units. Empty is solid.
    pub dashes: SmallVec<[f32; MAX_DASHES]>,
}

impl StrokeStyle {
    pub fn is_hairline(&self) -> bool {
        self.width == 0.
    }

    /// Width in whole device pixels, at least one.
    pub fn pixel_width(&self) -> u32 {
        self.width.round().max(1.) as u32
    }

    pub fn is_dashed(&self) -> bool {
        !self.dashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_patterns_are_truncated() {
        let dashes: Vec<u8> = (1..=40).collect();
        let style = LineStyle::solid().dashes(&dashes);
        assert_eq!(style.explicit_dashes().len(), MAX_DASHES);
        assert_eq!(style.explicit_dashes()[MAX_DASHES - 1], MAX_DASHES as u8);
    }

    #[test]
    fn zero_terminates_pattern() {
        let style = LineStyle::solid().dashes(&[4, 2, 0, 9]);
        assert_eq!(style.explicit_dashes(), &[4, 2]);
    }

    #[test]
    fn width_scales_but_hairline_does_not() {
        let stroke = LineStyle::solid().width(2.).to_stroke(1.5);
        assert_eq!(stroke.width, 3.);
        assert_eq!(stroke.pixel_width(), 3);

        let hairline = LineStyle::solid().to_stroke(4.);
        assert!(hairline.is_hairline());
        assert_eq!(hairline.pixel_width(), 1);
    }

    #[test]
    fn dash_kinds_expand_from_width() {
        let stroke = LineStyle::solid()
            .kind(DashKind::DashDot)
            .width(2.)
            .to_stroke(1.);
        assert_eq!(stroke.dashes.as_slice(), &[6., 2., 2., 2.]);
        assert!(!LineStyle::solid().to_stroke(1.).is_dashed());
    }
}
