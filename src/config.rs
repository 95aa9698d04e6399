use std::{fs, path::Path};

use anyhow::Context as _;
use glam::vec2;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, transform::TransformState, SnapPolicy};

/// Which native backend a driver renders with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Anti-aliased vector compositing.
    Vector,
    /// Integer pixel raster with explicit pens.
    Raster,
}

/// The kind of output surface, which determines the base
/// logical-to-device mapping.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum SurfaceKind {
    /// A live display. `scale` is the HiDPI factor.
    Display { scale: f32 },
    /// A print or export page. Margins are in device units.
    Print {
        scale_x: f32,
        scale_y: f32,
        /// Page rotation in radians.
        angle: f32,
        left_margin: f32,
        top_margin: f32,
    },
}

impl SurfaceKind {
    pub fn is_display(&self) -> bool {
        matches!(self, SurfaceKind::Display { .. })
    }

    pub fn base_transform(&self) -> TransformState {
        match *self {
            SurfaceKind::Display { scale } => TransformState {
                scale_x: scale,
                scale_y: scale,
                ..Default::default()
            },
            SurfaceKind::Print {
                scale_x,
                scale_y,
                angle,
                left_margin,
                top_margin,
            } => TransformState {
                scale_x,
                scale_y,
                angle,
                // Margins are device units; the origin is logical.
                origin: vec2(left_margin / scale_x, top_margin / scale_y),
            },
        }
    }
}

impl Default for SurfaceKind {
    fn default() -> Self {
        SurfaceKind::Display { scale: 1. }
    }
}

/// Driver construction options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub backend: BackendKind,
    /// Surface width in device pixels.
    pub width: u32,
    /// Surface height in device pixels.
    pub height: u32,
    pub surface: SurfaceKind,
    /// Overrides the backend's preferred snap policy.
    pub snap_policy: Option<SnapPolicy>,
    /// Maximum number of clip frames, including the base frame.
    pub max_clip_depth: usize,
    /// Maximum distance, in device pixels, between a curve and
    /// the line segments approximating it.
    pub curve_tolerance: f32,
    /// Used by the vector backend only.
    pub anti_alias: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Vector,
            width: 800,
            height: 600,
            surface: SurfaceKind::default(),
            snap_policy: None,
            max_clip_depth: 10,
            curve_tolerance: 0.25,
            anti_alias: true,
        }
    }
}

impl DriverConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read driver config {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid driver config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "surface size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.max_clip_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_clip_depth must leave room for the base frame".into(),
            ));
        }
        if self.curve_tolerance.is_nan() || self.curve_tolerance <= 0. {
            return Err(ConfigError::Invalid(format!(
                "curve_tolerance must be positive, got {}",
                self.curve_tolerance
            )));
        }
        let base = self.surface.base_transform();
        if base.scale_x == 0. || base.scale_y == 0. {
            return Err(ConfigError::Invalid("surface scale must be non-zero".into()));
        }
        Ok(())
    }
}
