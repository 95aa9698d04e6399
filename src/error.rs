//! Error types and the host warning channel.

/// A failure reported by a backend's native resources.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to allocate a {width}x{height} drawing surface")]
    SurfaceAllocation { width: u32, height: u32 },
    #[error("cannot create a pen of width {width} (maximum is {max})")]
    PenAllocation { width: u32, max: u32 },
    #[error("invalid dash pattern {0:?}")]
    InvalidDash(Vec<f32>),
    #[error("image buffer holds {actual} bytes but {expected} are required")]
    ImageTooSmall { expected: usize, actual: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The clip stack is full; the push was dropped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("clip stack overflow (maximum depth is {max_depth})")]
pub struct ClipStackOverflow {
    pub max_depth: usize,
}

/// Only [`ClipFrame::Unclipped`](crate::clip::ClipFrame::Unclipped)
/// may replace the base clip frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("the base clip frame cannot be replaced with a region")]
pub struct BaseClipFrame;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse driver configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid driver configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
#[error("failed to parse font data: {0}")]
pub struct MalformedFont(pub &'static str);

/// Receives non-fatal warnings, such as clip stack overflows.
///
/// Warnings never interrupt drawing.
pub trait WarningSink {
    fn warning(&self, message: &str);
}

/// Forwards warnings to the `log` facade.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogWarnings;

impl WarningSink for LogWarnings {
    fn warning(&self, message: &str) {
        log::warn!("{}", message);
    }
}

impl<F> WarningSink for F
where
    F: Fn(&str),
{
    fn warning(&self, message: &str) {
        self(message)
    }
}
