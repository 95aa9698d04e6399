//! A device-independent 2D graphics driver. Toolkit code draws
//! lines, polygons, curves, text and images through one
//! [`GraphicsDriver`] interface; a [`Backend`] turns the resulting
//! device-space primitives into pixels, either with anti-aliased
//! vector compositing or on an integer raster grid.

#![allow(clippy::too_many_arguments)]

pub mod awake;
pub mod backend;
pub mod clip;
pub mod color;
pub mod config;
pub mod driver;
pub mod error;
pub mod image;
pub mod path;
mod rect;
mod region;
pub mod style;
pub mod text;
pub mod transform;

pub use awake::{Awake, AwakeHandle};
pub use backend::{Backend, Command, PenScope, RasterBackend, RecordingBackend, VectorBackend};
pub use clip::{ClipBox, ClipStack};
pub use color::{Color, Palette, Rgb};
pub use config::{BackendKind, DriverConfig, SurfaceKind};
pub use driver::{create_driver, Driver, GraphicsDriver};
pub use error::{
    BackendError, BaseClipFrame, ClipStackOverflow, ConfigError, LogWarnings, MalformedFont,
    WarningSink,
};
pub use crate::image::{BitmapView, ImageFormat, ImageView, RgbaBuffer};
pub use path::{Path, PathBuilder, Shape, ShapeMode};
pub use rect::{IRect, Rect};
pub use region::Region;
pub use style::{DashKind, FillRule, LineCap, LineJoin, LineStyle, StrokeStyle};
pub use text::{FaceId, FontSelection, FontdueShaper, LineMetrics, ShapedGlyph, TextShaper};
pub use transform::{SnapPolicy, TransformStack, TransformState};
