// src/error.rs
//
// Unified error handling for image-handle
// Uses thiserror for simple, type-safe error handling
//
// Every error reports a (severity, reason, description) triple:
// - Warning: degraded result, still treated as a failed call
// - Error: the engine rejected the operation
// - Fatal: nothing usable was produced (bad input, destroyed handle, I/O)
//
// Validation failures synthesized by the binding itself are Fatal with an
// empty reason code.

use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Severity of a failed operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// image-handle error types
///
/// The `Display` output is the human description; use [`HandleError::summary`]
/// for the full severity/reason/description line.
#[derive(Debug, Error)]
pub enum HandleError {
    // File I/O Errors
    #[error("unable to open image '{path}': no such file or directory")]
    FileNotFound { path: Cow<'static, str> },

    #[error("unable to read '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to write '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write to {path} for unknown reason")]
    WriteFailed { path: Cow<'static, str> },

    // Input validation
    #[error("image buffer is empty")]
    EmptyBuffer,

    #[error("unrecognized image format '{format}'")]
    UnsupportedFormat { format: Cow<'static, str> },

    // Decode Errors
    #[error("no decode delegate for this image format '{format}'")]
    MissingDelegate { format: Cow<'static, str> },

    #[error("corrupt image, not a {format}: {message}")]
    DecodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Size Limit Errors
    #[error("image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Operation Errors
    #[error("invalid geometry '{geometry}'")]
    InvalidGeometry { geometry: Cow<'static, str> },

    #[error("geometry does not contain image '{geometry}'")]
    GeometryDoesNotContainImage { geometry: Cow<'static, str> },

    #[error("unrecognized color '{color}'")]
    UnrecognizedColor { color: Cow<'static, str> },

    #[error("resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    // Encode Errors
    #[error("failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Property Errors
    #[error("could not set property '{name}': {message}")]
    InvalidProperty {
        name: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("property '{name}' is read-only")]
    ReadOnlyProperty { name: Cow<'static, str> },

    // State Errors
    #[error("image handle has been destroyed")]
    HandleDestroyed,

    #[error("image environment is not instantiated; call genesis() first")]
    NotInitialized,

    #[error("cannot tear down image environment: {count} handle(s) still live")]
    ResourcesInUse { count: usize },

    // Internal Errors
    #[error("internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor Helpers
impl HandleError {
    pub fn file_not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn write_failed(path: impl Into<Cow<'static, str>>) -> Self {
        Self::WriteFailed { path: path.into() }
    }

    pub fn empty_buffer() -> Self {
        Self::EmptyBuffer
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn missing_delegate(format: impl Into<Cow<'static, str>>) -> Self {
        Self::MissingDelegate {
            format: format.into(),
        }
    }

    pub fn decode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::DecodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn invalid_geometry(geometry: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidGeometry {
            geometry: geometry.into(),
        }
    }

    pub fn geometry_does_not_contain_image(geometry: impl Into<Cow<'static, str>>) -> Self {
        Self::GeometryDoesNotContainImage {
            geometry: geometry.into(),
        }
    }

    pub fn unrecognized_color(color: impl Into<Cow<'static, str>>) -> Self {
        Self::UnrecognizedColor {
            color: color.into(),
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn invalid_property(
        name: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidProperty {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn read_only_property(name: impl Into<Cow<'static, str>>) -> Self {
        Self::ReadOnlyProperty { name: name.into() }
    }

    pub fn handle_destroyed() -> Self {
        Self::HandleDestroyed
    }

    pub fn not_initialized() -> Self {
        Self::NotInitialized
    }

    pub fn resources_in_use(count: usize) -> Self {
        Self::ResourcesInUse { count }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Severity of this failure.
    pub fn severity(&self) -> Severity {
        match self {
            // Crop outside the image still yields a usable (empty) answer in
            // the engine, so it is the one warning-level condition.
            Self::GeometryDoesNotContainImage { .. } => Severity::Warning,

            Self::FileReadFailed { .. }
            | Self::FileWriteFailed { .. }
            | Self::MissingDelegate { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::InvalidGeometry { .. }
            | Self::UnrecognizedColor { .. }
            | Self::ResizeFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::InvalidProperty { .. }
            | Self::ReadOnlyProperty { .. }
            | Self::ResourcesInUse { .. } => Severity::Error,

            Self::FileNotFound { .. }
            | Self::WriteFailed { .. }
            | Self::EmptyBuffer
            | Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::HandleDestroyed
            | Self::NotInitialized
            | Self::InternalPanic { .. } => Severity::Fatal,
        }
    }

    /// Short reason code. Empty for validation failures synthesized locally.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. }
            | Self::FileReadFailed { .. }
            | Self::FileWriteFailed { .. } => "FileOpenError",
            Self::MissingDelegate { .. } => "MissingDelegate",
            Self::DecodeFailed { .. } => "CorruptImage",
            Self::DimensionExceedsLimit { .. } | Self::PixelCountExceedsLimit { .. } => {
                "ResourceLimit"
            }
            Self::InvalidGeometry { .. } => "InvalidGeometry",
            Self::GeometryDoesNotContainImage { .. } => "GeometryDoesNotContainImage",
            Self::UnrecognizedColor { .. } => "UnrecognizedColor",
            Self::ResizeFailed { .. } => "ResizeError",
            Self::EncodeFailed { .. } => "CoderError",
            Self::InvalidProperty { .. } => "InvalidProperty",
            Self::ReadOnlyProperty { .. } => "SetReadOnlyProperty",
            Self::ResourcesInUse { .. } => "ResourcesInUse",
            Self::InternalPanic { .. } => "InternalBug",
            Self::WriteFailed { .. }
            | Self::EmptyBuffer
            | Self::UnsupportedFormat { .. }
            | Self::HandleDestroyed
            | Self::NotInitialized => "",
        }
    }

    /// Human description (same text as `Display`).
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// One-line `ImageError <severity>: <reason>- <description>` rendering.
    pub fn summary(&self) -> String {
        format!(
            "ImageError {}: {}- {}",
            self.severity(),
            self.reason(),
            self
        )
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, HandleError>;
