// src/engine.rs
//
// The core of image-handle. Each loaded image is owned by an ImageHandle:
// 1. genesis() sets up the process-wide environment and limits
// 2. Handles load, transform in place and export explicitly
// 3. destroy() (or Drop) releases the image; terminus() tears down
//
// This file is a facade over the decomposed modules in engine/

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod api;
pub mod batch;
pub mod color;
pub mod common;
pub mod decoder;
pub mod encoder;
pub mod environment;
pub mod geometry;
pub mod io;
pub mod layers;
pub mod metadata;
pub mod pipeline;

// Re-export commonly used types and functions
pub use api::{ImageHandle, ImageInfo};
pub use batch::{load_buffers, load_files};
pub use color::parse_color;
pub use common::EngineResult;
pub use decoder::{check_dimensions, detect_format};
pub use encoder::{ChromaSampling, EncodeOptions, QualitySettings, DEFAULT_QUALITY};
pub use environment::{
    genesis, genesis_with, is_instantiated, live_handles, terminus, Environment, Limits,
    MAX_DIMENSION, MAX_PIXELS,
};
pub use geometry::{Geometry, GeometryFlags, GeometrySpec};
pub use io::Source;
pub use metadata::Metadata;
pub use pipeline::{Page, ResizeError};
