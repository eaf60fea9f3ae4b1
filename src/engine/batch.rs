// src/engine/batch.rs
//
// Parallel loading. Each input becomes its own handle; failures stay in
// their slot so one bad file never hides the rest.

use crate::engine::api::ImageHandle;
use crate::engine::common::EngineResult;
use rayon::prelude::*;
use std::path::Path;
use tracing::debug;

/// Load every path on the rayon pool. Results keep input order.
pub fn load_files<P>(paths: &[P]) -> Vec<EngineResult<ImageHandle>>
where
    P: AsRef<Path> + Sync,
{
    debug!(count = paths.len(), "batch load files");
    paths
        .par_iter()
        .map(|path| ImageHandle::load_from_file(path))
        .collect()
}

/// Load every buffer with the same format hint. Results keep input order.
pub fn load_buffers<B>(buffers: &[B], format: &str) -> Vec<EngineResult<ImageHandle>>
where
    B: AsRef<[u8]> + Sync,
{
    debug!(count = buffers.len(), format, "batch load buffers");
    buffers
        .par_iter()
        .map(|bytes| ImageHandle::load_from_buffer(bytes.as_ref(), format))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::environment;
    use crate::error::HandleError;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn test_load_buffers_keeps_order() {
        environment::genesis();
        let buffers = vec![png_bytes(3, 2), Vec::new(), png_bytes(7, 5)];
        let results = load_buffers(&buffers, "png");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().width(), 3);
        assert!(matches!(results[1], Err(HandleError::EmptyBuffer)));
        assert_eq!(results[2].as_ref().unwrap().height(), 5);
    }

    #[test]
    fn test_load_files_reports_missing() {
        environment::genesis();
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        std::fs::write(&good, png_bytes(4, 4)).unwrap();
        let missing = dir.path().join("missing.png");

        let results = load_files(&[good, missing]);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(HandleError::FileNotFound { .. })));
    }
}
