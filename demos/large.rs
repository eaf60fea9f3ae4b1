// demos/large.rs
//
// Load a large JPEG from memory, upscale it and write a small progressive
// 4:4:4 JPEG, timing each stage.

use clap::Parser;
use image_handle::{engine, ImageHandle};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "large")]
struct Args {
    /// input image
    input: PathBuf,

    /// output image; the extension picks the codec
    output: PathBuf,

    /// format hint for the in-memory load
    #[arg(long, default_value = "jpg")]
    format: String,

    #[arg(long, default_value = "2000x2000!")]
    geometry: String,

    #[arg(long, default_value_t = 50)]
    quality: i32,
}

fn main() -> image_handle::Result<()> {
    init_tracing();
    let args = Args::parse();
    engine::genesis();

    let start = Instant::now();
    let source = std::fs::read(&args.input)
        .map_err(|e| image_handle::HandleError::file_read_failed(args.input.display().to_string(), e))?;
    let mut image = ImageHandle::load_from_buffer(&source, &args.format)?;
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "loaded");

    let start = Instant::now();
    image.set_quality(args.quality)?;
    image.strip()?;
    image.progressive()?;
    image.set_property("jpeg:sampling-factor", "4:4:4")?;
    tracing::info!(width = image.width(), height = image.height(), "transforming");
    image.resize(&args.geometry)?;
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "transformed");

    let start = Instant::now();
    image.to_file(&args.output)?;
    tracing::info!(
        output = %args.output.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "written"
    );

    image.destroy();
    engine::terminus()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
