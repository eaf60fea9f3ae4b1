// demos/thumbnail.rs
//
// Repeatedly load a file, crop it, drop a shadow under it, fill the
// background and write the result. Handy for watching memory stay flat.

use clap::Parser;
use image_handle::{engine, ImageHandle};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "thumbnail")]
struct Args {
    /// input image
    input: PathBuf,

    /// output image; the extension picks the codec
    output: PathBuf,

    /// how many times to run the pipeline
    #[arg(long, default_value_t = 100)]
    iterations: usize,

    #[arg(long, default_value = "400x200")]
    crop: String,

    #[arg(long, default_value = "#F00")]
    background: String,
}

fn main() -> image_handle::Result<()> {
    init_tracing();
    let args = Args::parse();
    engine::genesis();
    tracing::info!(input = %args.input.display(), output = %args.output.display(), "thumbnail demo");

    for i in 0..args.iterations {
        let start = Instant::now();
        let mut image = ImageHandle::load_from_file(&args.input)?;
        image.crop(&args.crop)?;
        image.shadow("#000", 75.0, 5.0, 2, 2)?;
        image.fill_background_color(&args.background)?;
        image.to_file(&args.output)?;
        tracing::info!(
            iteration = i,
            width = image.width(),
            height = image.height(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "wrote thumbnail"
        );
        image.destroy();
    }

    engine::terminus()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
