// demos/parallel.rs
//
// Make many thumbnails from one buffer concurrently and report peak RSS
// before, during and after.

use clap::Parser;
use image_handle::{engine, ImageHandle};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "parallel")]
struct Args {
    /// input PNG
    input: PathBuf,

    /// number of thumbnails to make
    #[arg(long, default_value_t = 100)]
    times: usize,

    /// codec for the encoded thumbnails
    #[arg(long, default_value = "jpg")]
    output_format: String,
}

/// Peak resident set size in bytes, if the platform reports it.
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "freebsd"))]
fn peak_rss() -> Option<u64> {
    use libc::{getrusage, rusage, RUSAGE_SELF};
    use std::mem;

    unsafe {
        let mut usage: rusage = mem::zeroed();
        if getrusage(RUSAGE_SELF, &mut usage) != 0 {
            return None;
        }
        // On Linux, ru_maxrss is in KB; on macOS/FreeBSD, it's in bytes
        #[cfg(target_os = "linux")]
        let rss = usage.ru_maxrss as u64 * 1024;
        #[cfg(any(target_os = "macos", target_os = "freebsd"))]
        let rss = usage.ru_maxrss as u64;
        Some(rss)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "freebsd")))]
fn peak_rss() -> Option<u64> {
    None
}

fn make_thumbnail(source: &[u8], num: usize, format: &str) -> image_handle::Result<usize> {
    let start = Instant::now();
    let mut image = ImageHandle::load_from_buffer(source, "png")?;
    image.resize("100x100")?;
    image.shadow("#000", 75.0, 5.0, 2, 2)?;
    image.fill_background_color("#333")?;
    let blob = image.to_blob(format)?;
    tracing::info!(
        num,
        bytes = blob.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        rss = peak_rss(),
        "thumbnail done"
    );
    Ok(blob.len())
}

fn main() -> image_handle::Result<()> {
    init_tracing();
    let args = Args::parse();
    engine::genesis();

    tracing::info!(input = %args.input.display(), rss = peak_rss(), "reading");
    let source = std::fs::read(&args.input)
        .map_err(|e| image_handle::HandleError::file_read_failed(args.input.display().to_string(), e))?;

    let results: Vec<_> = (0..args.times)
        .into_par_iter()
        .map(|num| make_thumbnail(&source, num, &args.output_format))
        .collect();

    let failed = results.iter().filter(|r| r.is_err()).count();
    let total: usize = results.iter().filter_map(|r| r.as_ref().ok()).sum();
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        tracing::warn!(error = %err.summary(), "thumbnail failed");
    }
    tracing::info!(
        done = args.times - failed,
        failed,
        total_bytes = total,
        live_handles = engine::live_handles(),
        rss = peak_rss(),
        "finished"
    );
    engine::terminus()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
