// src/engine/environment.rs
//
// Process-wide engine environment.
// genesis() must run before any image is loaded; terminus() tears it down
// once every handle has been destroyed.

use crate::error::HandleError;
use parking_lot::{const_mutex, Mutex};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::common::EngineResult;

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

pub const MAX_DIMENSION_ENV: &str = "IMAGE_HANDLE_MAX_DIMENSION";
pub const MAX_PIXELS_ENV: &str = "IMAGE_HANDLE_MAX_PIXELS";

/// Resource limits applied to every decoded or produced image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_dimension: u32,
    pub max_pixels: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
        }
    }
}

impl Limits {
    /// Defaults, overridden by `IMAGE_HANDLE_MAX_DIMENSION` and
    /// `IMAGE_HANDLE_MAX_PIXELS` when they parse as positive integers.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_dimension = lookup(MAX_DIMENSION_ENV)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_dimension);
        let max_pixels = lookup(MAX_PIXELS_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_pixels);
        Self {
            max_dimension,
            max_pixels,
        }
    }

    pub fn check(&self, width: u32, height: u32) -> EngineResult<()> {
        if width > self.max_dimension || height > self.max_dimension {
            return Err(HandleError::dimension_exceeds_limit(
                width.max(height),
                self.max_dimension,
            ));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(HandleError::pixel_count_exceeds_limit(
                pixels,
                self.max_pixels,
            ));
        }
        Ok(())
    }
}

/// Snapshot of the initialized environment.
#[derive(Debug)]
pub struct Environment {
    client_path: PathBuf,
    limits: Limits,
}

impl Environment {
    pub fn client_path(&self) -> &std::path::Path {
        &self.client_path
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }
}

static ENVIRONMENT: Mutex<Option<Arc<Environment>>> = const_mutex(None);
static LIVE_HANDLES: AtomicUsize = AtomicUsize::new(0);

/// Initialize the environment with limits from the process environment.
/// Idempotent: later calls return the existing environment.
pub fn genesis() -> Arc<Environment> {
    genesis_with(Limits::from_env())
}

/// Initialize the environment with explicit limits. A no-op when already
/// initialized; the existing limits stay in force.
pub fn genesis_with(limits: Limits) -> Arc<Environment> {
    let mut guard = ENVIRONMENT.lock();
    if let Some(env) = guard.as_ref() {
        return Arc::clone(env);
    }
    let client_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    tracing::debug!(
        client_path = %client_path.display(),
        max_dimension = limits.max_dimension,
        max_pixels = limits.max_pixels,
        "image environment genesis"
    );
    let env = Arc::new(Environment {
        client_path,
        limits,
    });
    *guard = Some(Arc::clone(&env));
    env
}

/// Tear the environment down. Refuses while handles are live.
pub fn terminus() -> EngineResult<()> {
    let mut guard = ENVIRONMENT.lock();
    if guard.is_none() {
        return Ok(());
    }
    let count = LIVE_HANDLES.load(Ordering::Acquire);
    if count > 0 {
        return Err(HandleError::resources_in_use(count));
    }
    *guard = None;
    tracing::debug!("image environment terminus");
    Ok(())
}

pub fn is_instantiated() -> bool {
    ENVIRONMENT.lock().is_some()
}

pub fn live_handles() -> usize {
    LIVE_HANDLES.load(Ordering::Acquire)
}

/// The current environment, or `NotInitialized`.
pub fn current() -> EngineResult<Arc<Environment>> {
    ENVIRONMENT
        .lock()
        .as_ref()
        .map(Arc::clone)
        .ok_or_else(HandleError::not_initialized)
}

/// Count a new handle. Takes the environment lock so a handle is never
/// registered after `terminus()` has torn the environment down.
pub(crate) fn handle_acquired() -> EngineResult<()> {
    let guard = ENVIRONMENT.lock();
    if guard.is_none() {
        return Err(HandleError::not_initialized());
    }
    LIVE_HANDLES.fetch_add(1, Ordering::AcqRel);
    Ok(())
}

pub(crate) fn handle_released() {
    LIVE_HANDLES.fetch_sub(1, Ordering::AcqRel);
}
