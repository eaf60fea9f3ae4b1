// src/engine/common.rs
//
// Common utilities shared across engine modules.
// Provides the engine result alias and the panic boundary around codec calls.

use crate::error::HandleError;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Result type used inside the engine.
pub type EngineResult<T> = std::result::Result<T, HandleError>;

/// Run `f`, converting a panic inside a codec crate into `InternalPanic`.
///
/// Operations only touch the owned image after `f` returns, so a caught panic
/// never leaves a handle half-modified.
pub fn run_with_panic_policy<T, F>(label: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            tracing::error!(operation = label, %detail, "panic caught in engine");
            Err(HandleError::internal_panic(format!("{label}: {detail}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;

    #[test]
    fn test_passes_through_ok_and_err() {
        assert_eq!(run_with_panic_policy("ok", || Ok(7)).unwrap(), 7);
        let err = run_with_panic_policy::<(), _>("err", || Err(HandleError::empty_buffer()))
            .unwrap_err();
        assert!(matches!(err, HandleError::EmptyBuffer));
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let err = run_with_panic_policy::<(), _>("boom", || panic!("codec exploded")).unwrap_err();
        assert_eq!(err.severity(), Severity::Fatal);
        assert_eq!(err.reason(), "InternalBug");
        assert!(err.to_string().contains("codec exploded"));
    }
}
