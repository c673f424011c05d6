// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::ShrinkError;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Result type used throughout the engine.
pub type EngineResult<T> = std::result::Result<T, ShrinkError>;

/// Run a codec call and turn a panic into `ShrinkError::InternalPanic`.
///
/// mozjpeg and libwebp bindings report some failures by panicking; a panic
/// must never unwind through the caller's search loop.
pub fn run_with_panic_policy<T, F>(context: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            tracing::error!(context, %detail, "codec panicked");
            Err(ShrinkError::internal_panic(format!("{context}: {detail}")))
        }
    }
}
