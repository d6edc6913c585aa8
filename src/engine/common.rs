// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::{ImagoidError, Result};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Run a codec call, turning a panic inside it into `InternalPanic`.
///
/// Decoders are fed untrusted bytes; a panic in one must surface as an error
/// on that image instead of unwinding through the caller.
pub fn run_with_panic_policy<T>(stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(stage, %message, "codec panicked");
            Err(ImagoidError::internal_panic(format!("{stage}: {message}")))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_results() {
        assert_eq!(run_with_panic_policy("ok", || Ok(7)).unwrap(), 7);
        let err = run_with_panic_policy::<()>("err", || Err(ImagoidError::corrupted_image()))
            .unwrap_err();
        assert!(matches!(err, ImagoidError::CorruptedImage));
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let err = run_with_panic_policy::<()>("decode:test", || panic!("boom")).unwrap_err();
        match err {
            ImagoidError::InternalPanic { message } => {
                assert!(message.contains("decode:test"));
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
