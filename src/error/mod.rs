//! Error types for the variable engine.
//!
//! - [`StoreError`] — Fatal errors raised by direct store calls.
//! - [`Diagnostic`] — Non-fatal, structured notes aggregated by the mapping
//!   pipeline and returned alongside its primary result.

pub mod diagnostic;
pub mod store_error;

pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use store_error::StoreError;

/// Convenience alias for store-level results.
pub type StoreResult<T> = Result<T, StoreError>;
