//! Transformation functions applied inside mapping expressions.
//!
//! The registry is a fixed table of named pure functions — not a scripting
//! language. Expressions combine `${...}` interpolation with zero or more
//! nested function calls, e.g. `toUpperCase(trim(${customer}))`.

pub mod expr;
pub mod registry;

pub use expr::apply_expression;
pub use registry::{TransformOutcome, TransformRegistry};
