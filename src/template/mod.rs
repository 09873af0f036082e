//! `${...}` template interpolation against the variable store.

pub mod interpolate;

pub use interpolate::{interpolate, resolve_path};
