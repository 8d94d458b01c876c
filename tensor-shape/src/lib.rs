//! Tensor shape descriptors with optionally unknown dimensions.

mod common;
mod dim;
mod shape;

pub use dim::*;
pub use shape::*;
