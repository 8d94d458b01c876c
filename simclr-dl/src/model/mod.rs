//! Backbone adaptation and the contrastive model.

mod adapter;
mod backbone;
mod contrastive;

pub use adapter::*;
pub use backbone::*;
pub use contrastive::*;
