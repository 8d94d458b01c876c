//! Contrastive objectives.

mod info_nce;

pub use info_nce::*;
