//! Self-supervised contrastive training on top of a pretrained YOLO backbone.

mod common;
pub mod assembler;
pub mod config;
pub mod dataset;
pub mod error;
pub mod loss;
pub mod model;
pub mod processor;

pub use assembler::*;
pub use config::Config;
pub use error::*;
