//! Tensor extensions for image tensors in `[C, H, W]` layout.

mod common;
pub mod image;
pub mod tensor;

pub use self::image::*;
pub use tensor::*;
