//! Network building blocks for staged convolutional backbones and contrastive heads.

mod common;
pub mod c2f;
pub mod conv_bn_2d;
pub mod pool_head;
pub mod projection_head;
pub mod sppf;
pub mod stage;
pub mod up_sample_2d;

pub use c2f::*;
pub use conv_bn_2d::*;
pub use pool_head::*;
pub use projection_head::*;
pub use sppf::*;
pub use stage::*;
pub use up_sample_2d::*;
