//! Image augmentation processors producing training views.

mod color_jitter;
mod random_resized_crop;
mod view_augmentor;

pub use color_jitter::*;
pub use random_resized_crop::*;
pub use view_augmentor::*;
