//! The augmentation chain that turns one image into one training view.

use super::{ColorJitter, ColorJitterInit, RandomResizedCrop, RandomResizedCropInit};
use crate::{common::*, config::AugmentationConfig};

/// Applies random resized crop, horizontal flip, color jitter and normalization.
///
/// Every call draws fresh random parameters, so applying the augmentor twice
/// to the same image yields two different views.
#[derive(Debug, Clone)]
pub struct ViewAugmentor {
    crop: RandomResizedCrop,
    flip_prob: f64,
    color_jitter: ColorJitter,
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl ViewAugmentor {
    pub fn new(config: &AugmentationConfig) -> Result<Self> {
        let AugmentationConfig {
            crop_size,
            crop_scale,
            crop_ratio,
            flip_prob,
            ref color_jitter,
            mean,
            std,
        } = *config;

        if !(0.0..=1.0).contains(&flip_prob.raw()) {
            return Err(Error::config("flip_prob must be in range [0, 1]"));
        }
        if std.iter().any(|&val| val <= 0.0) {
            return Err(Error::config("std values must be positive"));
        }

        let crop = RandomResizedCropInit {
            size: crop_size.get(),
            scale: crop_scale,
            ratio: crop_ratio,
        }
        .build()?;
        let color_jitter = ColorJitterInit {
            brightness: color_jitter.brightness,
            contrast: color_jitter.contrast,
            saturation: color_jitter.saturation,
            hue: color_jitter.hue,
        }
        .build()?;

        Ok(Self {
            crop,
            flip_prob: flip_prob.raw(),
            color_jitter,
            mean: mean.iter().map(|val| val.raw()).collect(),
            std: std.iter().map(|val| val.raw()).collect(),
        })
    }

    /// The side length of output views.
    pub fn crop_size(&self) -> usize {
        self.crop.size() as usize
    }

    /// Produces a normalized float `[3, crop_size, crop_size]` view of a
    /// `[3, H, W]` uint8 image.
    pub fn forward(&self, image: &Tensor) -> Result<Tensor> {
        let mut rng = StdRng::from_entropy();
        self.forward_with_rng(&mut rng, image)
    }

    pub fn forward_with_rng<R>(&self, rng: &mut R, image: &Tensor) -> Result<Tensor>
    where
        R: Rng,
    {
        tch::no_grad(|| -> Result<_> {
            let is_rgb = matches!(*image.size().as_slice(), [3, _, _]);
            if !is_rgb || image.kind() != Kind::Uint8 {
                return Err(Error::shape(format!(
                    "expect a [3, H, W] uint8 image, but get {:?} {:?}",
                    image.size(),
                    image.kind()
                )));
            }

            let view = self.crop.forward(rng, image)?;
            let view = if rng.gen_bool(self.flip_prob) {
                view.f_horizontal_flip().or_shape()?
            } else {
                view
            };
            let view = view.to_kind(Kind::Float) / 255.0;
            let view = self.color_jitter.forward(rng, &view)?;
            let view = view
                .f_normalize_channels(&self.mean, &self.std)
                .or_shape()?
                .set_requires_grad(false);
            Ok(view)
        })
    }
}
