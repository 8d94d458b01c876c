//! Random crop of random area and aspect ratio, resized to a fixed square.

use crate::common::*;

const MAX_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RandomResizedCropInit {
    pub size: usize,
    pub scale: (R64, R64),
    pub ratio: (R64, R64),
}

impl RandomResizedCropInit {
    pub fn build(self) -> Result<RandomResizedCrop> {
        let Self {
            size,
            scale: (min_scale, max_scale),
            ratio: (min_ratio, max_ratio),
        } = self;

        if size == 0 {
            return Err(Error::config("crop size must be positive"));
        }
        if !(min_scale > 0.0 && min_scale <= max_scale && max_scale <= 1.0) {
            return Err(Error::config(format!(
                "crop scale range ({}, {}) must satisfy 0 < min <= max <= 1",
                min_scale, max_scale
            )));
        }
        if !(min_ratio > 0.0 && min_ratio <= max_ratio) {
            return Err(Error::config(format!(
                "crop ratio range ({}, {}) must satisfy 0 < min <= max",
                min_ratio, max_ratio
            )));
        }

        Ok(RandomResizedCrop {
            size: size as i64,
            scale: (min_scale.raw(), max_scale.raw()),
            log_ratio: (min_ratio.raw().ln(), max_ratio.raw().ln()),
        })
    }
}

/// A crop window in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropWindow {
    pub top: i64,
    pub left: i64,
    pub height: i64,
    pub width: i64,
}

#[derive(Debug, Clone)]
pub struct RandomResizedCrop {
    size: i64,
    scale: (f64, f64),
    log_ratio: (f64, f64),
}

impl RandomResizedCrop {
    pub fn size(&self) -> i64 {
        self.size
    }

    /// Samples a crop window for an image of the given size.
    ///
    /// Falls back to a center crop clamped to the ratio range if no sampled
    /// window fits in the image.
    pub fn sample_window<R>(&self, rng: &mut R, height: i64, width: i64) -> CropWindow
    where
        R: Rng,
    {
        let (min_scale, max_scale) = self.scale;
        let (min_log_ratio, max_log_ratio) = self.log_ratio;
        let area = (height * width) as f64;

        for _ in 0..MAX_ATTEMPTS {
            let target_area = area * rng.gen_range(min_scale..=max_scale);
            let aspect_ratio = rng.gen_range(min_log_ratio..=max_log_ratio).exp();

            let crop_w = (target_area * aspect_ratio).sqrt().round() as i64;
            let crop_h = (target_area / aspect_ratio).sqrt().round() as i64;

            if 0 < crop_w && crop_w <= width && 0 < crop_h && crop_h <= height {
                let top = rng.gen_range(0..=(height - crop_h));
                let left = rng.gen_range(0..=(width - crop_w));
                return CropWindow {
                    top,
                    left,
                    height: crop_h,
                    width: crop_w,
                };
            }
        }

        let in_ratio = width as f64 / height as f64;
        let min_ratio = min_log_ratio.exp();
        let max_ratio = max_log_ratio.exp();
        let (crop_h, crop_w) = if in_ratio < min_ratio {
            (((width as f64 / min_ratio).round() as i64).max(1), width)
        } else if in_ratio > max_ratio {
            (height, ((height as f64 * max_ratio).round() as i64).max(1))
        } else {
            (height, width)
        };

        CropWindow {
            top: (height - crop_h) / 2,
            left: (width - crop_w) / 2,
            height: crop_h,
            width: crop_w,
        }
    }

    /// Crops and resizes a `[3, H, W]` image to `[3, size, size]`.
    pub fn forward<R>(&self, rng: &mut R, image: &Tensor) -> Result<Tensor>
    where
        R: Rng,
    {
        let (_channels, height, width) = image.size3()?;
        if height == 0 || width == 0 {
            return Err(Error::shape("cannot crop an empty image"));
        }

        let CropWindow {
            top,
            left,
            height: crop_h,
            width: crop_w,
        } = self.sample_window(rng, height, width);

        let resized = image
            .f_crop(top, left, crop_h, crop_w)
            .and_then(|cropped| cropped.contiguous().resize2d_exact(self.size, self.size))
            .or_shape()?;
        Ok(resized)
    }
}
