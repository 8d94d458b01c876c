use crate::common::*;

pub trait TensorExt {
    /// Crops a `[C, H, W]` or `[B, C, H, W]` tensor to the given pixel window.
    fn f_crop(&self, top: i64, left: i64, height: i64, width: i64) -> Result<Tensor>;

    fn crop(&self, top: i64, left: i64, height: i64, width: i64) -> Tensor {
        self.f_crop(top, left, height, width).unwrap()
    }

    /// Resizes a `[C, H, W]` image to exactly the given size.
    fn resize2d_exact(&self, new_height: i64, new_width: i64) -> Result<Tensor>;

    /// Mirrors the image along the width axis.
    fn f_horizontal_flip(&self) -> Result<Tensor>;

    fn horizontal_flip(&self) -> Tensor {
        self.f_horizontal_flip().unwrap()
    }

    fn f_rgb_to_hsv(&self) -> Result<Tensor>;

    fn rgb_to_hsv(&self) -> Tensor {
        self.f_rgb_to_hsv().unwrap()
    }

    fn f_hsv_to_rgb(&self) -> Result<Tensor>;

    fn hsv_to_rgb(&self) -> Tensor {
        self.f_hsv_to_rgb().unwrap()
    }

    /// Luma of a `[3, H, W]` image as a `[1, H, W]` tensor.
    fn f_rgb_to_grayscale(&self) -> Result<Tensor>;

    fn rgb_to_grayscale(&self) -> Tensor {
        self.f_rgb_to_grayscale().unwrap()
    }

    /// Computes `(x - mean) / std` per channel on a `[C, H, W]` tensor.
    fn f_normalize_channels(&self, mean: &[f64], std: &[f64]) -> Result<Tensor>;
}

impl TensorExt for Tensor {
    fn f_crop(&self, top: i64, left: i64, height: i64, width: i64) -> Result<Tensor> {
        let (orig_h, orig_w) = match *self.size().as_slice() {
            [_c, h, w] => (h, w),
            [_b, _c, h, w] => (h, w),
            _ => bail!("input tensor must be either 3 or 4 dimensional"),
        };
        ensure!(top >= 0 && left >= 0, "invalid crop origin ({}, {})", top, left);
        ensure!(height > 0 && width > 0, "crop size must be positive");
        ensure!(
            top + height <= orig_h && left + width <= orig_w,
            "crop window {}x{}+{}+{} exceeds image size {}x{}",
            height,
            width,
            top,
            left,
            orig_h,
            orig_w
        );

        let dim = self.dim() as i64;
        let cropped = self
            .f_narrow(dim - 2, top, height)?
            .f_narrow(dim - 1, left, width)?;
        Ok(cropped)
    }

    fn resize2d_exact(&self, new_height: i64, new_width: i64) -> Result<Tensor> {
        tch::no_grad(|| match (self.kind(), self.size().as_slice()) {
            (Kind::Uint8, &[_n_channels, _height, _width]) => {
                let resized = vision::image::resize(self, new_width, new_height)?;
                Ok(resized)
            }
            (Kind::Float, &[_n_channels, _height, _width]) => {
                let resized = vision::image::resize(
                    &(self * 255.0).clamp(0.0, 255.0).to_kind(Kind::Uint8),
                    new_width,
                    new_height,
                )?
                .to_kind(Kind::Float)
                    / 255.0;
                Ok(resized)
            }
            (_, &[_n_channels, _height, _width]) => bail!("unsupported data kind"),
            _ => bail!("invalid shape: expect three dimensions"),
        })
    }

    fn f_horizontal_flip(&self) -> Result<Tensor> {
        ensure!(self.dim() >= 2, "expect at least two dimensions");
        let last = self.dim() as i64 - 1;
        Ok(self.f_flip(&[last])?)
    }

    fn f_rgb_to_hsv(&self) -> Result<Tensor> {
        let eps = 1e-4;
        let rgb = self;
        let (channels, _height, _width) = rgb.size3()?;
        ensure!(
            channels == 3,
            "channel size must be 3, but get {}",
            channels
        );

        let red = rgb.select(0, 0);
        let green = rgb.select(0, 1);
        let blue = rgb.select(0, 2);

        let (max, argmax) = rgb.max_dim(0, false);
        let (min, _argmin) = rgb.min_dim(0, false);
        let diff = &max - &min;

        let value = max;
        let saturation = (&diff / &value).where_self(&value.gt(eps), &value.zeros_like());

        let case1 = value.zeros_like();
        let case2 = (&green - &blue) / &diff;
        let case3 = (&blue - &red) / &diff + 2.0;
        let case4 = (&red - &green) / &diff + 4.0;

        let hue = {
            let hue = case1.where_self(
                &diff.le(eps),
                &case2.where_self(&argmax.eq(0i64), &case3.where_self(&argmax.eq(1i64), &case4)),
            );
            let hue = hue.where_self(&hue.ge(0.0), &(&hue + 6.0));
            hue / 6.0
        };

        let hsv = Tensor::stack(&[hue, saturation, value], 0);

        debug_assert!(
            !bool::from(hsv.isnan().any()),
            "NaN detected in RGB to HSV conversion"
        );

        Ok(hsv)
    }

    fn f_hsv_to_rgb(&self) -> Result<Tensor> {
        let hsv = self;
        let (channels, _height, _width) = hsv.size3()?;
        ensure!(
            channels == 3,
            "channel size must be 3, but get {}",
            channels
        );

        let hue = hsv.select(0, 0);
        let saturation = hsv.select(0, 1);
        let value = hsv.select(0, 2);

        // f(n) = v - v * s * max(0, min(k, 4 - k, 1)), k = (n + 6h) mod 6
        let func = |n: f64| {
            let k = (&hue * 6.0 + n).fmod(6.0);
            let weight = k.minimum(&(-&k + 4.0)).clamp(0.0, 1.0);
            &value - &value * &saturation * weight
        };

        let red = func(5.0);
        let green = func(3.0);
        let blue = func(1.0);
        let rgb = Tensor::stack(&[red, green, blue], 0);

        Ok(rgb)
    }

    fn f_rgb_to_grayscale(&self) -> Result<Tensor> {
        let (channels, _height, _width) = self.size3()?;
        ensure!(
            channels == 3,
            "channel size must be 3, but get {}",
            channels
        );
        let gray = self.select(0, 0) * 0.299 + self.select(0, 1) * 0.587 + self.select(0, 2) * 0.114;
        Ok(gray.unsqueeze(0))
    }

    fn f_normalize_channels(&self, mean: &[f64], std: &[f64]) -> Result<Tensor> {
        let (channels, _height, _width) = self.size3()?;
        ensure!(
            mean.len() == channels as usize && std.len() == channels as usize,
            "expect {} mean and std values, but get {} and {}",
            channels,
            mean.len(),
            std.len()
        );
        ensure!(
            std.iter().all(|&val| val > 0.0),
            "standard deviations must be positive"
        );

        let device = self.device();
        let to_tensor = |values: &[f64]| {
            let values = values.iter().map(|&val| val as f32).collect_vec();
            Tensor::of_slice(&values)
                .view([channels, 1, 1])
                .to_device(device)
        };
        let normalized = (self - to_tensor(mean)) / to_tensor(std);
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_round_trip_preserves_colors() {
        let rgb = Tensor::rand(&[3, 8, 8], (Kind::Float, Device::Cpu));
        let restored = rgb.rgb_to_hsv().hsv_to_rgb();
        let max_err = f64::from(&(restored - &rgb).abs().max());
        assert!(max_err < 1e-3, "max error {}", max_err);
    }

    #[test]
    fn pure_red_has_zero_hue() {
        let rgb = Tensor::of_slice(&[1.0f32, 0.0, 0.0]).view([3, 1, 1]);
        let hsv = rgb.rgb_to_hsv();
        approx::assert_abs_diff_eq!(hsv.double_value(&[0, 0, 0]), 0.0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(hsv.double_value(&[1, 0, 0]), 1.0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(hsv.double_value(&[2, 0, 0]), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn crop_checks_bounds() -> Result<()> {
        let image = Tensor::zeros(&[3, 10, 12], (Kind::Float, Device::Cpu));
        assert_eq!(image.f_crop(2, 3, 5, 6)?.size(), vec![3, 5, 6]);
        assert!(image.f_crop(6, 0, 5, 6).is_err());
        assert!(image.f_crop(0, 0, 0, 6).is_err());
        Ok(())
    }

    #[test]
    fn flip_mirrors_width() {
        let image = Tensor::arange(6i64, (Kind::Float, Device::Cpu)).view([1, 2, 3]);
        let flipped = image.horizontal_flip();
        approx::assert_abs_diff_eq!(flipped.double_value(&[0, 0, 0]), 2.0);
        approx::assert_abs_diff_eq!(flipped.double_value(&[0, 1, 2]), 3.0);
    }

    #[test]
    fn normalize_per_channel() -> Result<()> {
        let image = Tensor::ones(&[3, 2, 2], (Kind::Float, Device::Cpu));
        let normalized = image.f_normalize_channels(&[0.5, 1.0, 0.0], &[0.5, 1.0, 2.0])?;
        approx::assert_abs_diff_eq!(normalized.double_value(&[0, 0, 0]), 1.0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(normalized.double_value(&[1, 1, 1]), 0.0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(normalized.double_value(&[2, 0, 1]), 0.5, epsilon = 1e-6);
        assert!(image.f_normalize_channels(&[0.0], &[1.0]).is_err());
        Ok(())
    }

    #[test]
    fn resize_float_image() -> Result<()> {
        let image = Tensor::rand(&[3, 20, 30], (Kind::Float, Device::Cpu));
        let resized = image.resize2d_exact(8, 8)?;
        assert_eq!(resized.size(), vec![3, 8, 8]);
        assert_eq!(resized.kind(), Kind::Float);
        Ok(())
    }
}
