//! The random color distortion algorithm.

use crate::common::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColorJitterInit {
    pub brightness: R64,
    pub contrast: R64,
    pub saturation: R64,
    pub hue: R64,
}

impl ColorJitterInit {
    pub fn build(self) -> Result<ColorJitter> {
        let Self {
            brightness,
            contrast,
            saturation,
            hue,
        } = self;

        let factor_range = |name: &str, val: R64| -> Result<Option<(f64, f64)>> {
            if val < 0.0 {
                return Err(Error::config(format!("{} must be non-negative", name)));
            }
            let val = val.raw();
            Ok((val > 0.0).then(|| ((1.0 - val).max(0.0), 1.0 + val)))
        };

        let brightness = factor_range("brightness", brightness)?;
        let contrast = factor_range("contrast", contrast)?;
        let saturation = factor_range("saturation", saturation)?;
        let hue = {
            if !(0.0..=0.5).contains(&hue.raw()) {
                return Err(Error::config("hue must be in range [0, 0.5]"));
            }
            (hue > 0.0).then(|| hue.raw())
        };

        Ok(ColorJitter {
            brightness,
            contrast,
            saturation,
            hue,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JitterOp {
    Brightness,
    Contrast,
    Saturation,
    Hue,
}

/// Randomly changes brightness, contrast, saturation and hue, in random order.
#[derive(Debug, Clone)]
pub struct ColorJitter {
    brightness: Option<(f64, f64)>,
    contrast: Option<(f64, f64)>,
    saturation: Option<(f64, f64)>,
    hue: Option<f64>,
}

impl ColorJitter {
    /// Distorts a float `[3, H, W]` image with values in `[0, 1]`.
    pub fn forward<R>(&self, rng: &mut R, rgb: &Tensor) -> Result<Tensor>
    where
        R: Rng,
    {
        tch::no_grad(|| -> Result<_> {
            let (channels, _height, _width) = rgb.size3()?;
            if channels != 3 {
                return Err(Error::shape(format!(
                    "channel size must be 3, but get {}",
                    channels
                )));
            }

            let mut ops = [
                JitterOp::Brightness,
                JitterOp::Contrast,
                JitterOp::Saturation,
                JitterOp::Hue,
            ];
            ops.shuffle(rng);

            ops.iter().try_fold(rgb.shallow_clone(), |rgb, op| -> Result<_> {
                let output = match *op {
                    JitterOp::Brightness => match self.brightness {
                        Some((lo, up)) => {
                            let factor = rng.gen_range(lo..=up);
                            (rgb * factor).clamp(0.0, 1.0)
                        }
                        None => rgb,
                    },
                    JitterOp::Contrast => match self.contrast {
                        Some((lo, up)) => {
                            let factor = rng.gen_range(lo..=up);
                            let mean = rgb.f_rgb_to_grayscale().or_shape()?.mean(Kind::Float);
                            blend(&rgb, &mean, factor)
                        }
                        None => rgb,
                    },
                    JitterOp::Saturation => match self.saturation {
                        Some((lo, up)) => {
                            let factor = rng.gen_range(lo..=up);
                            let gray = rgb.f_rgb_to_grayscale().or_shape()?;
                            blend(&rgb, &gray, factor)
                        }
                        None => rgb,
                    },
                    JitterOp::Hue => match self.hue {
                        Some(max_shift) => {
                            let shift = rng.gen_range(-max_shift..=max_shift);
                            let hsv = rgb.f_rgb_to_hsv().or_shape()?;
                            let hue = (hsv.select(0, 0) + shift + 1.0).fmod(1.0);
                            let hsv = Tensor::stack(&[hue, hsv.select(0, 1), hsv.select(0, 2)], 0);
                            hsv.f_hsv_to_rgb().or_shape()?.clamp(0.0, 1.0)
                        }
                        None => rgb,
                    },
                };
                Ok(output)
            })
        })
    }
}

/// Computes `factor * image + (1 - factor) * other`, clamped to `[0, 1]`.
fn blend(image: &Tensor, other: &Tensor, factor: f64) -> Tensor {
    (image * factor + other * (1.0 - factor)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(brightness: f64, contrast: f64, saturation: f64, hue: f64) -> ColorJitterInit {
        ColorJitterInit {
            brightness: r64(brightness),
            contrast: r64(contrast),
            saturation: r64(saturation),
            hue: r64(hue),
        }
    }

    #[test]
    fn output_stays_in_unit_range() -> anyhow::Result<()> {
        let jitter = init(0.8, 0.8, 0.8, 0.5).build()?;
        let mut rng = StdRng::seed_from_u64(5);
        let image = Tensor::rand(&[3, 16, 16], (Kind::Float, Device::Cpu));

        for _ in 0..20 {
            let output = jitter.forward(&mut rng, &image)?;
            assert_eq!(output.size(), vec![3, 16, 16]);
            assert!(f64::from(&output.min()) >= 0.0);
            assert!(f64::from(&output.max()) <= 1.0);
        }
        Ok(())
    }

    #[test]
    fn zero_jitter_is_identity() -> anyhow::Result<()> {
        let jitter = init(0.0, 0.0, 0.0, 0.0).build()?;
        let image = Tensor::rand(&[3, 8, 8], (Kind::Float, Device::Cpu));
        let output = jitter.forward(&mut StdRng::seed_from_u64(6), &image)?;
        let max_err = f64::from(&(output - &image).abs().max());
        approx::assert_abs_diff_eq!(max_err, 0.0);
        Ok(())
    }

    #[test]
    fn gray_image_keeps_saturation_zero() -> anyhow::Result<()> {
        let jitter = init(0.0, 0.0, 0.9, 0.0).build()?;
        let image = Tensor::full(&[3, 4, 4], 0.5, (Kind::Float, Device::Cpu));
        let output = jitter.forward(&mut StdRng::seed_from_u64(7), &image)?;
        let max_err = f64::from(&(output - &image).abs().max());
        assert!(max_err < 1e-5);
        Ok(())
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(matches!(
            init(-0.1, 0.0, 0.0, 0.0).build(),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            init(0.0, 0.0, 0.0, 0.6).build(),
            Err(Error::Configuration(_))
        ));
    }
}
