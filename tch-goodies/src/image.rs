use crate::common::*;
use image::{DynamicImage, RgbImage};

/// Conversion from decoded images to `[C, H, W]` tensors.
pub trait IntoTensor {
    fn into_tensor(self) -> Tensor;
}

impl IntoTensor for &RgbImage {
    fn into_tensor(self) -> Tensor {
        let (width, height) = self.dimensions();
        Tensor::of_slice(self.as_raw())
            .view([height as i64, width as i64, 3])
            .permute(&[2, 0, 1])
            .contiguous()
    }
}

impl IntoTensor for &DynamicImage {
    /// Converts the image to 8-bit RGB first, whatever the original color mode.
    fn into_tensor(self) -> Tensor {
        (&self.to_rgb8()).into_tensor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn rgb_image_layout() {
        let image = RgbImage::from_fn(4, 2, |x, y| Rgb([x as u8, y as u8, 7]));
        let tensor = image.into_tensor();
        assert_eq!(tensor.size(), vec![3, 2, 4]);
        assert_eq!(tensor.kind(), Kind::Uint8);
        assert_eq!(tensor.int64_value(&[0, 1, 3]), 3);
        assert_eq!(tensor.int64_value(&[1, 1, 3]), 1);
        assert_eq!(tensor.int64_value(&[2, 0, 0]), 7);
    }

    #[test]
    fn gray_image_becomes_rgb() {
        let gray = DynamicImage::new_luma8(5, 3);
        let tensor = (&gray).into_tensor();
        assert_eq!(tensor.size(), vec![3, 3, 5]);
    }
}
