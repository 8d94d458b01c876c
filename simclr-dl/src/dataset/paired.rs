use super::{enumerate_images, ImageRecord, NonImagePolicy};
use crate::{common::*, processor::ViewAugmentor};

/// Two augmented views of the same image.
#[derive(Debug)]
pub struct ViewPair {
    pub anchor: Tensor,
    pub positive: Tensor,
}

/// A directory of images served as pairs of independently augmented views.
///
/// Images are decoded on every access. Nothing is cached.
#[derive(Debug, Clone)]
pub struct PairedViewDataset {
    dir: PathBuf,
    records: Arc<[ImageRecord]>,
    augmentor: Arc<ViewAugmentor>,
}

impl PairedViewDataset {
    pub fn new<P>(dir: P, augmentor: ViewAugmentor, policy: NonImagePolicy) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let dir = dir.as_ref();
        let records = enumerate_images(dir, policy)?;
        info!(
            "loaded dataset with {} images from '{}'",
            records.len(),
            dir.display()
        );

        Ok(Self {
            dir: dir.to_owned(),
            records: records.into(),
            augmentor: Arc::new(augmentor),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn augmentor(&self) -> &ViewAugmentor {
        &self.augmentor
    }

    /// Decodes the image at `index` and draws two views from it.
    pub fn get(&self, index: usize) -> Result<ViewPair> {
        let record = self.records.get(index).ok_or_else(|| {
            Error::config(format!(
                "index {} is out of range for a dataset of {} images",
                index,
                self.records.len()
            ))
        })?;

        let image = image::open(record.path()).map_err(|source| Error::Load {
            path: record.path.clone(),
            source,
        })?;
        let image = (&image).into_tensor();

        let anchor = self.augmentor.forward(&image)?;
        let positive = self.augmentor.forward(&image)?;

        Ok(ViewPair { anchor, positive })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::AugmentationConfig;
    use image::{Rgb, RgbImage};

    /// Writes `count` random RGB images of the given size into `dir`.
    pub(crate) fn write_dummy_images(
        dir: &Path,
        count: usize,
        width: u32,
        height: u32,
    ) -> anyhow::Result<()> {
        let mut rng = StdRng::seed_from_u64(count as u64);
        for index in 0..count {
            let image = RgbImage::from_fn(width, height, |_, _| Rgb(rng.gen()));
            image.save(dir.join(format!("image_{:03}.png", index)))?;
        }
        Ok(())
    }

    fn augmentor(crop_size: usize) -> anyhow::Result<ViewAugmentor> {
        let config = AugmentationConfig::new(NonZeroUsize::new(crop_size).unwrap());
        Ok(ViewAugmentor::new(&config)?)
    }

    #[test]
    fn length_counts_images_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_dummy_images(dir.path(), 6, 20, 20)?;
        std::fs::write(dir.path().join("README.md"), b"not an image")?;

        let dataset = PairedViewDataset::new(dir.path(), augmentor(16)?, NonImagePolicy::Skip)?;
        assert_eq!(dataset.len(), 6);
        assert!(!dataset.is_empty());
        Ok(())
    }

    #[test]
    fn two_gets_give_same_shape_and_different_content() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_dummy_images(dir.path(), 2, 64, 64)?;
        let dataset = PairedViewDataset::new(dir.path(), augmentor(32)?, NonImagePolicy::Skip)?;

        let first = dataset.get(0)?;
        let second = dataset.get(0)?;
        for view in [&first.anchor, &first.positive, &second.anchor, &second.positive] {
            assert_eq!(view.size(), vec![3, 32, 32]);
        }
        let diff = f64::from(&(&first.anchor - &second.anchor).abs().sum(Kind::Float));
        assert!(diff > 0.0);
        Ok(())
    }

    #[test]
    fn out_of_range_index_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_dummy_images(dir.path(), 1, 8, 8)?;
        let dataset = PairedViewDataset::new(dir.path(), augmentor(8)?, NonImagePolicy::Skip)?;
        assert!(matches!(dataset.get(1), Err(Error::Configuration(_))));
        Ok(())
    }

    #[test]
    fn corrupt_file_is_a_load_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not png data")?;
        let dataset = PairedViewDataset::new(dir.path(), augmentor(8)?, NonImagePolicy::Skip)?;

        match dataset.get(0) {
            Err(Error::Load { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expect a load error, but get {:?}", other.map(|_| ())),
        }
        Ok(())
    }
}
