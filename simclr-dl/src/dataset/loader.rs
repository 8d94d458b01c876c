//! Batched, concurrent loading of paired views.

use super::{PairedViewDataset, ViewPair};
use crate::common::*;

/// Options of a [DataLoader].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoaderConfig {
    pub batch_size: usize,
    /// The number of batches loaded concurrently.
    pub num_workers: usize,
    /// Reshuffle the indexes on every pass.
    pub shuffle: bool,
    pub seed: u64,
}

/// A batch of view pairs stacked along the first dimension.
#[derive(Debug)]
pub struct PairedBatch {
    /// The dataset indexes of the batch items.
    pub indexes: Vec<usize>,
    pub anchors: Tensor,
    pub positives: Tensor,
}

impl PairedBatch {
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// Serves a subset of a [PairedViewDataset] in batches.
#[derive(Debug)]
pub struct DataLoader {
    dataset: PairedViewDataset,
    indexes: Arc<[usize]>,
    batch_size: usize,
    num_workers: usize,
    shuffle: bool,
    seed: u64,
    epoch: AtomicU64,
}

impl DataLoader {
    pub fn new(
        dataset: PairedViewDataset,
        indexes: Vec<usize>,
        config: LoaderConfig,
    ) -> Result<Self> {
        let LoaderConfig {
            batch_size,
            num_workers,
            shuffle,
            seed,
        } = config;

        if batch_size == 0 {
            return Err(Error::config("batch_size must be positive"));
        }
        if num_workers == 0 {
            return Err(Error::config("num_workers must be positive"));
        }
        if let Some(&index) = indexes.iter().find(|&&index| index >= dataset.len()) {
            return Err(Error::config(format!(
                "index {} is out of range for a dataset of {} images",
                index,
                dataset.len()
            )));
        }

        Ok(Self {
            dataset,
            indexes: indexes.into(),
            batch_size,
            num_workers,
            shuffle,
            seed,
            epoch: AtomicU64::new(0),
        })
    }

    /// The number of samples served per pass.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The number of batches per pass. The last batch may be short.
    pub fn num_batches(&self) -> usize {
        (self.indexes.len() + self.batch_size - 1) / self.batch_size
    }

    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }

    /// Starts a new pass over the data.
    ///
    /// A shuffling loader draws a new order seeded by `seed + epoch`, where
    /// the epoch counts the passes started so far. Batches are produced in
    /// order even though up to `num_workers` of them are loaded at once.
    pub fn stream(&self) -> BoxStream<'static, Result<PairedBatch>> {
        let order: Vec<usize> = if self.shuffle {
            let epoch = self.epoch.fetch_add(1, atomic::Ordering::SeqCst);
            let mut order = self.indexes.to_vec();
            order.shuffle(&mut StdRng::seed_from_u64(self.seed.wrapping_add(epoch)));
            order
        } else {
            self.indexes.to_vec()
        };
        let batches: Vec<Vec<usize>> = order
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        let dataset = self.dataset.clone();
        stream::iter(batches)
            .map(move |indexes| {
                let dataset = dataset.clone();
                async_std::task::spawn_blocking(move || load_batch(&dataset, indexes))
            })
            .buffered(self.num_workers)
            .boxed()
    }
}

fn load_batch(dataset: &PairedViewDataset, indexes: Vec<usize>) -> Result<PairedBatch> {
    tch::no_grad(|| -> Result<_> {
        let pairs: Vec<ViewPair> = indexes
            .iter()
            .map(|&index| dataset.get(index))
            .collect::<Result<_>>()?;
        let (anchors, positives): (Vec<_>, Vec<_>) = pairs
            .into_iter()
            .map(|pair| (pair.anchor, pair.positive))
            .unzip();

        Ok(PairedBatch {
            indexes,
            anchors: Tensor::f_stack(&anchors, 0)?,
            positives: Tensor::f_stack(&positives, 0)?,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AugmentationConfig, dataset::paired::tests::write_dummy_images,
        dataset::NonImagePolicy, processor::ViewAugmentor,
    };

    fn dataset(dir: &Path, count: usize) -> anyhow::Result<PairedViewDataset> {
        write_dummy_images(dir, count, 24, 24)?;
        let config = AugmentationConfig::new(NonZeroUsize::new(16).unwrap());
        let augmentor = ViewAugmentor::new(&config)?;
        Ok(PairedViewDataset::new(dir, augmentor, NonImagePolicy::Skip)?)
    }

    async fn collect_indexes(loader: &DataLoader) -> anyhow::Result<Vec<Vec<usize>>> {
        let batches: Vec<PairedBatch> = loader.stream().try_collect().await?;
        Ok(batches.into_iter().map(|batch| batch.indexes).collect())
    }

    #[async_std::test]
    async fn every_index_is_served_once_per_pass() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let loader = DataLoader::new(
            dataset(dir.path(), 7)?,
            (0..7).collect(),
            LoaderConfig {
                batch_size: 3,
                num_workers: 2,
                shuffle: true,
                seed: 1,
            },
        )?;
        assert_eq!(loader.num_batches(), 3);

        let batches: Vec<PairedBatch> = loader.stream().try_collect().await?;
        assert_eq!(
            batches.iter().map(|batch| batch.len()).collect::<Vec<_>>(),
            [3, 3, 1]
        );
        for batch in &batches {
            assert_eq!(batch.anchors.size(), vec![batch.len() as i64, 3, 16, 16]);
            assert_eq!(batch.positives.size(), batch.anchors.size());
        }

        let mut served: Vec<usize> = batches.into_iter().flat_map(|batch| batch.indexes).collect();
        served.sort_unstable();
        assert_eq!(served, (0..7).collect::<Vec<_>>());
        Ok(())
    }

    #[async_std::test]
    async fn only_shuffling_loaders_change_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let dataset = dataset(dir.path(), 12)?;
        let config = |shuffle| LoaderConfig {
            batch_size: 12,
            num_workers: 1,
            shuffle,
            seed: 9,
        };
        let fixed = DataLoader::new(dataset.clone(), (0..12).collect(), config(false))?;
        let shuffled = DataLoader::new(dataset, (0..12).collect(), config(true))?;

        assert_eq!(collect_indexes(&fixed).await?, vec![(0..12).collect::<Vec<_>>()]);
        assert_eq!(collect_indexes(&fixed).await?, vec![(0..12).collect::<Vec<_>>()]);
        assert_ne!(collect_indexes(&shuffled).await?, collect_indexes(&shuffled).await?);
        Ok(())
    }

    #[test]
    fn invalid_options_are_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let dataset = dataset(dir.path(), 2)?;
        let config = LoaderConfig {
            batch_size: 0,
            num_workers: 1,
            shuffle: false,
            seed: 0,
        };
        assert!(DataLoader::new(dataset.clone(), vec![0, 1], config.clone()).is_err());
        let config = LoaderConfig {
            batch_size: 1,
            ..config
        };
        assert!(DataLoader::new(dataset, vec![0, 5], config).is_err());
        Ok(())
    }
}
