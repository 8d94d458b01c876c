use anyhow::Result;
use futures::stream::TryStreamExt as _;
use image::{Rgb, RgbImage};
use rand::prelude::*;
use simclr_dl::{build_bundle, dataset::partition_sizes, Config};
use std::{num::NonZeroUsize, path::Path};
use tch::{Device, Kind, Tensor};

fn write_images(dir: &Path, count: usize) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0);
    for index in 0..count {
        let image = RgbImage::from_fn(64, 64, |_, _| Rgb(rng.gen()));
        image.save(dir.join(format!("{:02}.png", index)))?;
    }
    Ok(())
}

fn scenario_config(dir: &Path) -> Config {
    let mut config = Config::with_dataset_dir(dir);
    config.augmentation.crop_size = NonZeroUsize::new(32).unwrap();
    config.model.truncate_at_depth = 5;
    config.model.pool_output_channels = NonZeroUsize::new(256).unwrap();
    config.model.hidden_dim = NonZeroUsize::new(512).unwrap();
    config.model.embedding_dim = NonZeroUsize::new(128).unwrap();
    config.loader.batch_size = NonZeroUsize::new(4).unwrap();
    config.loader.num_workers = NonZeroUsize::new(2).unwrap();
    config
}

#[test]
fn partition_sizes_for_reference_counts() -> Result<()> {
    assert_eq!(partition_sizes(100, 0.7, 0.15)?, (70, 15, 15));
    assert_eq!(partition_sizes(97, 0.7, 0.15)?, (67, 14, 16));
    Ok(())
}

#[test]
fn assembled_model_embeds_and_scores_batches() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_images(dir.path(), 10)?;
    let bundle = build_bundle(&scenario_config(dir.path()))?;

    let xs = Tensor::randn(&[4, 3, 32, 32], (Kind::Float, Device::Cpu));
    let anchors = bundle.model.forward_t(&xs, true)?;
    assert_eq!(anchors.size(), vec![4, 128]);

    let ys = Tensor::randn(&[4, 3, 32, 32], (Kind::Float, Device::Cpu));
    let positives = bundle.model.forward_t(&ys, true)?;
    let loss = f64::from(&bundle.loss_fn.forward(&anchors, &positives)?);
    assert!(loss.is_finite());
    assert!(loss >= 0.0);
    Ok(())
}

#[async_std::test]
async fn one_epoch_of_training() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_images(dir.path(), 10)?;
    let mut bundle = build_bundle(&scenario_config(dir.path()))?;
    assert_eq!(bundle.train_loader.len(), 7);

    let batches: Vec<_> = bundle.train_loader.stream().try_collect().await?;
    assert_eq!(batches.len(), 2);

    for batch in batches.into_iter().filter(|batch| batch.len() >= 2) {
        assert_eq!(batch.anchors.size(), vec![batch.len() as i64, 3, 32, 32]);
        let anchors = bundle.model.forward_t(&batch.anchors, true)?;
        let positives = bundle.model.forward_t(&batch.positives, true)?;
        let loss = bundle.loss_fn.forward(&anchors, &positives)?;
        bundle.optimizer.backward_step(&loss);
        assert!(f64::from(&loss).is_finite());
    }

    let val_batches: Vec<_> = bundle.val_loader.stream().try_collect().await?;
    let num_val: usize = val_batches.iter().map(|batch| batch.len()).sum();
    assert_eq!(num_val, 1);
    Ok(())
}
