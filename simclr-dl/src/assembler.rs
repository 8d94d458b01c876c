//! Wires dataset, model, loss, optimizer and loaders into a training bundle.

use crate::{
    common::*,
    config::{Config, ModelConfig},
    dataset::{
        partition, partition_sizes, DataLoader, LoaderConfig, PairedViewDataset, Partition,
    },
    loss::InfoNceLoss,
    model::{adapt, ContrastiveModel, ProjectionConfig, StagedNetwork, YoloBackbone, YoloScale},
    processor::ViewAugmentor,
};

/// Everything needed to train, validate and test the contrastive model.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TrainingBundle {
    pub train_loader: DataLoader,
    pub val_loader: DataLoader,
    pub test_loader: DataLoader,
    pub model: ContrastiveModel,
    pub loss_fn: InfoNceLoss,
    #[derivative(Debug = "ignore")]
    pub optimizer: nn::Optimizer,
    /// Holds every trainable variable of `model`.
    #[derivative(Debug = "ignore")]
    pub vs: nn::VarStore,
    pub partition: Partition,
}

/// Builds the bundle with the learning rate from the configuration.
pub fn build_bundle(config: &Config) -> Result<TrainingBundle> {
    build_bundle_with_lr(config, config.optimizer.learning_rate.raw())
}

/// Builds the bundle with the given learning rate.
///
/// Every configuration error is reported before the first forward pass.
pub fn build_bundle_with_lr(config: &Config, learning_rate: f64) -> Result<TrainingBundle> {
    let Config {
        dataset: ref dataset_config,
        ref augmentation,
        model: ref model_config,
        ref loss,
        partition: ref partition_config,
        ref loader,
        optimizer: ref optimizer_config,
        ref training,
    } = *config;

    if !(learning_rate.is_finite() && learning_rate > 0.0) {
        return Err(Error::config(format!(
            "learning rate must be positive, but get {}",
            learning_rate
        )));
    }
    let loss_fn = InfoNceLoss::new(loss.temperature.raw(), Reduction::Mean)?;
    let augmentor = ViewAugmentor::new(augmentation)?;
    let crop_size = augmentor.crop_size();
    // fraction check only
    partition_sizes(
        0,
        partition_config.train_fraction.raw(),
        partition_config.val_fraction.raw(),
    )?;

    // dataset
    let dataset = PairedViewDataset::new(
        &dataset_config.dir,
        augmentor,
        dataset_config.non_image_policy,
    )?;
    if dataset.is_empty() {
        return Err(Error::config(format!(
            "no images found in '{}'",
            dataset_config.dir.display()
        )));
    }

    // model
    let pretrained = build_pretrained(model_config, training.device)?;
    if !(1..=pretrained.num_stages()).contains(&model_config.truncate_at_depth) {
        return Err(Error::config(format!(
            "truncate_at_depth must be in range [1, {}], but get {}",
            pretrained.num_stages(),
            model_config.truncate_at_depth
        )));
    }
    let vs = nn::VarStore::new(training.device);
    let (backbone, feature_dim) = adapt(
        &pretrained,
        &vs,
        model_config.truncate_at_depth,
        crop_size,
        model_config.pool_output_channels.get(),
        model_config.trainable_backbone,
    )?;
    let model = ContrastiveModel::new(
        &vs,
        backbone,
        feature_dim,
        ProjectionConfig {
            hidden_dim: model_config.hidden_dim.get(),
            embedding_dim: model_config.embedding_dim.get(),
        },
    )?;

    // optimizer
    let optimizer = nn::Adam {
        beta1: optimizer_config.beta1.raw(),
        beta2: optimizer_config.beta2.raw(),
        wd: optimizer_config.weight_decay.raw(),
        ..Default::default()
    }
    .build(&vs, learning_rate)?;

    // partition and loaders
    let partition = partition(
        dataset.len(),
        partition_config.train_fraction.raw(),
        partition_config.val_fraction.raw(),
        partition_config.seed,
    )?;
    info!(
        "dataset split: {} train, {} val, {} test",
        partition.train.len(),
        partition.val.len(),
        partition.test.len()
    );

    let loader_config = |shuffle| LoaderConfig {
        batch_size: loader.batch_size.get(),
        num_workers: loader.num_workers.get(),
        shuffle,
        seed: partition_config.seed,
    };
    let train_loader = DataLoader::new(
        dataset.clone(),
        partition.train.clone(),
        loader_config(true),
    )?;
    let val_loader = DataLoader::new(
        dataset.clone(),
        partition.val.clone(),
        loader_config(false),
    )?;
    let test_loader = DataLoader::new(dataset, partition.test.clone(), loader_config(false))?;

    Ok(TrainingBundle {
        train_loader,
        val_loader,
        test_loader,
        model,
        loss_fn,
        optimizer,
        vs,
        partition,
    })
}

fn build_pretrained(config: &ModelConfig, device: Device) -> Result<YoloBackbone> {
    let scale = YoloScale {
        depth_multiple: config.depth_multiple.raw(),
        width_multiple: config.width_multiple.raw(),
    };
    let mut pretrained = YoloBackbone::new(device, scale, config.activation)?;

    match &config.weights_file {
        Some(path) => pretrained.load(path)?,
        None => warn!("no backbone weights file is given, using randomly initialized weights"),
    }

    Ok(pretrained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::write_dummy_images;

    fn small_config(dir: &Path) -> Config {
        let mut config = Config::with_dataset_dir(dir);
        config.augmentation.crop_size = NonZeroUsize::new(32).unwrap();
        config.model.truncate_at_depth = 5;
        config.model.pool_output_channels = NonZeroUsize::new(64).unwrap();
        config.model.hidden_dim = NonZeroUsize::new(64).unwrap();
        config.model.embedding_dim = NonZeroUsize::new(16).unwrap();
        config.loader.batch_size = NonZeroUsize::new(4).unwrap();
        config
    }

    #[test]
    fn bundle_wires_all_parts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_dummy_images(dir.path(), 20, 40, 40)?;
        let bundle = build_bundle(&small_config(dir.path()))?;

        assert_eq!(bundle.partition.train.len(), 14);
        assert_eq!(bundle.partition.val.len(), 3);
        assert_eq!(bundle.partition.test.len(), 3);
        assert_eq!(bundle.train_loader.len(), 14);
        assert_eq!(bundle.train_loader.num_batches(), 4);
        assert_eq!(bundle.model.embedding_dim(), 16);
        approx::assert_abs_diff_eq!(bundle.loss_fn.temperature(), 0.1);
        Ok(())
    }

    #[test]
    fn empty_directory_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = build_bundle(&small_config(dir.path()));
        assert!(matches!(result, Err(Error::Configuration(_))));
        Ok(())
    }

    #[test]
    fn invalid_settings_are_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_dummy_images(dir.path(), 3, 16, 16)?;

        let mut config = small_config(dir.path());
        config.model.truncate_at_depth = 12;
        assert!(matches!(build_bundle(&config), Err(Error::Configuration(_))));

        let mut config = small_config(dir.path());
        config.partition.train_fraction = r64(0.9);
        config.partition.val_fraction = r64(0.2);
        assert!(matches!(build_bundle(&config), Err(Error::Configuration(_))));

        let mut config = small_config(dir.path());
        config.loss.temperature = r64(0.0);
        assert!(matches!(build_bundle(&config), Err(Error::Configuration(_))));

        let config = small_config(dir.path());
        assert!(matches!(
            build_bundle_with_lr(&config, -1.0),
            Err(Error::Configuration(_))
        ));
        Ok(())
    }

    #[test]
    fn one_optimizer_step_changes_weights() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_dummy_images(dir.path(), 8, 40, 40)?;
        let mut bundle = build_bundle_with_lr(&small_config(dir.path()), 1e-2)?;

        let before = bundle.vs.variables()["projection_head.output.weight"].copy();
        let anchors = Tensor::randn(&[4, 3, 32, 32], (Kind::Float, Device::Cpu));
        let positives = Tensor::randn(&[4, 3, 32, 32], (Kind::Float, Device::Cpu));
        let loss = bundle.loss_fn.forward(
            &bundle.model.forward_t(&anchors, true)?,
            &bundle.model.forward_t(&positives, true)?,
        )?;
        bundle.optimizer.backward_step(&loss);

        let after = &bundle.vs.variables()["projection_head.output.weight"];
        assert!(!after.equal(&before));
        Ok(())
    }
}
