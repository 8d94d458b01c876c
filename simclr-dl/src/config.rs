//! Pipeline configuration format.

use crate::{common::*, dataset::NonImagePolicy};

pub use augmentation::*;
pub use dataset::*;
pub use model::*;
pub use training::*;

/// The configuration that drives dataset, model, loss, loaders and optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub augmentation: AugmentationConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub loss: LossConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub loader: LoaderOptions,
    #[serde(default)]
    pub optimizer: OptimizerOptions,
    #[serde(default)]
    pub training: TrainingConfig,
}

impl Config {
    /// Loads a json5 configuration file.
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::config(format!("unable to read '{}': {}", path.display(), err))
        })?;
        let config = json5::from_str(&text).map_err(|err| {
            Error::config(format!("unable to parse '{}': {}", path.display(), err))
        })?;
        Ok(config)
    }

    /// A configuration with defaults for everything except the dataset directory.
    pub fn with_dataset_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dataset: DatasetConfig {
                dir: dir.into(),
                non_image_policy: NonImagePolicy::default(),
            },
            augmentation: Default::default(),
            model: Default::default(),
            loss: Default::default(),
            partition: Default::default(),
            loader: Default::default(),
            optimizer: Default::default(),
            training: Default::default(),
        }
    }
}

mod dataset {
    use super::*;

    /// Dataset options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DatasetConfig {
        /// The directory holding the image files.
        pub dir: PathBuf,
        /// What to do with directory entries that are not images.
        #[serde(default)]
        pub non_image_policy: NonImagePolicy,
    }

    /// The split fractions. The test split takes the rest.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PartitionConfig {
        pub train_fraction: R64,
        pub val_fraction: R64,
        /// The seed of the one-time shuffle before splitting.
        #[serde(default)]
        pub seed: u64,
    }

    impl Default for PartitionConfig {
        fn default() -> Self {
            Self {
                train_fraction: r64(0.7),
                val_fraction: r64(0.15),
                seed: 0,
            }
        }
    }

    /// Batching options shared by the three loaders.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LoaderOptions {
        pub batch_size: NonZeroUsize,
        /// The number of batches decoded concurrently.
        pub num_workers: NonZeroUsize,
    }

    impl Default for LoaderOptions {
        fn default() -> Self {
            Self {
                batch_size: NonZeroUsize::new(128).unwrap(),
                num_workers: NonZeroUsize::new(4).unwrap(),
            }
        }
    }
}

mod augmentation {
    use super::*;

    /// The view augmentation options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AugmentationConfig {
        /// The side length of the square output views.
        pub crop_size: NonZeroUsize,
        /// The range of the cropped area relative to the image area.
        #[serde(default = "default_crop_scale")]
        pub crop_scale: (R64, R64),
        /// The range of the crop aspect ratio, width over height.
        #[serde(default = "default_crop_ratio")]
        pub crop_ratio: (R64, R64),
        /// The probability to apply horizontal flip.
        #[serde(default = "default_flip_prob")]
        pub flip_prob: R64,
        #[serde(default)]
        pub color_jitter: ColorJitterConfig,
        #[serde(default = "default_mean")]
        pub mean: [R64; 3],
        #[serde(default = "default_std")]
        pub std: [R64; 3],
    }

    impl AugmentationConfig {
        pub fn new(crop_size: NonZeroUsize) -> Self {
            Self {
                crop_size,
                crop_scale: default_crop_scale(),
                crop_ratio: default_crop_ratio(),
                flip_prob: default_flip_prob(),
                color_jitter: Default::default(),
                mean: default_mean(),
                std: default_std(),
            }
        }
    }

    impl Default for AugmentationConfig {
        fn default() -> Self {
            Self::new(NonZeroUsize::new(640).unwrap())
        }
    }

    /// Maximum jitter of each color property.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ColorJitterConfig {
        pub brightness: R64,
        pub contrast: R64,
        pub saturation: R64,
        /// The maximum hue shift in turns, at most 0.5.
        pub hue: R64,
    }

    impl Default for ColorJitterConfig {
        fn default() -> Self {
            Self {
                brightness: r64(0.2),
                contrast: r64(0.2),
                saturation: r64(0.1),
                hue: r64(0.1),
            }
        }
    }

    fn default_crop_scale() -> (R64, R64) {
        (r64(0.08), r64(1.0))
    }

    fn default_crop_ratio() -> (R64, R64) {
        (r64(3.0 / 4.0), r64(4.0 / 3.0))
    }

    fn default_flip_prob() -> R64 {
        r64(0.5)
    }

    fn default_mean() -> [R64; 3] {
        [r64(0.485), r64(0.456), r64(0.406)]
    }

    fn default_std() -> [R64; 3] {
        [r64(0.229), r64(0.224), r64(0.225)]
    }
}

mod model {
    use super::*;

    /// The backbone, head and loss options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ModelConfig {
        /// Scales the number of blocks in each C2f stage.
        pub depth_multiple: R64,
        /// Scales the number of channels of each stage.
        pub width_multiple: R64,
        /// The activation of every backbone convolution.
        #[serde(default)]
        pub activation: Activation,
        /// Pretrained backbone weights saved from a VarStore.
        pub weights_file: Option<PathBuf>,
        /// The number of leading stages kept from the pretrained network.
        pub truncate_at_depth: usize,
        pub pool_output_channels: NonZeroUsize,
        pub hidden_dim: NonZeroUsize,
        pub embedding_dim: NonZeroUsize,
        /// Whether backbone parameters receive gradient updates.
        pub trainable_backbone: bool,
    }

    impl Default for ModelConfig {
        fn default() -> Self {
            Self {
                depth_multiple: r64(0.33),
                width_multiple: r64(0.25),
                activation: Activation::Silu,
                weights_file: None,
                truncate_at_depth: 11,
                pool_output_channels: NonZeroUsize::new(1280).unwrap(),
                hidden_dim: NonZeroUsize::new(2048).unwrap(),
                embedding_dim: NonZeroUsize::new(128).unwrap(),
                trainable_backbone: true,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LossConfig {
        pub temperature: R64,
    }

    impl Default for LossConfig {
        fn default() -> Self {
            Self {
                temperature: r64(0.1),
            }
        }
    }
}

mod training {
    use super::*;

    /// Adam optimizer options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct OptimizerOptions {
        pub learning_rate: R64,
        pub beta1: R64,
        pub beta2: R64,
        pub weight_decay: R64,
    }

    impl Default for OptimizerOptions {
        fn default() -> Self {
            Self {
                learning_rate: r64(1e-3),
                beta1: r64(0.9),
                beta2: r64(0.999),
                weight_decay: r64(0.0),
            }
        }
    }

    /// The training loop options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TrainingConfig {
        pub epochs: NonZeroUsize,
        #[serde(with = "tch_serde::serde_device")]
        pub device: Device,
        /// The parent directory of per-run logging directories.
        pub logging_dir: PathBuf,
        /// If set, it saves a checkpoint file per this number of epochs.
        pub save_checkpoint_epochs: Option<NonZeroUsize>,
        /// If set, the training VarStore is restored from this file.
        pub load_checkpoint: Option<PathBuf>,
    }

    impl Default for TrainingConfig {
        fn default() -> Self {
            Self {
                epochs: NonZeroUsize::new(100).unwrap(),
                device: Device::Cpu,
                logging_dir: PathBuf::from("logs"),
                save_checkpoint_epochs: NonZeroUsize::new(1),
                load_checkpoint: None,
            }
        }
    }
}
