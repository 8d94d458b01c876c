//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use chrono::{DateTime, Local};
pub use futures::{
    future::FutureExt,
    stream::{Stream, StreamExt, TryStreamExt},
};
pub use itertools::Itertools;
pub use noisy_float::prelude::*;
pub use simclr_dl::{
    config::Config,
    dataset::{DataLoader, PairedBatch},
    loss::InfoNceLoss,
    model::ContrastiveModel,
    TrainingBundle,
};
pub use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
pub use tch::{nn, Device, Kind, Tensor};
pub use tokio::sync::mpsc;
pub use tracing::{debug, info, info_span, trace_span, warn, Instrument};

pub type Fallible<T> = Result<T, Error>;
