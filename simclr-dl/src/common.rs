pub use crate::error::{Error, Result};
pub(crate) use crate::error::ResultExt as _;
pub use derivative::Derivative;
pub use futures::stream::{self, BoxStream, Stream, StreamExt as _, TryStreamExt as _};
pub use itertools::Itertools as _;
pub use log::{debug, info, warn};
pub use noisy_float::prelude::*;
pub use rand::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Borrow,
    collections::HashMap,
    fmt::Debug,
    num::NonZeroUsize,
    ops::Range,
    path::{Path, PathBuf},
    sync::{
        atomic::{self, AtomicU64},
        Arc,
    },
};
pub use tch::{
    nn::{self, ModuleT as _, OptimizerConfig as _},
    vision, Device, IndexOp, Kind, Reduction, Tensor,
};
pub use tch_act::Activation;
pub use tch_goodies::{IntoTensor as _, TensorExt as _};
pub use tensor_shape::{Dim, Shape};
