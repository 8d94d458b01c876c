pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use itertools::Itertools;
pub use std::borrow::Borrow;
pub use tch::{vision, Device, IndexOp, Kind, Tensor};

pub type Fallible<T> = Result<T, Error>;
