pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use itertools::{izip, Itertools};
pub use std::borrow::Borrow;
pub use strum::AsRefStr;
pub use tch::{
    nn::{self, Module as _, ModuleT as _},
    Device, IndexOp, Kind, Reduction, Tensor,
};
pub use tch_act::{Activation, TensorActivationExt as _};

pub type Fallible<T> = Result<T, Error>;
