//! Paired-view dataset, partitioning and batch loading.

mod loader;
mod paired;
mod partition;
mod record;

pub use loader::*;
pub use paired::*;
pub use partition::*;
pub use record::*;
