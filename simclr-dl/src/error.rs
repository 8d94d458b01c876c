//! The error type shared by the pipeline components.

use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration value, detected before any forward pass.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An image file cannot be read or decoded.
    #[error("failed to load '{}': {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// Tensor shapes passed to an operation disagree.
    #[error("shape error: {0}")]
    Shape(String),
    /// A network produced an output shape other than the expected one.
    #[error("runtime shape error: {0}")]
    RuntimeShape(String),
    #[error(transparent)]
    Torch(#[from] tch::TchError),
}

impl Error {
    pub(crate) fn config(msg: impl ToString) -> Self {
        Self::Configuration(msg.to_string())
    }

    pub(crate) fn shape(msg: impl ToString) -> Self {
        Self::Shape(msg.to_string())
    }

    pub(crate) fn runtime_shape(msg: impl ToString) -> Self {
        Self::RuntimeShape(msg.to_string())
    }
}

/// Builds an error from the alternate display of a building-block error,
/// which includes its context chain.
pub(crate) trait ResultExt<T> {
    fn or_config(self) -> Result<T>;
    fn or_shape(self) -> Result<T>;
}

impl<T> ResultExt<T> for anyhow::Result<T> {
    fn or_config(self) -> Result<T> {
        self.map_err(|err| Error::Configuration(format!("{:#}", err)))
    }

    fn or_shape(self) -> Result<T> {
        self.map_err(|err| Error::Shape(format!("{:#}", err)))
    }
}
