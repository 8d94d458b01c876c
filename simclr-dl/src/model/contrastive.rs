use super::AdaptedBackbone;
use crate::common::*;
use tch_modules::{ProjectionHead, ProjectionHeadInit};

/// The variable root of the projection head in the training VarStore.
pub const PROJECTION_HEAD_PREFIX: &str = "projection_head";

/// Sizes of the projection head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectionConfig {
    pub hidden_dim: usize,
    pub embedding_dim: usize,
}

/// An adapted backbone followed by a projection head, mapping images to
/// embeddings.
#[derive(Debug)]
pub struct ContrastiveModel {
    backbone: AdaptedBackbone,
    head: ProjectionHead,
}

impl ContrastiveModel {
    pub fn new(
        vs: &nn::VarStore,
        backbone: AdaptedBackbone,
        feature_dim: usize,
        projection: ProjectionConfig,
    ) -> Result<Self> {
        if feature_dim != backbone.feature_dim() {
            return Err(Error::config(format!(
                "feature_dim {} differs from the backbone output width {}",
                feature_dim,
                backbone.feature_dim()
            )));
        }
        let ProjectionConfig {
            hidden_dim,
            embedding_dim,
        } = projection;

        let head = ProjectionHeadInit::new(feature_dim, hidden_dim, embedding_dim)
            .build(&vs.root() / PROJECTION_HEAD_PREFIX)
            .or_config()?;

        Ok(Self { backbone, head })
    }

    pub fn backbone(&self) -> &AdaptedBackbone {
        &self.backbone
    }

    pub fn feature_dim(&self) -> usize {
        self.head.input_dim()
    }

    pub fn embedding_dim(&self) -> usize {
        self.head.output_dim()
    }

    /// Maps a `[B, 3, H, W]` batch to `[B, embedding_dim]` embeddings.
    ///
    /// Batch norm statistics need at least two samples in training mode.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        match *xs.size().as_slice() {
            [batch_size, 3, height, width] if height > 0 && width > 0 => {
                if train && batch_size < 2 {
                    return Err(Error::shape(format!(
                        "training needs at least 2 samples per batch, but get {}",
                        batch_size
                    )));
                }
            }
            _ => {
                return Err(Error::shape(format!(
                    "expect a [B, 3, H, W] input, but get {:?}",
                    xs.size()
                )))
            }
        }

        let features = self.backbone.f_forward_t(xs, train)?;
        Ok(self.head.forward_t(&features, train))
    }
}
