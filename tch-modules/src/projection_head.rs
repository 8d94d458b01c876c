use crate::{common::*, conv_bn_2d::BN_EPS};

#[derive(Debug, Clone)]
pub struct ProjectionHeadInit {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub output_dim: usize,
    pub batch_norm: bool,
}

impl ProjectionHeadInit {
    pub fn new(input_dim: usize, hidden_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            hidden_dim,
            output_dim,
            batch_norm: true,
        }
    }

    pub fn build<'p, P>(self, path: P) -> Result<ProjectionHead>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self {
            input_dim,
            hidden_dim,
            output_dim,
            batch_norm,
        } = self;
        ensure!(input_dim > 0, "input_dim must be positive");
        ensure!(hidden_dim > 0, "hidden_dim must be positive");
        ensure!(output_dim > 0, "output_dim must be positive");

        let hidden = nn::linear(
            path / "hidden",
            input_dim as i64,
            hidden_dim as i64,
            nn::LinearConfig {
                bias: !batch_norm,
                ..Default::default()
            },
        );
        let bn = batch_norm.then(|| {
            nn::batch_norm1d(
                path / "bn",
                hidden_dim as i64,
                nn::BatchNormConfig {
                    eps: BN_EPS,
                    ..Default::default()
                },
            )
        });
        let output = nn::linear(
            path / "output",
            hidden_dim as i64,
            output_dim as i64,
            Default::default(),
        );

        Ok(ProjectionHead {
            hidden,
            bn,
            output,
            input_dim,
            output_dim,
        })
    }
}

/// The SimCLR projection head: linear, batch norm, ReLU, linear.
#[derive(Debug)]
pub struct ProjectionHead {
    hidden: nn::Linear,
    bn: Option<nn::BatchNorm>,
    output: nn::Linear,
    input_dim: usize,
    output_dim: usize,
}

impl ProjectionHead {
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }
}

impl nn::ModuleT for ProjectionHead {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let xs = xs.apply(&self.hidden);
        let xs = match &self.bn {
            Some(bn) => xs.apply_t(bn, train),
            None => xs,
        };
        xs.relu().apply(&self.output)
    }
}
