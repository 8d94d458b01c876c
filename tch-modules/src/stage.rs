use crate::{
    c2f::{C2f, C2fInit},
    common::*,
    conv_bn_2d::{ConvBn2D, ConvBn2DInit},
    pool_head::{PoolHead, PoolHeadInit},
    sppf::{Sppf, SppfInit},
    up_sample_2d::UpSample2D,
};

/// The recipe of one backbone stage. Building the same recipe twice yields
/// modules with identical variable names and shapes.
#[derive(Debug, Clone, AsRefStr)]
pub enum StageInit {
    ConvBn2D(ConvBn2DInit),
    C2f(C2fInit),
    Sppf(SppfInit),
    UpSample2D { scale: f64 },
    PoolHead(PoolHeadInit),
}

impl StageInit {
    /// The number of output channels given the number of input channels.
    pub fn out_channels(&self, in_c: usize) -> usize {
        match self {
            Self::ConvBn2D(init) => init.out_c,
            Self::C2f(init) => init.out_c,
            Self::Sppf(init) => init.out_c,
            Self::UpSample2D { .. } => in_c,
            Self::PoolHead(init) => init.out_c,
        }
    }

    pub fn build<'p, P>(&self, path: P) -> Result<Stage>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let stage: Stage = match self {
            Self::ConvBn2D(init) => init.clone().build(path).into(),
            Self::C2f(init) => init.clone().build(path).into(),
            Self::Sppf(init) => init.clone().build(path).into(),
            Self::UpSample2D { scale } => UpSample2D::new(*scale)?.into(),
            Self::PoolHead(init) => init.clone().build(path)?.into(),
        };
        Ok(stage)
    }
}

/// One element of a sequential backbone.
#[derive(Debug, AsRefStr)]
pub enum Stage {
    ConvBn2D(ConvBn2D),
    C2f(C2f),
    Sppf(Sppf),
    UpSample2D(UpSample2D),
    PoolHead(PoolHead),
}

impl nn::ModuleT for Stage {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        match self {
            Self::ConvBn2D(module) => module.forward_t(xs, train),
            Self::C2f(module) => module.forward_t(xs, train),
            Self::Sppf(module) => module.forward_t(xs, train),
            Self::UpSample2D(module) => module.forward(xs),
            Self::PoolHead(module) => module.forward_t(xs, train),
        }
    }
}

impl From<ConvBn2D> for Stage {
    fn from(v: ConvBn2D) -> Self {
        Self::ConvBn2D(v)
    }
}

impl From<C2f> for Stage {
    fn from(v: C2f) -> Self {
        Self::C2f(v)
    }
}

impl From<Sppf> for Stage {
    fn from(v: Sppf) -> Self {
        Self::Sppf(v)
    }
}

impl From<UpSample2D> for Stage {
    fn from(v: UpSample2D) -> Self {
        Self::UpSample2D(v)
    }
}

impl From<PoolHead> for Stage {
    fn from(v: PoolHead) -> Self {
        Self::PoolHead(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuilding_a_stage_reproduces_variable_names() -> Result<()> {
        let init = StageInit::C2f(C2fInit::new(8, 16, 1));
        let lhs = nn::VarStore::new(Device::Cpu);
        let rhs = nn::VarStore::new(Device::Cpu);
        init.build(&lhs.root() / "stage_2")?;
        init.build(&rhs.root() / "stage_2")?;

        let lhs_vars = lhs.variables();
        let rhs_vars = rhs.variables();
        assert_eq!(lhs_vars.len(), rhs_vars.len());
        for (name, var) in &lhs_vars {
            assert_eq!(var.size(), rhs_vars[name].size());
        }
        Ok(())
    }

    #[test]
    fn upsample_stage_doubles_resolution() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let init = StageInit::UpSample2D { scale: 2.0 };
        let stage = init.build(vs.root())?;
        let xs = Tensor::rand(&[1, 4, 3, 5], (Kind::Float, Device::Cpu));
        assert_eq!(stage.forward_t(&xs, false).size(), vec![1, 4, 6, 10]);
        assert_eq!(init.out_channels(4), 4);
        assert_eq!(stage.as_ref(), "UpSample2D");
        Ok(())
    }
}
