use crate::{
    common::*,
    conv_bn_2d::{ConvBn2D, ConvBn2DInit},
};

#[derive(Debug, Clone)]
pub struct PoolHeadInit {
    pub in_c: usize,
    pub out_c: usize,
}

impl PoolHeadInit {
    pub fn build<'p, P>(self, path: P) -> Result<PoolHead>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let Self { in_c, out_c } = self;
        ensure!(in_c > 0, "in_c must be positive");
        ensure!(out_c > 0, "out_c must be positive");

        let conv = ConvBn2DInit::new(in_c, out_c, 1).build(path.borrow() / "conv");
        Ok(PoolHead { conv })
    }
}

/// Projects feature map channels with a 1x1 convolution and pools to 1x1.
///
/// The output is `[batch, out_c, 1, 1]` for any input resolution.
#[derive(Debug)]
pub struct PoolHead {
    conv: ConvBn2D,
}

impl PoolHead {
    pub fn out_channels(&self) -> usize {
        self.conv.out_channels()
    }
}

impl nn::ModuleT for PoolHead {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.conv
            .forward_t(xs, train)
            .adaptive_avg_pool2d(&[1, 1])
    }
}
