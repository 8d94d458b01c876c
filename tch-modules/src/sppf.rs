use crate::{
    common::*,
    conv_bn_2d::{ConvBn2D, ConvBn2DInit},
};

#[derive(Debug, Clone)]
pub struct SppfInit {
    pub in_c: usize,
    pub out_c: usize,
    pub k: usize,
    pub activation: Activation,
}

impl SppfInit {
    pub fn build<'p, P>(self, path: P) -> Sppf
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self {
            in_c,
            out_c,
            k,
            activation,
        } = self;
        let mid_c = in_c / 2;
        let conv = |in_c, out_c| ConvBn2DInit {
            activation,
            ..ConvBn2DInit::new(in_c, out_c, 1)
        };

        Sppf {
            cv1: conv(in_c, mid_c).build(path / "cv1"),
            cv2: conv(mid_c * 4, out_c).build(path / "cv2"),
            k: k as i64,
        }
    }
}

/// Spatial pyramid pooling computed by three chained max pools.
#[derive(Debug)]
pub struct Sppf {
    cv1: ConvBn2D,
    cv2: ConvBn2D,
    k: i64,
}

impl nn::ModuleT for Sppf {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let k = self.k;
        let pool = |xs: &Tensor| xs.max_pool2d(&[k, k], &[1, 1], &[k / 2, k / 2], &[1, 1], false);

        let x0 = self.cv1.forward_t(xs, train);
        let x1 = pool(&x0);
        let x2 = pool(&x1);
        let x3 = pool(&x2);
        self.cv2.forward_t(&Tensor::cat(&[x0, x1, x2, x3], 1), train)
    }
}
