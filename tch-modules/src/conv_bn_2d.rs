use crate::common::*;

/// Batch norm settings matching the YOLOv8 defaults.
pub const BN_EPS: f64 = 1e-3;
pub const BN_MOMENTUM: f64 = 0.03;

#[derive(Debug, Clone)]
pub struct ConvBn2DInit {
    pub in_c: usize,
    pub out_c: usize,
    pub k: usize,
    pub s: usize,
    pub p: usize,
    pub d: usize,
    pub g: usize,
    pub bias: bool,
    pub activation: Activation,
    pub batch_norm: bool,
}

impl ConvBn2DInit {
    pub fn new(in_c: usize, out_c: usize, k: usize) -> Self {
        Self {
            in_c,
            out_c,
            k,
            s: 1,
            p: k / 2,
            d: 1,
            g: 1,
            bias: false,
            activation: Activation::Silu,
            batch_norm: true,
        }
    }

    pub fn build<'p, P>(self, path: P) -> ConvBn2D
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();

        let Self {
            in_c,
            out_c,
            k,
            s,
            p,
            d,
            g,
            bias,
            activation,
            batch_norm,
        } = self;

        let conv = nn::conv2d(
            path / "conv",
            in_c as i64,
            out_c as i64,
            k as i64,
            nn::ConvConfig {
                stride: s as i64,
                padding: p as i64,
                dilation: d as i64,
                groups: g as i64,
                bias,
                ..Default::default()
            },
        );
        let bn = batch_norm.then(|| {
            nn::batch_norm2d(
                path / "bn",
                out_c as i64,
                nn::BatchNormConfig {
                    eps: BN_EPS,
                    momentum: BN_MOMENTUM,
                    ..Default::default()
                },
            )
        });

        ConvBn2D {
            conv,
            bn,
            activation,
            out_c,
        }
    }
}

/// Convolution followed by optional batch norm and an activation.
#[derive(Debug)]
pub struct ConvBn2D {
    conv: nn::Conv2D,
    bn: Option<nn::BatchNorm>,
    activation: Activation,
    out_c: usize,
}

impl ConvBn2D {
    pub fn out_channels(&self) -> usize {
        self.out_c
    }
}

impl nn::ModuleT for ConvBn2D {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let Self {
            ref conv,
            ref bn,
            activation,
            ..
        } = *self;

        let xs = xs.apply(conv);
        let xs = match bn {
            Some(bn) => xs.apply_t(bn, train),
            None => xs,
        };
        xs.activation(activation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_conv_halves_resolution() {
        let vs = nn::VarStore::new(Device::Cpu);
        let conv = ConvBn2DInit {
            s: 2,
            ..ConvBn2DInit::new(3, 16, 3)
        }
        .build(&vs.root() / "conv");

        let xs = Tensor::rand(&[2, 3, 32, 24], (Kind::Float, Device::Cpu));
        let ys = conv.forward_t(&xs, true);
        assert_eq!(ys.size(), vec![2, 16, 16, 12]);
        assert_eq!(conv.out_channels(), 16);
    }

    #[test]
    fn conv_without_bn_has_no_bn_vars() {
        let vs = nn::VarStore::new(Device::Cpu);
        let _conv = ConvBn2DInit {
            batch_norm: false,
            bias: true,
            ..ConvBn2DInit::new(3, 4, 1)
        }
        .build(&vs.root() / "conv");

        let names: Vec<_> = vs.variables().into_keys().sorted().collect();
        assert_eq!(names, vec!["conv.conv.bias", "conv.conv.weight"]);
    }
}
