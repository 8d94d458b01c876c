use crate::{
    common::*,
    conv_bn_2d::{ConvBn2D, ConvBn2DInit},
};

#[derive(Debug, Clone)]
pub struct BottleneckInit {
    pub in_c: usize,
    pub out_c: usize,
    pub shortcut: bool,
    pub expansion: f64,
    pub activation: Activation,
}

impl BottleneckInit {
    pub fn build<'p, P>(self, path: P) -> Bottleneck
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self {
            in_c,
            out_c,
            shortcut,
            expansion,
            activation,
        } = self;
        let mid_c = (out_c as f64 * expansion) as usize;
        let conv = |in_c, out_c| ConvBn2DInit {
            activation,
            ..ConvBn2DInit::new(in_c, out_c, 3)
        };

        Bottleneck {
            cv1: conv(in_c, mid_c).build(path / "cv1"),
            cv2: conv(mid_c, out_c).build(path / "cv2"),
            add: shortcut && in_c == out_c,
        }
    }
}

/// Two 3x3 convolutions with an optional residual connection.
#[derive(Debug)]
pub struct Bottleneck {
    cv1: ConvBn2D,
    cv2: ConvBn2D,
    add: bool,
}

impl nn::ModuleT for Bottleneck {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let ys = self
            .cv2
            .forward_t(&self.cv1.forward_t(xs, train), train);
        if self.add {
            xs + ys
        } else {
            ys
        }
    }
}

#[derive(Debug, Clone)]
pub struct C2fInit {
    pub in_c: usize,
    pub out_c: usize,
    pub repeats: usize,
    pub shortcut: bool,
    pub expansion: f64,
    pub activation: Activation,
}

impl C2fInit {
    pub fn new(in_c: usize, out_c: usize, repeats: usize) -> Self {
        Self {
            in_c,
            out_c,
            repeats,
            shortcut: true,
            expansion: 0.5,
            activation: Activation::Silu,
        }
    }

    pub fn build<'p, P>(self, path: P) -> C2f
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self {
            in_c,
            out_c,
            repeats,
            shortcut,
            expansion,
            activation,
        } = self;
        let hidden_c = (out_c as f64 * expansion) as usize;
        let conv = |in_c, out_c| ConvBn2DInit {
            activation,
            ..ConvBn2DInit::new(in_c, out_c, 1)
        };

        let cv1 = conv(in_c, 2 * hidden_c).build(path / "cv1");
        let cv2 = conv((2 + repeats) * hidden_c, out_c).build(path / "cv2");
        let blocks = (0..repeats)
            .map(|index| {
                BottleneckInit {
                    in_c: hidden_c,
                    out_c: hidden_c,
                    shortcut,
                    expansion: 1.0,
                    activation,
                }
                .build(&(path / "m") / index)
            })
            .collect();

        C2f { cv1, cv2, blocks }
    }
}

/// The cross-stage partial block with two convolutions used by YOLOv8.
#[derive(Debug)]
pub struct C2f {
    cv1: ConvBn2D,
    cv2: ConvBn2D,
    blocks: Vec<Bottleneck>,
}

impl nn::ModuleT for C2f {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let mut chunks = self.cv1.forward_t(xs, train).chunk(2, 1);
        for block in &self.blocks {
            let last = block.forward_t(chunks.last().unwrap(), train);
            chunks.push(last);
        }
        self.cv2.forward_t(&Tensor::cat(chunks.as_slice(), 1), train)
    }
}
