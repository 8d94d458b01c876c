use crate::Activation;
use tch::{nn, Tensor};

impl nn::Module for Activation {
    fn forward(&self, xs: &Tensor) -> Tensor {
        use Activation::*;

        match *self {
            Silu => silu(xs),
            Mish => xs.mish(),
            Relu => xs.relu(),
            LRelu => lrelu(xs),
            Logistic => xs.sigmoid(),
            Linear => xs.shallow_clone(),
        }
    }
}

pub fn silu(tensor: &Tensor) -> Tensor {
    tensor * tensor.sigmoid()
}

pub fn lrelu(tensor: &Tensor) -> Tensor {
    tensor.maximum(&(tensor * 0.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::Module as _, Device, Kind};

    #[test]
    fn silu_matches_definition() {
        let xs = Tensor::of_slice(&[-2.0f32, -0.5, 0.0, 0.5, 2.0]);
        let expect = &xs / (xs.neg().exp() + 1.0);
        let diff = f64::from(&(Activation::Silu.forward(&xs) - expect).abs().max());
        assert!(diff < 1e-6);
    }

    #[test]
    fn linear_is_identity() {
        let xs = Tensor::randn(&[2, 3], (Kind::Float, Device::Cpu));
        let ys = Activation::Linear.forward(&xs);
        assert!(bool::from(ys.eq_tensor(&xs).all()));
    }
}
