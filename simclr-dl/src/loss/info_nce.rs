use crate::common::*;

const NORM_EPS: f64 = 1e-12;

/// Explicit negative samples for [InfoNceLoss::forward_with_negatives].
#[derive(Debug, Clone, Copy)]
pub enum Negatives<'a> {
    /// A `[M, D]` set of negatives shared by every anchor.
    Unpaired(&'a Tensor),
    /// A `[N, M, D]` tensor of negatives, one set per anchor.
    Paired(&'a Tensor),
}

/// The InfoNCE contrastive loss on cosine similarities.
///
/// With in-batch negatives, the positive of row `i` in `anchors` is row `i`
/// in `positives` and every other row of `positives` is a negative.
#[derive(Debug, Clone)]
pub struct InfoNceLoss {
    temperature: f64,
    reduction: Reduction,
}

impl InfoNceLoss {
    pub fn new(temperature: f64, reduction: Reduction) -> Result<Self> {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(Error::config(format!(
                "temperature must be positive, but get {}",
                temperature
            )));
        }
        if let Reduction::Other(_) = reduction {
            return Err(Error::config("unsupported reduction"));
        }

        Ok(Self {
            temperature,
            reduction,
        })
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    /// Computes the loss of `[N, D]` anchors against `[N, D]` positives,
    /// using the other positives in the batch as negatives.
    pub fn forward(&self, anchors: &Tensor, positives: &Tensor) -> Result<Tensor> {
        let (num_samples, _dim) = check_pair_shape(anchors, positives)?;
        if num_samples == 0 {
            return Ok(self.empty_loss(anchors.device()));
        }

        let anchors = normalize(anchors);
        let positives = normalize(positives);
        let logits = anchors.matmul(&positives.tr()) / self.temperature;
        let targets = Tensor::arange(num_samples, (Kind::Int64, logits.device()));

        Ok(self.reduce(cross_entropy(&logits, &targets)))
    }

    /// Computes the loss with explicitly given negatives. The positive logit
    /// takes index 0 in each row of the logits.
    pub fn forward_with_negatives(
        &self,
        anchors: &Tensor,
        positives: &Tensor,
        negatives: Negatives<'_>,
    ) -> Result<Tensor> {
        let (num_samples, dim) = check_pair_shape(anchors, positives)?;

        let negatives = match negatives {
            Negatives::Unpaired(negatives) => match *negatives.size().as_slice() {
                [_m, neg_dim] if neg_dim == dim => Negatives::Unpaired(negatives),
                _ => {
                    return Err(Error::shape(format!(
                        "unpaired negatives must have shape [M, {}], but get {:?}",
                        dim,
                        negatives.size()
                    )))
                }
            },
            Negatives::Paired(negatives) => match *negatives.size().as_slice() {
                [n, _m, neg_dim] if n == num_samples && neg_dim == dim => {
                    Negatives::Paired(negatives)
                }
                _ => {
                    return Err(Error::shape(format!(
                        "paired negatives must have shape [{}, M, {}], but get {:?}",
                        num_samples,
                        dim,
                        negatives.size()
                    )))
                }
            },
        };
        if num_samples == 0 {
            return Ok(self.empty_loss(anchors.device()));
        }

        let anchors = normalize(anchors);
        let positives = normalize(positives);

        let positive_logits = (&anchors * &positives).sum_dim_intlist(&[1], true, Kind::Float);
        let negative_logits = match negatives {
            Negatives::Unpaired(negatives) => anchors.matmul(&normalize(negatives).tr()),
            Negatives::Paired(negatives) => anchors
                .unsqueeze(1)
                .matmul(&normalize(negatives).transpose(-2, -1))
                .squeeze_dim(1),
        };

        let logits = Tensor::cat(&[positive_logits, negative_logits], 1) / self.temperature;
        let targets = Tensor::zeros(&[num_samples], (Kind::Int64, logits.device()));

        Ok(self.reduce(cross_entropy(&logits, &targets)))
    }

    fn reduce(&self, losses: Tensor) -> Tensor {
        match self.reduction {
            Reduction::None => losses,
            Reduction::Sum => losses.sum(Kind::Float),
            Reduction::Mean => losses.mean(Kind::Float),
            Reduction::Other(_) => unreachable!("rejected in InfoNceLoss::new()"),
        }
    }

    fn empty_loss(&self, device: Device) -> Tensor {
        match self.reduction {
            Reduction::None => Tensor::zeros(&[0], (Kind::Float, device)),
            _ => Tensor::zeros(&[], (Kind::Float, device)),
        }
    }
}

fn check_pair_shape(anchors: &Tensor, positives: &Tensor) -> Result<(i64, i64)> {
    match (anchors.size().as_slice(), positives.size().as_slice()) {
        (&[n1, d1], &[n2, d2]) if n1 == n2 && d1 == d2 => Ok((n1, d1)),
        (lhs, rhs) => Err(Error::shape(format!(
            "anchors and positives must both be [N, D] with equal shapes, but get {:?} and {:?}",
            lhs, rhs
        ))),
    }
}

/// Scales the last dimension to unit L2 norm.
fn normalize(xs: &Tensor) -> Tensor {
    let last = xs.dim() as i64 - 1;
    let norm = xs
        .square()
        .sum_dim_intlist(&[last], true, Kind::Float)
        .sqrt()
        .clamp_min(NORM_EPS);
    xs / norm
}

/// Per-row cross entropy for sparse targets with the row maximum subtracted first.
fn cross_entropy(logits: &Tensor, targets: &Tensor) -> Tensor {
    let (max, _argmax) = logits.max_dim(1, true);
    let shifted = logits - max.detach();
    let target_logits = shifted.gather(1, &targets.unsqueeze(1), false).squeeze_dim(1);
    shifted.logsumexp(&[1], false) - target_logits
}
