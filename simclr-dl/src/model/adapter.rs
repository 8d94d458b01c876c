//! Turns a pretrained staged network into a fixed-width feature extractor.

use super::backbone::{check_stage_range, pool_head_init, run_stages, stage_name, StagedNetwork};
use crate::common::*;
use tch_modules::{Stage, StageInit};

/// The batch size of dry runs. Two samples keep batch norm well defined.
const DRY_RUN_BATCH_SIZE: usize = 2;

/// The variable root of the adapted backbone in the training VarStore.
pub const BACKBONE_PREFIX: &str = "backbone";

const POOL_HEAD_NAME: &str = "pool_head";

/// Runs `stages` of `network` on a zero input of `input_shape` in eval mode
/// without gradient tracking, and reports the output shape.
pub fn infer_output_shape<N>(
    network: &N,
    stages: Range<usize>,
    input_shape: [usize; 4],
) -> Result<Shape>
where
    N: StagedNetwork + ?Sized,
{
    check_stage_range(&stages, network.num_stages())?;
    let input_shape: Vec<i64> = input_shape.iter().map(|&size| size as i64).collect();

    let output = tch::no_grad(|| -> Result<_> {
        let input = Tensor::f_zeros(&input_shape, (Kind::Float, network.device()))?;
        network.forward_stages(&input, stages.clone(), false)
    })?;

    let shape = Shape::from(output.size().as_slice());
    debug!("stages {:?} map {:?} to {}", stages, input_shape, shape);
    Ok(shape)
}

/// The truncated stages of a pretrained network followed by a pooling head.
///
/// Its output is `[batch, feature_dim, 1, 1]` regardless of the input resolution.
#[derive(Debug)]
pub struct AdaptedBackbone {
    inits: Vec<StageInit>,
    stages: Vec<Stage>,
    variables: HashMap<String, Tensor>,
    device: Device,
    input_channels: usize,
    feature_map_shape: Shape,
    output_shape: Shape,
    trainable: bool,
}

impl AdaptedBackbone {
    /// The shape of the feature map entering the pooling head, batch left unknown.
    pub fn feature_map_shape(&self) -> &Shape {
        &self.feature_map_shape
    }

    /// The flattened output shape `[_, feature_dim]`.
    pub fn output_shape(&self) -> &Shape {
        &self.output_shape
    }

    pub fn feature_dim(&self) -> usize {
        self.output_shape
            .dims()
            .last()
            .and_then(|dim| dim.size())
            .unwrap_or(0)
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    /// Runs all stages and flattens the pooled output to `[batch, feature_dim]`.
    pub fn f_forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let output = run_stages(&self.stages, xs, 0..self.stages.len(), train)?;
        Ok(output.f_flatten(1, -1)?)
    }
}

impl StagedNetwork for AdaptedBackbone {
    fn num_stages(&self) -> usize {
        self.stages.len()
    }

    fn device(&self) -> Device {
        self.device
    }

    fn stage_inits(&self) -> &[StageInit] {
        &self.inits
    }

    fn forward_stages(&self, xs: &Tensor, stages: Range<usize>, train: bool) -> Result<Tensor> {
        run_stages(&self.stages, xs, stages, train)
    }

    fn variables(&self) -> HashMap<String, Tensor> {
        self.variables
            .iter()
            .map(|(name, var)| (name.clone(), var.shallow_clone()))
            .collect()
    }

    fn input_channels(&self) -> usize {
        self.input_channels
    }
}

/// Truncates `pretrained` to its first `truncate_at_depth` stages and
/// replaces the last of them with a pooling head of `pool_output_channels`.
///
/// The adapted network is created in `vs` under [BACKBONE_PREFIX] with the
/// pretrained weights copied over. `pretrained` itself is not modified.
/// Returns the adapted network and its flattened output width.
pub fn adapt<N>(
    pretrained: &N,
    vs: &nn::VarStore,
    truncate_at_depth: usize,
    target_resolution: usize,
    pool_output_channels: usize,
    trainable: bool,
) -> Result<(AdaptedBackbone, usize)>
where
    N: StagedNetwork + ?Sized,
{
    let num_stages = pretrained.num_stages();
    if !(1..=num_stages).contains(&truncate_at_depth) {
        return Err(Error::config(format!(
            "truncate_at_depth must be in range [1, {}], but get {}",
            num_stages, truncate_at_depth
        )));
    }
    if target_resolution == 0 {
        return Err(Error::config("target_resolution must be positive"));
    }
    if pool_output_channels == 0 {
        return Err(Error::config("pool_output_channels must be positive"));
    }

    // measure the feature map entering the replaced stage
    let input_channels = pretrained.input_channels();
    let kept = 0..(truncate_at_depth - 1);
    let feature_map_shape = infer_output_shape(
        pretrained,
        kept.clone(),
        [
            DRY_RUN_BATCH_SIZE,
            input_channels,
            target_resolution,
            target_resolution,
        ],
    )?;
    let in_c = match feature_map_shape.size4() {
        Some([_b, Dim::Size(c), Dim::Size(h), Dim::Size(w)]) if c > 0 && h > 0 && w > 0 => c,
        _ => {
            return Err(Error::runtime_shape(format!(
                "expect a non-empty [B, C, H, W] feature map after {} stages, but get {}",
                kept.end, feature_map_shape
            )))
        }
    };

    // build retained stages and the head in the training store
    let root = &vs.root() / BACKBONE_PREFIX;
    let mut inits: Vec<StageInit> = pretrained.stage_inits()[kept.clone()].to_vec();
    let mut stages = pretrained.build_stages(&root, kept)?;
    let head_init = pool_head_init(in_c, pool_output_channels);
    stages.push(head_init.build(&root / POOL_HEAD_NAME).or_config()?);
    inits.push(head_init);

    let variables = backbone_variables(vs);
    copy_pretrained_weights(pretrained, &variables)?;
    set_trainable(&variables, trainable);

    let mut adapted = AdaptedBackbone {
        inits,
        stages,
        variables,
        device: vs.device(),
        input_channels,
        feature_map_shape: feature_map_shape.without_batch(),
        output_shape: Shape::from([Dim::Infer, Dim::Infer]),
        trainable,
    };

    // check the adapted network end to end
    let output_shape = infer_output_shape(
        &adapted,
        0..adapted.num_stages(),
        [
            DRY_RUN_BATCH_SIZE,
            input_channels,
            target_resolution,
            target_resolution,
        ],
    )?;
    let flat_shape = output_shape.flatten_from(1).ok_or_else(|| {
        Error::runtime_shape(format!("cannot flatten output shape {}", output_shape))
    })?;
    let expect = Shape::from([Dim::Infer, Dim::Size(pool_output_channels)]);
    if !flat_shape.is_compatible_with(&expect) {
        return Err(Error::runtime_shape(format!(
            "expect adapted output {}, but get {}",
            expect, flat_shape
        )));
    }
    adapted.output_shape = flat_shape.without_batch();

    let feature_dim = adapted.feature_dim();
    info!(
        "adapted {} of {} stages, feature map {} pooled to {} features",
        truncate_at_depth - 1,
        num_stages,
        adapted.feature_map_shape,
        feature_dim
    );

    Ok((adapted, feature_dim))
}

/// Variables under the backbone root keyed by their name below it.
fn backbone_variables(vs: &nn::VarStore) -> HashMap<String, Tensor> {
    let prefix = format!("{}.", BACKBONE_PREFIX);
    vs.variables()
        .into_iter()
        .filter_map(|(name, var)| {
            let name = name.strip_prefix(&prefix)?.to_owned();
            Some((name, var))
        })
        .collect()
}

fn copy_pretrained_weights<N>(pretrained: &N, targets: &HashMap<String, Tensor>) -> Result<()>
where
    N: StagedNetwork + ?Sized,
{
    let sources = pretrained.variables();
    let head_prefix = format!("{}.", POOL_HEAD_NAME);
    let mut num_copied = 0;

    tch::no_grad(|| -> Result<()> {
        for (name, target) in targets {
            if name.starts_with(&head_prefix) {
                continue;
            }
            let source = sources.get(name).ok_or_else(|| {
                Error::runtime_shape(format!("pretrained network has no variable '{}'", name))
            })?;
            if source.size() != target.size() {
                return Err(Error::runtime_shape(format!(
                    "variable '{}' has shape {:?} in the pretrained network but {:?} in the adapted one",
                    name,
                    source.size(),
                    target.size()
                )));
            }
            target.shallow_clone().f_copy_(source)?;
            num_copied += 1;
        }
        Ok(())
    })?;

    debug!("copied {} pretrained variables", num_copied);
    Ok(())
}

/// Toggles gradients of the parameters in `variables`.
///
/// Must run on freshly built variables: buffers such as batch norm running
/// statistics are recognized by starting without gradients and stay that way.
fn set_trainable(variables: &HashMap<String, Tensor>, trainable: bool) {
    let parameters = variables
        .iter()
        .filter(|(_, var)| var.requires_grad())
        .sorted_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs))
        .collect_vec();

    for (name, var) in &parameters {
        let _ = var.set_requires_grad(trainable);
        debug!("{}: requires_grad = {}", name, trainable);
    }
    debug!(
        "{} of {} backbone variables are parameters",
        parameters.len(),
        variables.len()
    );
}
