use crate::common::*;
use tch_modules::{ConvBn2DInit, C2fInit, PoolHeadInit, SppfInit, Stage, StageInit};

/// A network made of an ordered sequence of stages that can be run and
/// rebuilt piecewise.
pub trait StagedNetwork {
    fn num_stages(&self) -> usize;

    fn device(&self) -> Device;

    /// The recipes of all stages, in order.
    fn stage_inits(&self) -> &[StageInit];

    /// Runs the stages in `stages` one after another on `xs`.
    fn forward_stages(&self, xs: &Tensor, stages: Range<usize>, train: bool) -> Result<Tensor>;

    /// All variables keyed by name relative to the network root.
    fn variables(&self) -> HashMap<String, Tensor>;

    /// The number of channels of the network input.
    fn input_channels(&self) -> usize;

    /// Builds fresh, untrained copies of the given stages under `path`.
    ///
    /// The copies take the same variable names relative to `path` as the
    /// originals have relative to the network root.
    fn build_stages(&self, path: &nn::Path, stages: Range<usize>) -> Result<Vec<Stage>> {
        check_stage_range(&stages, self.num_stages())?;
        stages
            .map(|index| {
                self.stage_inits()[index]
                    .build(path / stage_name(index))
                    .or_config()
            })
            .collect()
    }
}

pub(crate) fn stage_name(index: usize) -> String {
    format!("stage_{}", index)
}

pub(crate) fn check_stage_range(stages: &Range<usize>, num_stages: usize) -> Result<()> {
    if stages.start > stages.end || stages.end > num_stages {
        return Err(Error::config(format!(
            "stage range {:?} is out of bounds for a network of {} stages",
            stages, num_stages
        )));
    }
    Ok(())
}

pub(crate) fn run_stages(
    stages: &[Stage],
    xs: &Tensor,
    range: Range<usize>,
    train: bool,
) -> Result<Tensor> {
    check_stage_range(&range, stages.len())?;
    let output = stages[range]
        .iter()
        .fold(xs.shallow_clone(), |xs, stage| stage.forward_t(&xs, train));
    Ok(output)
}

/// Depth and width multiples of a YOLOv8 model variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloScale {
    pub depth_multiple: f64,
    pub width_multiple: f64,
}

impl YoloScale {
    pub const NANO: Self = Self {
        depth_multiple: 0.33,
        width_multiple: 0.25,
    };

    const MAX_CHANNELS: usize = 1024;
    const CHANNEL_DIVISOR: usize = 8;

    fn channels(&self, channels: usize) -> usize {
        let scaled = channels.min(Self::MAX_CHANNELS) as f64 * self.width_multiple;
        (scaled / Self::CHANNEL_DIVISOR as f64).ceil() as usize * Self::CHANNEL_DIVISOR
    }

    fn repeats(&self, repeats: usize) -> usize {
        if repeats > 1 {
            ((repeats as f64 * self.depth_multiple).round() as usize).max(1)
        } else {
            repeats
        }
    }
}

impl Default for YoloScale {
    fn default() -> Self {
        Self::NANO
    }
}

/// The YOLOv8 backbone followed by the first upsampling layer of the
/// detection head, eleven stages in total.
///
/// The network owns its own variable store, so adapting it never changes it.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct YoloBackbone {
    #[derivative(Debug = "ignore")]
    vs: nn::VarStore,
    inits: Vec<StageInit>,
    stages: Vec<Stage>,
}

impl YoloBackbone {
    pub const INPUT_CHANNELS: usize = 3;

    /// Builds a randomly initialized backbone whose convolutions use `activation`.
    pub fn new(device: Device, scale: YoloScale, activation: Activation) -> Result<Self> {
        let YoloScale {
            depth_multiple,
            width_multiple,
        } = scale;
        if !(depth_multiple > 0.0 && depth_multiple.is_finite()) {
            return Err(Error::config("depth_multiple must be positive"));
        }
        if !(width_multiple > 0.0 && width_multiple.is_finite()) {
            return Err(Error::config("width_multiple must be positive"));
        }

        let inits = Self::stage_recipes(&scale, activation);
        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let stages: Vec<Stage> = inits
            .iter()
            .enumerate()
            .map(|(index, init)| init.build(&root / stage_name(index)).or_config())
            .collect::<Result<_>>()?;

        debug!(
            "built YOLO backbone with {} stages, {} variables and {:?} activation",
            stages.len(),
            vs.variables().len(),
            activation
        );

        Ok(Self { vs, inits, stages })
    }

    /// Restores weights saved from a VarStore with `stage_{index}` roots.
    pub fn load<P>(&mut self, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        self.vs.load(path).map_err(|err| {
            Error::config(format!(
                "unable to load backbone weights '{}': {}",
                path.display(),
                err
            ))
        })?;
        info!("loaded backbone weights from '{}'", path.display());
        Ok(())
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// The number of channels entering stage `index`.
    pub fn stage_in_channels(&self, index: usize) -> Result<usize> {
        check_stage_range(&(0..index), self.inits.len())?;
        let channels = self.inits[..index]
            .iter()
            .fold(Self::INPUT_CHANNELS, |in_c, init| init.out_channels(in_c));
        Ok(channels)
    }

    fn stage_recipes(scale: &YoloScale, activation: Activation) -> Vec<StageInit> {
        let ch = |channels| scale.channels(channels);
        let n = |repeats| scale.repeats(repeats);
        let conv = |in_c, out_c| {
            StageInit::ConvBn2D(ConvBn2DInit {
                s: 2,
                activation,
                ..ConvBn2DInit::new(in_c, out_c, 3)
            })
        };
        let c2f = |channels, repeats| {
            StageInit::C2f(C2fInit {
                activation,
                ..C2fInit::new(channels, channels, repeats)
            })
        };

        vec![
            conv(Self::INPUT_CHANNELS, ch(64)),
            conv(ch(64), ch(128)),
            c2f(ch(128), n(3)),
            conv(ch(128), ch(256)),
            c2f(ch(256), n(6)),
            conv(ch(256), ch(512)),
            c2f(ch(512), n(6)),
            conv(ch(512), ch(1024)),
            c2f(ch(1024), n(3)),
            StageInit::Sppf(SppfInit {
                in_c: ch(1024),
                out_c: ch(1024),
                k: 5,
                activation,
            }),
            StageInit::UpSample2D { scale: 2.0 },
        ]
    }
}

impl StagedNetwork for YoloBackbone {
    fn num_stages(&self) -> usize {
        self.stages.len()
    }

    fn device(&self) -> Device {
        self.vs.device()
    }

    fn stage_inits(&self) -> &[StageInit] {
        &self.inits
    }

    fn forward_stages(&self, xs: &Tensor, stages: Range<usize>, train: bool) -> Result<Tensor> {
        run_stages(&self.stages, xs, stages, train)
    }

    fn variables(&self) -> HashMap<String, Tensor> {
        self.vs.variables()
    }

    fn input_channels(&self) -> usize {
        Self::INPUT_CHANNELS
    }
}

/// A head that can replace the last retained stage.
pub(crate) fn pool_head_init(in_c: usize, out_c: usize) -> StageInit {
    StageInit::PoolHead(PoolHeadInit { in_c, out_c })
}
