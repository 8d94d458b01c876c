//! The training worker running forward, backward and evaluation passes.

use crate::{
    common::*,
    data::{DataMessage, Phase},
    utils::{self, RateCounter},
};

/// The model and optimization state owned by the training worker.
pub struct WorkerContext {
    pub vs: nn::VarStore,
    pub model: ContrastiveModel,
    pub loss_fn: InfoNceLoss,
    pub optimizer: nn::Optimizer,
}

/// Mean loss over the batches of one pass.
#[derive(Debug, Default)]
struct LossMeter {
    total: f64,
    count: usize,
}

impl LossMeter {
    fn add(&mut self, loss: f64, batch_size: usize) {
        self.total += loss * batch_size as f64;
        self.count += batch_size;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }

    fn reset(&mut self) -> Option<f64> {
        let mean = self.mean();
        *self = Self::default();
        mean
    }
}

/// Consumes batches until the channel closes. Runs on a blocking thread.
pub fn training_worker(
    config: Arc<Config>,
    checkpoint_dir: Arc<PathBuf>,
    mut context: WorkerContext,
    mut data_rx: mpsc::Receiver<DataMessage>,
) -> Result<()> {
    let device = config.training.device;
    let batch_size = config.loader.batch_size.get();
    let save_checkpoint_epochs = config
        .training
        .save_checkpoint_epochs
        .map(|epochs| epochs.get());

    utils::try_load_checkpoint(&mut context.vs, config.training.load_checkpoint.as_deref())?;

    let WorkerContext {
        vs,
        model,
        loss_fn,
        mut optimizer,
    } = context;

    info!("start training");
    let mut training_step = 0;
    let mut rate_counter = RateCounter::with_second_interval();
    let mut meter = LossMeter::default();

    while let Some(message) = data_rx.blocking_recv() {
        match message {
            DataMessage::Batch {
                phase,
                epoch,
                batch,
            } => {
                let anchors = batch.anchors.to_device(device);
                let positives = batch.positives.to_device(device);

                match phase {
                    Phase::Train => {
                        if batch.len() < 2 {
                            warn!(
                                "skip a training batch of {} sample in epoch {}",
                                batch.len(),
                                epoch
                            );
                            continue;
                        }

                        let embeddings_a = model.forward_t(&anchors, true)?;
                        let embeddings_p = model.forward_t(&positives, true)?;
                        let loss = loss_fn.forward(&embeddings_a, &embeddings_p)?;
                        optimizer.backward_step(&loss);

                        let loss = f64::from(&loss);
                        meter.add(loss, batch.len());
                        training_step += 1;

                        rate_counter.add(1.0);
                        if let Some(batch_rate) = rate_counter.rate() {
                            let record_rate = batch_rate * batch_size as f64;
                            info!(
                                "epoch: {}\tstep: {}\tloss: {:.5}\t{:.2} batches/s\t{:.2} records/s",
                                epoch, training_step, loss, batch_rate, record_rate
                            );
                        } else {
                            debug!(
                                "epoch: {}\tstep: {}\tloss: {:.5}",
                                epoch, training_step, loss
                            );
                        }
                    }
                    Phase::Validation | Phase::Test => {
                        let loss = tch::no_grad(|| -> Result<_> {
                            let embeddings_a = model.forward_t(&anchors, false)?;
                            let embeddings_p = model.forward_t(&positives, false)?;
                            Ok(loss_fn.forward(&embeddings_a, &embeddings_p)?)
                        })?;
                        meter.add(f64::from(&loss), batch.len());
                    }
                }
            }
            DataMessage::PhaseEnd { phase, epoch } => {
                let mean_loss = meter.reset();
                match mean_loss {
                    Some(mean_loss) => {
                        info!("epoch: {}\t{} loss: {:.5}", epoch, phase.name(), mean_loss)
                    }
                    None => warn!("epoch: {}\tno {} batches", epoch, phase.name()),
                }

                let save = phase == Phase::Validation
                    && matches!(save_checkpoint_epochs, Some(epochs) if (epoch + 1) % epochs == 0);
                if save {
                    let path = utils::save_checkpoint(
                        &vs,
                        &checkpoint_dir,
                        epoch,
                        mean_loss.unwrap_or(f64::NAN),
                    )?;
                    info!("saved checkpoint {}", path.display());
                }
            }
        }
    }

    info!("training finished after {} steps", training_step);
    Ok(())
}
