//! Feeding batches of each epoch phase to the training worker.

use crate::common::*;

/// The pass a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Train,
    Validation,
    Test,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Validation => "validation",
            Self::Test => "test",
        }
    }
}

#[derive(Debug)]
pub enum DataMessage {
    Batch {
        phase: Phase,
        epoch: usize,
        batch: PairedBatch,
    },
    PhaseEnd {
        phase: Phase,
        epoch: usize,
    },
}

/// The loaders of the three dataset splits.
#[derive(Debug)]
pub struct Loaders {
    pub train: DataLoader,
    pub val: DataLoader,
    pub test: DataLoader,
}

/// Sends `epochs` rounds of training and validation batches followed by
/// one round of test batches.
pub async fn feeding_worker(
    loaders: Loaders,
    epochs: usize,
    data_tx: mpsc::Sender<DataMessage>,
) -> Result<()> {
    let send = |message| {
        let data_tx = data_tx.clone();
        async move {
            data_tx
                .send(message)
                .await
                .map_err(|_| format_err!("failed to send message to training worker"))
        }
    };

    let schedule = (0..epochs)
        .flat_map(|epoch| [(Phase::Train, epoch), (Phase::Validation, epoch)])
        .chain([(Phase::Test, epochs.saturating_sub(1))]);

    for (phase, epoch) in schedule {
        let loader = match phase {
            Phase::Train => &loaders.train,
            Phase::Validation => &loaders.val,
            Phase::Test => &loaders.test,
        };
        let mut stream = loader.stream();

        while let Some(batch) = stream
            .next()
            .instrument(trace_span!("recv_next_batch"))
            .await
        {
            let batch = batch.with_context(|| format!("failed to load a {} batch", phase.name()))?;
            send(DataMessage::Batch {
                phase,
                epoch,
                batch,
            })
            .await?;
        }

        send(DataMessage::PhaseEnd { phase, epoch }).await?;
    }

    Ok(())
}
