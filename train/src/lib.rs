//! The training program for the simclr-dl project.

pub mod common;
pub mod data;
pub mod train;
pub mod utils;

use crate::{common::*, data::Loaders, train::WorkerContext};

/// The entry of training program.
pub async fn start(config: Arc<Config>) -> Result<()> {
    let start_time = Local::now();
    let logging_dir: Arc<PathBuf> = Arc::new(
        config
            .training
            .logging_dir
            .join(format!("{}", start_time.format(utils::FILE_STRFTIME))),
    );
    let checkpoint_dir = Arc::new(logging_dir.join("checkpoints"));

    // create dirs and save config
    {
        tokio::fs::create_dir_all(&*logging_dir).await?;
        tokio::fs::create_dir_all(&*checkpoint_dir).await?;
        let path = logging_dir.join("config.json5");
        let text = serde_json::to_string_pretty(&*config)?;
        tokio::fs::write(&path, text).await?;
    }

    // assemble dataset, model and optimizer
    info!("building training bundle");
    let TrainingBundle {
        train_loader,
        val_loader,
        test_loader,
        model,
        loss_fn,
        optimizer,
        vs,
        partition: _,
    } = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || simclr_dl::build_bundle(&config)).await??
    };
    info!(
        "{} trainable variables, {} train batches per epoch",
        vs.trainable_variables().len(),
        train_loader.num_batches()
    );

    let (data_tx, data_rx) = mpsc::channel(2);

    // feeding worker
    let feeding_future = {
        let loaders = Loaders {
            train: train_loader,
            val: val_loader,
            test: test_loader,
        };
        let epochs = config.training.epochs.get();
        tokio::task::spawn(
            data::feeding_worker(loaders, epochs, data_tx).instrument(info_span!("feeding")),
        )
        .map(|result| Fallible::Ok(result??))
    };

    // training worker
    let training_future = {
        let config = config.clone();
        let checkpoint_dir = checkpoint_dir.clone();
        let context = WorkerContext {
            vs,
            model,
            loss_fn,
            optimizer,
        };
        tokio::task::spawn_blocking(move || {
            train::training_worker(config, checkpoint_dir, context, data_rx)
        })
        .map(|result| Fallible::Ok(result??))
    };

    futures::try_join!(feeding_future, training_future)?;
    info!("training finished, logs are saved in {}", logging_dir.display());

    Ok(())
}
