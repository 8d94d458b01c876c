use crate::common::*;

pub const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";

/// Save parameters to a checkpoint file named after the time, epoch and loss.
pub fn save_checkpoint(
    vs: &nn::VarStore,
    checkpoint_dir: &Path,
    epoch: usize,
    loss: f64,
) -> Result<PathBuf> {
    let filename = format!(
        "{}_{:04}_{:08.5}.ckpt",
        Local::now().format(FILE_STRFTIME),
        epoch,
        loss
    );
    let path = checkpoint_dir.join(filename);
    vs.save(&path)
        .with_context(|| format!("failed to save checkpoint '{}'", path.display()))?;
    Ok(path)
}

/// Load parameters from a checkpoint file if one is given.
pub fn try_load_checkpoint(vs: &mut nn::VarStore, file: Option<&Path>) -> Result<()> {
    let file = match file {
        Some(file) => file,
        None => {
            info!("checkpoint loading is disabled");
            return Ok(());
        }
    };
    ensure!(file.is_file(), "{} is not a file", file.display());

    info!("load checkpoint file {}", file.display());
    let missing = vs.load_partial(file)?;
    if !missing.is_empty() {
        warn!(
            "{} variables are missing in the checkpoint: {}",
            missing.len(),
            missing.iter().join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = nn::VarStore::new(Device::Cpu);
        let weight = source.root().randn_standard("weight", &[4, 2]);
        let path = save_checkpoint(&source, dir.path(), 3, 1.25)?;
        assert!(path.file_name().unwrap().to_str().unwrap().contains("_0003_"));

        let mut target = nn::VarStore::new(Device::Cpu);
        let restored = target.root().zeros("weight", &[4, 2]);
        try_load_checkpoint(&mut target, Some(&path))?;
        assert!(restored.equal(&weight));

        assert!(try_load_checkpoint(&mut target, Some(&dir.path().join("none.ckpt"))).is_err());
        try_load_checkpoint(&mut target, None)?;
        Ok(())
    }
}
