use crate::common::*;

/// Disjoint train, validation and test index lists covering `0..n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

/// Computes split sizes. Train and validation sizes are rounded down and the
/// test split takes the remainder.
pub fn partition_sizes(
    n: usize,
    train_fraction: f64,
    val_fraction: f64,
) -> Result<(usize, usize, usize)> {
    for (name, fraction) in [("train_fraction", train_fraction), ("val_fraction", val_fraction)] {
        if !(fraction.is_finite() && (0.0..=1.0).contains(&fraction)) {
            return Err(Error::config(format!(
                "{} must be in range [0, 1], but get {}",
                name, fraction
            )));
        }
    }
    if train_fraction + val_fraction > 1.0 {
        return Err(Error::config(format!(
            "train_fraction + val_fraction must not exceed 1, but get {}",
            train_fraction + val_fraction
        )));
    }

    let train_size = (train_fraction * n as f64).floor() as usize;
    let val_size = (val_fraction * n as f64).floor() as usize;
    let test_size = n - train_size - val_size;
    Ok((train_size, val_size, test_size))
}

/// Shuffles `0..n` once with the given seed and slices it into three splits.
pub fn partition(n: usize, train_fraction: f64, val_fraction: f64, seed: u64) -> Result<Partition> {
    let (train_size, val_size, _test_size) = partition_sizes(n, train_fraction, val_fraction)?;

    let mut indexes: Vec<usize> = (0..n).collect();
    indexes.shuffle(&mut StdRng::seed_from_u64(seed));

    let test = indexes.split_off(train_size + val_size);
    let val = indexes.split_off(train_size);
    let train = indexes;

    Ok(Partition { train, val, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sizes_round_down_and_test_takes_the_rest() -> anyhow::Result<()> {
        assert_eq!(partition_sizes(100, 0.7, 0.15)?, (70, 15, 15));
        assert_eq!(partition_sizes(97, 0.7, 0.15)?, (67, 14, 16));
        assert_eq!(partition_sizes(0, 0.7, 0.15)?, (0, 0, 0));
        assert_eq!(partition_sizes(10, 1.0, 0.0)?, (10, 0, 0));
        Ok(())
    }

    #[test]
    fn invalid_fractions_are_rejected() {
        assert!(matches!(
            partition_sizes(10, 0.8, 0.3),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            partition_sizes(10, -0.1, 0.3),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            partition_sizes(10, f64::NAN, 0.3),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn splits_are_disjoint_and_exhaustive() -> anyhow::Result<()> {
        let Partition { train, val, test } = partition(97, 0.7, 0.15, 42)?;
        assert_eq!((train.len(), val.len(), test.len()), (67, 14, 16));

        let all: HashSet<_> = train.iter().chain(&val).chain(&test).copied().collect();
        assert_eq!(all.len(), 97);
        assert!(all.iter().all(|&index| index < 97));
        Ok(())
    }

    #[test]
    fn same_seed_same_partition() -> anyhow::Result<()> {
        assert_eq!(partition(50, 0.6, 0.2, 3)?, partition(50, 0.6, 0.2, 3)?);
        assert_ne!(partition(50, 0.6, 0.2, 3)?, partition(50, 0.6, 0.2, 4)?);
        Ok(())
    }
}
