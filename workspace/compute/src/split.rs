use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{PredictionError, Result};

/// Shuffle and split into `(train, test)`.
///
/// The test split gets `ceil(len * test_fraction)` rows and the training split
/// keeps the rest, which must be non-empty. Without a seed the shuffle differs
/// on every call.
pub fn train_test_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: Option<u64>,
) -> Result<(Dataset, Dataset)> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(PredictionError::DatasetLoad(format!(
            "test fraction must be in [0, 1), got {}",
            test_fraction
        )));
    }

    let n = dataset.len();
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test >= n {
        return Err(PredictionError::DatasetLoad(format!(
            "{} rows are too few to hold out {:.0}% for testing",
            n,
            test_fraction * 100.0
        )));
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    debug!("Split {} rows into {} train / {} test", n, train_idx.len(), test_idx.len());

    Ok((dataset.select(train_idx), dataset.select(test_idx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::load_csv;
    use crate::dataset::testing::write_iris_like_csv;
    use tempfile::TempDir;

    fn dataset(per_class: usize) -> (TempDir, Dataset) {
        let dir = TempDir::new().unwrap();
        let path = write_iris_like_csv(&dir, per_class);
        let dataset = load_csv(&path).unwrap();
        (dir, dataset)
    }

    #[test]
    fn test_eighty_twenty_sizes() {
        let (_dir, data) = dataset(50);
        let (train, test) = train_test_split(&data, 0.2, None).unwrap();
        assert_eq!(train.len(), 120);
        assert_eq!(test.len(), 30);
    }

    #[test]
    fn test_test_size_rounds_up() {
        let (_dir, data) = dataset(3);
        // 9 rows * 0.2 = 1.8 -> 2 test rows
        let (train, test) = train_test_split(&data, 0.2, Some(1)).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 7);
    }

    #[test]
    fn test_same_seed_same_split() {
        let (_dir, data) = dataset(10);
        let (a_train, _) = train_test_split(&data, 0.2, Some(42)).unwrap();
        let (b_train, _) = train_test_split(&data, 0.2, Some(42)).unwrap();
        assert_eq!(a_train.features, b_train.features);
        assert_eq!(a_train.labels, b_train.labels);
    }

    #[test]
    fn test_rejects_split_that_leaves_no_training_rows() {
        let (_dir, data) = dataset(1);
        let tiny = data.select(&[0]);
        let err = train_test_split(&tiny, 0.2, None).unwrap_err();
        assert!(matches!(err, PredictionError::DatasetLoad(_)));
    }

    #[test]
    fn test_rejects_invalid_fraction() {
        let (_dir, data) = dataset(2);
        assert!(train_test_split(&data, 1.0, None).is_err());
        assert!(train_test_split(&data, -0.1, None).is_err());
    }
}
