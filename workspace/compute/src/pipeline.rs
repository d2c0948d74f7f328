//! End-to-end prediction for the two request shapes: four flower
//! measurements, or a flower photo.

use std::path::{Path, PathBuf};

use model::Species;
use ndarray::Array2;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::dataset::load_csv;
use crate::error::{PredictionError, Result};
use crate::image_model::{CnnClassifier, ImageClassifier};
use crate::logistic::LogisticRegression;
use crate::preprocess::load_image_batch;
use crate::split::train_test_split;

/// Locations of the model artefacts and the training knobs for the numeric path.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Labelled CSV used to train the measurement classifier on every request.
    pub dataset_path: PathBuf,
    /// Pre-trained image network weights (`safetensors`).
    pub image_model_path: PathBuf,
    /// Share of the dataset held out from training.
    pub test_fraction: f64,
    /// Fixes the train/test shuffle; `None` reshuffles on every request.
    pub split_seed: Option<u64>,
    pub max_iter: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/iris.csv"),
            image_model_path: PathBuf::from("model/iris_image_model.safetensors"),
            test_fraction: 0.2,
            split_seed: None,
            max_iter: 200,
        }
    }
}

/// Result of training on the dataset and predicting one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPrediction {
    pub species: Species,
    pub train_size: usize,
    pub test_size: usize,
    /// Accuracy on the held-out split, `None` when nothing was held out.
    pub test_accuracy: Option<f64>,
}

/// Parse the four raw measurement strings.
pub fn parse_measurements(raw: [&str; 4]) -> Result<[f64; 4]> {
    let mut values = [0.0; 4];
    for (i, text) in raw.iter().enumerate() {
        let value: f64 = text.trim().parse().map_err(|_| {
            PredictionError::MalformedInput(format!(
                "could not convert string to float: '{}' (n{})",
                text,
                i + 1
            ))
        })?;
        if !value.is_finite() {
            return Err(PredictionError::MalformedInput(format!(
                "n{} must be a finite number, got {}",
                i + 1,
                text
            )));
        }
        values[i] = value;
    }
    Ok(values)
}

/// Load the dataset, split it, fit a fresh logistic regression and predict `measurements`.
#[instrument(skip(config), fields(dataset = %config.dataset_path.display()))]
pub fn predict_measurements(
    config: &PredictionConfig,
    measurements: &[f64],
) -> Result<MeasurementPrediction> {
    let dataset = load_csv(&config.dataset_path)?;
    if measurements.len() != dataset.n_features() {
        return Err(PredictionError::MalformedInput(format!(
            "X has {} features, but the dataset has {} feature columns",
            measurements.len(),
            dataset.n_features()
        )));
    }

    let (train, test) = train_test_split(&dataset, config.test_fraction, config.split_seed)?;
    let model = LogisticRegression::with_max_iter(config.max_iter)
        .fit(&train.features, &train.labels)?;

    let test_accuracy = if test.is_empty() {
        None
    } else {
        Some(model.score(&test.features, &test.labels)?)
    };
    debug!("Held-out accuracy: {:?}", test_accuracy);

    let sample = Array2::from_shape_vec((1, measurements.len()), measurements.to_vec())
        .map_err(|e| PredictionError::MalformedInput(e.to_string()))?;
    let species = model
        .predict(&sample)?
        .into_iter()
        .next()
        .ok_or_else(|| PredictionError::Inference("Model returned no prediction".to_string()))?;
    info!("Predicted {} from measurements", species.label());

    Ok(MeasurementPrediction {
        species,
        train_size: train.len(),
        test_size: test.len(),
        test_accuracy,
    })
}

/// Held-out quality of the measurement classifier under a given configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub train_size: usize,
    pub test_size: usize,
    pub iterations: usize,
    pub accuracy: f64,
}

/// Train once on the configured split and score the held-out rows.
#[instrument(skip(config), fields(dataset = %config.dataset_path.display()))]
pub fn evaluate_dataset(config: &PredictionConfig) -> Result<Evaluation> {
    let dataset = load_csv(&config.dataset_path)?;
    let (train, test) = train_test_split(&dataset, config.test_fraction, config.split_seed)?;
    if test.is_empty() {
        return Err(PredictionError::MalformedInput(
            "test_fraction leaves no rows to evaluate on".to_string(),
        ));
    }

    let model = LogisticRegression::with_max_iter(config.max_iter)
        .fit(&train.features, &train.labels)?;
    let accuracy = model.score(&test.features, &test.labels)?;
    info!(
        "Evaluated on {} held-out rows: accuracy {:.3}",
        test.len(),
        accuracy
    );

    Ok(Evaluation {
        train_size: train.len(),
        test_size: test.len(),
        iterations: model.iterations(),
        accuracy,
    })
}

/// Preprocess the stored image, load the image network from `model_path` and classify.
#[instrument]
pub fn classify_image_file(image_path: &Path, model_path: &Path) -> Result<Species> {
    let batch = load_image_batch(image_path)?;
    let classifier = CnnClassifier::load(model_path)?;
    let species = classifier.classify(&batch)?;
    info!("Predicted {} from image", species.label());
    Ok(species)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::testing::write_iris_like_csv;
    use crate::image_model::write_initialized_weights;
    use crate::preprocess::testing::two_tone_png;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> PredictionConfig {
        PredictionConfig {
            dataset_path: write_iris_like_csv(dir, 30),
            image_model_path: dir.path().join("model.safetensors"),
            split_seed: Some(7),
            ..PredictionConfig::default()
        }
    }

    #[test]
    fn test_parse_measurements() {
        assert_eq!(
            parse_measurements(["5.1", " 3.5", "1.4 ", "0.2"]).unwrap(),
            [5.1, 3.5, 1.4, 0.2]
        );
        assert!(matches!(
            parse_measurements(["5.1", "abc", "1.4", "0.2"]),
            Err(PredictionError::MalformedInput(_))
        ));
        assert!(matches!(
            parse_measurements(["NaN", "1", "1", "1"]),
            Err(PredictionError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_predict_measurements_trains_and_predicts() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);

        let prediction = predict_measurements(&config, &[5.0, 3.4, 1.5, 0.2]).unwrap();
        assert_eq!(prediction.species, Species::Setosa);
        assert_eq!(prediction.train_size, 72);
        assert_eq!(prediction.test_size, 18);
        assert!(prediction.test_accuracy.unwrap() > 0.9);
    }

    #[test]
    fn test_unseeded_prediction_is_still_a_label() {
        let dir = TempDir::new().unwrap();
        let config = PredictionConfig {
            split_seed: None,
            ..config_for(&dir)
        };
        let prediction = predict_measurements(&config, &[6.6, 3.0, 5.6, 2.0]).unwrap();
        assert!(Species::ALL.contains(&prediction.species));
    }

    #[test]
    fn test_missing_dataset() {
        let config = PredictionConfig {
            dataset_path: PathBuf::from("/missing/iris.csv"),
            ..PredictionConfig::default()
        };
        let err = predict_measurements(&config, &[1.0, 2.0, 3.0, 4.0]).unwrap_err();
        assert_eq!(err.kind(), crate::PredictionErrorKind::DatasetLoadFailure);
    }

    #[test]
    fn test_wrong_number_of_measurements() {
        let dir = TempDir::new().unwrap();
        let err = predict_measurements(&config_for(&dir), &[1.0, 2.0]).unwrap_err();
        assert_eq!(err.kind(), crate::PredictionErrorKind::MalformedInput);
    }

    #[test]
    fn test_evaluate_dataset() {
        let dir = TempDir::new().unwrap();
        let evaluation = evaluate_dataset(&config_for(&dir)).unwrap();
        assert_eq!(evaluation.train_size + evaluation.test_size, 90);
        assert!(evaluation.iterations > 0);
        assert!(evaluation.accuracy > 0.9);

        let no_holdout = PredictionConfig {
            test_fraction: 0.0,
            ..config_for(&dir)
        };
        assert!(evaluate_dataset(&no_holdout).is_err());
    }

    #[test]
    fn test_classify_image_file() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        write_initialized_weights(&config.image_model_path).unwrap();
        let image_path = dir.path().join("flower.png");
        std::fs::write(&image_path, two_tone_png(80, 60, [120, 60, 200], [30, 140, 40])).unwrap();

        let species = classify_image_file(&image_path, &config.image_model_path).unwrap();
        assert!(Species::ALL.contains(&species));
    }

    #[test]
    fn test_classify_image_without_model() {
        let dir = TempDir::new().unwrap();
        let image_path = dir.path().join("flower.png");
        std::fs::write(&image_path, two_tone_png(8, 8, [1, 2, 3], [4, 5, 6])).unwrap();

        let err = classify_image_file(&image_path, &dir.path().join("missing.safetensors"))
            .unwrap_err();
        assert_eq!(err.kind(), crate::PredictionErrorKind::ModelLoadFailure);
    }
}
