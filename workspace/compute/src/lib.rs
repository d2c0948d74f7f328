pub mod dataset;
pub mod error;
pub mod image_model;
pub mod logistic;
pub mod pipeline;
pub mod preprocess;
pub mod split;

pub use error::{PredictionError, PredictionErrorKind, Result};
pub use pipeline::{
    classify_image_file, evaluate_dataset, parse_measurements, predict_measurements, Evaluation,
    MeasurementPrediction, PredictionConfig,
};
