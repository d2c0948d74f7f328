use std::fs::File;
use std::path::Path;

use model::Species;
use ndarray::{Array2, Axis};
use polars::prelude::*;
use tracing::{debug, instrument, trace};

use crate::error::{PredictionError, Result};

/// Name of the label column; every other column is a numeric feature.
pub const LABEL_COLUMN: &str = "species";

/// Labelled measurements ready for training.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    /// One row per sample, one column per feature.
    pub features: Array2<f64>,
    pub labels: Vec<Species>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            features: self.features.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Load a CSV with a header row and a `species` column.
#[instrument]
pub fn load_csv(path: &Path) -> Result<Dataset> {
    trace!("Opening dataset file");
    let file = File::open(path).map_err(|e| {
        PredictionError::DatasetLoad(format!("Cannot open {}: {}", path.display(), e))
    })?;

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .into_reader_with_file_handle(file)
        .finish()?;
    debug!("Read {} rows x {} columns", df.height(), df.width());

    from_data_frame(&df)
}

fn from_data_frame(df: &DataFrame) -> Result<Dataset> {
    let column_names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    if !column_names.iter().any(|name| name == LABEL_COLUMN) {
        return Err(PredictionError::DatasetLoad(format!(
            "Missing '{}' column",
            LABEL_COLUMN
        )));
    }
    let feature_names: Vec<String> = column_names
        .into_iter()
        .filter(|name| name != LABEL_COLUMN)
        .collect();
    if feature_names.is_empty() {
        return Err(PredictionError::DatasetLoad(
            "Dataset has no feature columns".to_string(),
        ));
    }
    if df.height() == 0 {
        return Err(PredictionError::DatasetLoad("Dataset has no rows".to_string()));
    }

    let label_series = df
        .column(LABEL_COLUMN)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let labels = label_series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let value = value.ok_or_else(|| {
                PredictionError::DatasetLoad(format!("Missing species in row {}", row + 1))
            })?;
            value
                .parse::<Species>()
                .map_err(|e| PredictionError::DatasetLoad(format!("Row {}: {}", row + 1, e)))
        })
        .collect::<Result<Vec<Species>>>()?;

    let mut features = Array2::<f64>::zeros((df.height(), feature_names.len()));
    for (col_idx, name) in feature_names.iter().enumerate() {
        let series = df
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        for (row, value) in series.f64()?.into_iter().enumerate() {
            features[[row, col_idx]] = value.ok_or_else(|| {
                PredictionError::DatasetLoad(format!(
                    "Column '{}' has a missing or non-numeric value in row {}",
                    name,
                    row + 1
                ))
            })?;
        }
    }

    Ok(Dataset {
        feature_names,
        features,
        labels,
    })
}
