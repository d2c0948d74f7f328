use anyhow::{Context, Result};
use tracing::{info, trace};

use crate::config::Settings;

/// Train the measurement classifier on the configured split and print its held-out accuracy.
pub async fn evaluate(settings: Settings) -> Result<()> {
    trace!("Entering evaluate function");
    let config = settings.prediction;
    info!("Evaluating on {}", config.dataset_path.display());

    let evaluation = tokio::task::spawn_blocking(move || compute::evaluate_dataset(&config))
        .await
        .context("Evaluation task panicked")?
        .context("Evaluation failed")?;

    println!(
        "train rows: {}\ntest rows: {}\niterations: {}\naccuracy: {:.4}",
        evaluation.train_size, evaluation.test_size, evaluation.iterations, evaluation.accuracy
    );
    Ok(())
}
