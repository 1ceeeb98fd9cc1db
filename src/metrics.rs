//! Regression metrics.

/// Metric key under which the pipeline score is logged
pub const SCORE_METRIC: &str = "r2_score";

/// Coefficient of determination: `1 - SS_res / SS_tot`.
///
/// Higher is better; 1.0 is a perfect fit and a model that always predicts
/// the mean of `y_true` scores 0.0.
///
/// When `y_true` is constant (which includes a single sample) `SS_tot` is
/// zero; the score is then forced finite: 1.0 for a perfect prediction,
/// 0.0 otherwise. An empty input also scores 0.0.
///
/// This differs from scikit-learn's `r2_score`, which returns NaN for fewer
/// than two samples. Here the result is always finite, so a single-row test
/// split can still be logged as a metric.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    debug_assert_eq!(y_true.len(), y_pred.len());

    if y_true.is_empty() {
        return 0.0;
    }

    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }

    1.0 - ss_res / ss_tot
}

/// Root Mean Squared Error: `sqrt(mean((pred - label)²))`
///
/// Lower is better. Returns 0.0 for empty input.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    debug_assert_eq!(y_true.len(), y_pred.len());

    if y_true.is_empty() {
        return 0.0;
    }

    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum::<f64>()
        / y_true.len() as f64;
    mse.sqrt()
}
