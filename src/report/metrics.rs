//! Metric functions applied to stored raw results at report time
//!
//! Registering a metric after experiments ran makes it show up in the
//! next report without rerunning anything.

use crate::experiment::RawResult;
use std::collections::BTreeMap;
use std::fmt;

/// A scoring function over `(ground_truth, predictions)`
pub type MetricFn = Box<dyn Fn(&[f64], &[f64]) -> f64>;

/// Named metric functions, in name order
#[derive(Default)]
pub struct MetricRegistry {
    metrics: BTreeMap<String, MetricFn>,
}

impl MetricRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `accuracy`, `mae` and `mse`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("accuracy", accuracy);
        registry.register("mae", mean_absolute_error);
        registry.register("mse", mean_squared_error);
        registry
    }

    /// Add or replace a metric
    pub fn register<F>(&mut self, name: impl Into<String>, metric: F) -> &mut Self
    where
        F: Fn(&[f64], &[f64]) -> f64 + 'static,
    {
        self.metrics.insert(name.into(), Box::new(metric));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Apply every metric to every result, keyed `<result>-<metric>`
    pub fn evaluate(&self, results: &BTreeMap<String, RawResult>) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for (result_name, result) in results {
            for (metric_name, metric) in &self.metrics {
                let value = metric(&result.ground_truth, &result.predictions);
                out.insert(format!("{}-{}", result_name, metric_name), value);
            }
        }
        out
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.metrics.keys()).finish()
    }
}

/// Fraction of exactly matching predictions
pub fn accuracy(truth: &[f64], predicted: &[f64]) -> f64 {
    mean(truth, predicted, |t, p| if t == p { 1.0 } else { 0.0 })
}

pub fn mean_absolute_error(truth: &[f64], predicted: &[f64]) -> f64 {
    mean(truth, predicted, |t, p| (t - p).abs())
}

pub fn mean_squared_error(truth: &[f64], predicted: &[f64]) -> f64 {
    mean(truth, predicted, |t, p| (t - p).powi(2))
}

/// NaN for empty input
fn mean(truth: &[f64], predicted: &[f64], f: impl Fn(f64, f64) -> f64) -> f64 {
    let n = truth.len().min(predicted.len());
    if n == 0 {
        return f64::NAN;
    }
    let total: f64 = truth.iter().zip(predicted).map(|(t, p)| f(*t, *p)).sum();
    total / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> BTreeMap<String, RawResult> {
        let mut results = BTreeMap::new();
        results.insert(
            "test".to_string(),
            RawResult::new(vec![1.0, 0.0, 1.0, 1.0], vec![1.0, 1.0, 1.0, 0.0]),
        );
        results
    }

    #[test]
    fn builtin_metrics() {
        let truth = [1.0, 2.0, 3.0];
        let predicted = [1.0, 2.0, 5.0];

        assert!((accuracy(&truth, &predicted) - 2.0 / 3.0).abs() < 1e-12);
        assert!((mean_absolute_error(&truth, &predicted) - 2.0 / 3.0).abs() < 1e-12);
        assert!((mean_squared_error(&truth, &predicted) - 4.0 / 3.0).abs() < 1e-12);
        assert!(accuracy(&[], &[]).is_nan());
    }

    #[test]
    fn keys_combine_result_and_metric() {
        let metrics = MetricRegistry::with_defaults().evaluate(&results());

        let keys: Vec<&str> = metrics.keys().map(String::as_str).collect();
        assert_eq!(keys, ["test-accuracy", "test-mae", "test-mse"]);
        assert_eq!(metrics["test-accuracy"], 0.5);
    }

    #[test]
    fn registered_later_applies_to_old_results() {
        let mut registry = MetricRegistry::new();
        assert!(registry.evaluate(&results()).is_empty());

        registry.register("count", |t, _| t.len() as f64);
        assert_eq!(registry.evaluate(&results())["test-count"], 4.0);
        assert_eq!(registry.names().collect::<Vec<_>>(), ["count"]);
    }
}
