//! Time-series reduction
//!
//! Collapses a metric series to one scalar with the run's aggregation policy.
//! Missing samples are dropped before reduction, they never count as zero.

use crate::models::{AggregationPolicy, TimeSeriesSample};

/// Reduce already-present sample values to a single number.
///
/// An empty series reduces to `0.0` for every policy. Callers render that like
/// any other reading.
pub fn reduce(values: &[f64], policy: AggregationPolicy) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    match policy {
        AggregationPolicy::Average => values.iter().sum::<f64>() / values.len() as f64,
        AggregationPolicy::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationPolicy::P95 => nearest_rank(values, 0.95),
    }
}

/// Reduce a series, skipping buckets without a value
pub fn reduce_samples(samples: &[TimeSeriesSample], policy: AggregationPolicy) -> f64 {
    let values: Vec<f64> = samples.iter().filter_map(|s| s.value).collect();
    reduce(&values, policy)
}

/// Sorted element at `floor(q * n)`, no interpolation
fn nearest_rank(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = (q * sorted.len() as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn one_to_ten() -> Vec<f64> {
        (1..=10).map(f64::from).collect()
    }

    #[test]
    fn test_average() {
        assert!((reduce(&one_to_ten(), AggregationPolicy::Average) - 5.5).abs() < f64::EPSILON);
        assert!((reduce(&[2.0, 4.0], AggregationPolicy::Average) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_max() {
        assert_eq!(reduce(&[3.0, 9.5, 1.0], AggregationPolicy::Max), 9.5);
        assert_eq!(reduce(&[-4.0, -2.0], AggregationPolicy::Max), -2.0);
    }

    #[test]
    fn test_p95_nearest_rank() {
        // floor(0.95 * 10) = 9, the last element
        assert_eq!(reduce(&one_to_ten(), AggregationPolicy::P95), 10.0);

        // floor(0.95 * 20) = 19
        let twenty: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(reduce(&twenty, AggregationPolicy::P95), 20.0);

        // floor(0.95 * 100) = 95, zero-based, so the 96th value
        let hundred: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(reduce(&hundred, AggregationPolicy::P95), 96.0);
    }

    #[test]
    fn test_p95_sorts_input() {
        let values = vec![10.0, 1.0, 7.0, 3.0];
        // floor(0.95 * 4) = 3
        assert_eq!(reduce(&values, AggregationPolicy::P95), 10.0);
    }

    #[test]
    fn test_empty_series_is_zero() {
        for policy in [
            AggregationPolicy::Average,
            AggregationPolicy::Max,
            AggregationPolicy::P95,
        ] {
            assert_eq!(reduce(&[], policy), 0.0);
        }
    }

    #[test]
    fn test_missing_samples_are_skipped() {
        let now = Utc::now();
        let samples = vec![
            TimeSeriesSample { timestamp: now, value: Some(10.0) },
            TimeSeriesSample { timestamp: now, value: None },
            TimeSeriesSample { timestamp: now, value: Some(20.0) },
        ];
        assert_eq!(reduce_samples(&samples, AggregationPolicy::Average), 15.0);

        let all_missing = vec![TimeSeriesSample { timestamp: now, value: None }];
        assert_eq!(reduce_samples(&all_missing, AggregationPolicy::Max), 0.0);
    }
}
