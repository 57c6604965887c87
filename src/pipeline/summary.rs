use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::MetricResult;

/// Descriptive statistics over the non-null values of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n − 1); 0.0 for a single value.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl MetricStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        let std = if n > 1 {
            (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        Some(MetricStats {
            count: n,
            mean,
            median,
            std,
            min: sorted[0],
            max: sorted[n - 1],
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub total_events: usize,
    pub events_by_category: BTreeMap<String, usize>,
    pub crt: Option<MetricStats>,
    pub tsi: Option<MetricStats>,
    pub giri: Option<MetricStats>,
}

impl ResultsSummary {
    pub fn from_results(results: &[MetricResult]) -> Self {
        let mut events_by_category: BTreeMap<String, usize> = BTreeMap::new();
        for r in results {
            *events_by_category.entry(r.category.to_string()).or_default() += 1;
        }
        let collect = |f: fn(&MetricResult) -> Option<f64>| {
            let values: Vec<f64> = results.iter().filter_map(f).collect();
            MetricStats::from_values(&values)
        };
        ResultsSummary {
            total_events: results.len(),
            events_by_category,
            crt: collect(|r| r.crt),
            tsi: collect(|r| r.tsi),
            giri: collect(|r| r.giri),
        }
    }

    pub fn log(&self) {
        info!("Total critical events: {}", self.total_events);
        for (category, count) in &self.events_by_category {
            info!("  {:<40} {}", category, count);
        }
        for (name, stats) in [("CRT", &self.crt), ("TSI", &self.tsi), ("GIRI", &self.giri)] {
            match stats {
                Some(s) => info!(
                    "{}: n={} mean={:.3} median={:.3} std={:.3} min={:.3} max={:.3}",
                    name, s.count, s.mean, s.median, s.std, s.min, s.max
                ),
                None => info!("{}: no values", name),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EventCategory;
    use approx::assert_relative_eq;

    fn result(category: EventCategory, crt: Option<f64>, tsi: Option<f64>) -> MetricResult {
        MetricResult {
            event_id: "e".into(),
            match_id: "m".into(),
            match_name: "A vs B".into(),
            category,
            weight: 0.1,
            timestamp: 0.0,
            period: Some(1),
            player_id: Some(1),
            player_name: None,
            team_id: Some(1),
            team_name: None,
            is_home: true,
            window_secs: 120.0,
            crt,
            tsi,
            giri: None,
        }
    }

    #[test]
    fn stats_use_sample_std() {
        let s = MetricStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(s.count, 8);
        assert_relative_eq!(s.mean, 5.0);
        assert_relative_eq!(s.median, 4.5);
        assert_relative_eq!(s.std, (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(s.min, 2.0);
        assert_relative_eq!(s.max, 9.0);
        assert_eq!(MetricStats::from_values(&[]), None);
        assert_eq!(MetricStats::from_values(&[3.0]).unwrap().std, 0.0);
    }

    #[test]
    fn summary_skips_nulls() {
        let results = vec![
            result(EventCategory::GoalScored, Some(10.0), None),
            result(EventCategory::GoalScored, None, Some(0.2)),
            result(EventCategory::FailedPassOffside, Some(30.0), Some(0.4)),
        ];
        let summary = ResultsSummary::from_results(&results);
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.events_by_category["goal_scored"], 2);
        assert_eq!(summary.events_by_category["failed_pass_offside"], 1);
        assert_eq!(summary.crt.unwrap().count, 2);
        assert_relative_eq!(summary.crt.unwrap().mean, 20.0);
        assert_relative_eq!(summary.tsi.unwrap().median, 0.3, epsilon = 1e-12);
        assert!(summary.giri.is_none());
    }
}
