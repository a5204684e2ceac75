//! Summary aggregator over a cleaned series.

use serde::{Deserialize, Serialize};

use crate::{CleanedSeries, SeriesPoint};

/// Direction of the late-window average against the early-window average.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    #[default]
    Flat,
}

impl TrendDirection {
    /// `Up` above `+threshold`, `Down` below `-threshold`, otherwise `Flat`.
    pub fn from_percent(percent: f64, threshold: f64) -> Self {
        if percent > threshold {
            Self::Up
        } else if percent < -threshold {
            Self::Down
        } else {
            Self::Flat
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            Self::Up => "↗",
            Self::Down => "↘",
            Self::Flat => "→",
        }
    }
}

/// Statistics shown in the summary table for one hospital.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct SummaryStats {
    pub current: u32,
    pub current_admitted: u32,
    pub average: u32,
    pub max: u32,
    pub min: u32,
    pub trend_percent: f64,
    pub trend_direction: TrendDirection,
}

/// Compute [`SummaryStats`] over the whole series. An empty series gives all zeros.
pub fn summarize(series: &CleanedSeries, trend_threshold_percent: f64) -> SummaryStats {
    let points = series.points.as_slice();
    let Some(latest) = points.last() else {
        return SummaryStats::default();
    };

    let counts: Vec<u32> = points.iter().map(|p| p.total_patients).collect();
    let trend_percent = trend_percent(&counts);

    SummaryStats {
        current: latest.total_patients,
        current_admitted: latest.admitted_in_ed.unwrap_or(0),
        average: mean(&counts).round() as u32,
        max: counts.iter().copied().max().unwrap_or(0),
        min: counts.iter().copied().min().unwrap_or(0),
        trend_percent,
        trend_direction: TrendDirection::from_percent(trend_percent, trend_threshold_percent),
    }
}

/// Percent change from the first quarter's mean to the last quarter's mean,
/// rounded to one decimal. Series shorter than four points compare the first
/// and last values. Zero when the early mean is zero.
fn trend_percent(counts: &[u32]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }

    let quarter = (counts.len() / 4).max(1);
    let first_avg = mean(&counts[..quarter]);
    let last_avg = mean(&counts[counts.len() - quarter..]);

    if first_avg == 0.0 {
        return 0.0;
    }

    let percent = (last_avg - first_avg) / first_avg * 100.0;
    (percent * 10.0).round() / 10.0
}

fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let total: u64 = values.iter().map(|&v| u64::from(v)).sum();
    total as f64 / values.len() as f64
}

/// Highest point of the series; the most recent one wins a tie.
pub fn peak(series: &CleanedSeries) -> Option<&SeriesPoint> {
    series
        .points
        .iter()
        .max_by_key(|point| point.total_patients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn series(counts: &[u32]) -> CleanedSeries {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        CleanedSeries {
            hospital_code: "RUH".to_string(),
            points: counts
                .iter()
                .enumerate()
                .map(|(i, &total)| SeriesPoint {
                    timestamp: start + Duration::minutes(30 * i as i64),
                    total_patients: total,
                    admitted_in_ed: None,
                })
                .collect(),
        }
    }

    #[test]
    fn empty_series_is_all_zero_and_flat() {
        let stats = summarize(&CleanedSeries::default(), 5.0);
        assert_eq!(
            stats,
            SummaryStats {
                current: 0,
                current_admitted: 0,
                average: 0,
                max: 0,
                min: 0,
                trend_percent: 0.0,
                trend_direction: TrendDirection::Flat,
            }
        );
    }

    #[test]
    fn basic_statistics() {
        let mut input = series(&[40, 50, 45, 61]);
        input.points[3].admitted_in_ed = Some(9);

        let stats = summarize(&input, 5.0);
        assert_eq!(stats.current, 61);
        assert_eq!(stats.current_admitted, 9);
        // 196 / 4 = 49
        assert_eq!(stats.average, 49);
        assert_eq!(stats.max, 61);
        assert_eq!(stats.min, 40);
    }

    #[test]
    fn average_rounds_half_up() {
        assert_eq!(summarize(&series(&[10, 11]), 5.0).average, 11);
        assert_eq!(summarize(&series(&[10, 10, 11]), 5.0).average, 10);
    }

    #[test]
    fn missing_admitted_reports_zero() {
        assert_eq!(summarize(&series(&[30]), 5.0).current_admitted, 0);
    }

    #[test]
    fn trend_uses_quarters() {
        // quarter = 2: first [40, 40], last [60, 60]
        let stats = summarize(&series(&[40, 40, 50, 50, 50, 50, 60, 60]), 5.0);
        assert_eq!(stats.trend_percent, 50.0);
        assert_eq!(stats.trend_direction, TrendDirection::Up);
    }

    #[test]
    fn short_series_compares_first_and_last() {
        let stats = summarize(&series(&[80, 10, 40]), 5.0);
        assert_eq!(stats.trend_percent, -50.0);
        assert_eq!(stats.trend_direction, TrendDirection::Down);

        let single = summarize(&series(&[25]), 5.0);
        assert_eq!(single.trend_percent, 0.0);
        assert_eq!(single.trend_direction, TrendDirection::Flat);
    }

    #[test]
    fn five_percent_is_flat() {
        let stats = summarize(&series(&[100, 90, 110, 105]), 5.0);
        assert_eq!(stats.trend_percent, 5.0);
        assert_eq!(stats.trend_direction, TrendDirection::Flat);
    }

    #[test]
    fn five_point_one_percent_is_up() {
        let stats = summarize(&series(&[1000, 1020, 1030, 1051]), 5.0);
        assert!((stats.trend_percent - 5.1).abs() < 1e-9);
        assert_eq!(stats.trend_direction, TrendDirection::Up);

        let falling = summarize(&series(&[1000, 980, 960, 949]), 5.0);
        assert!((falling.trend_percent + 5.1).abs() < 1e-9);
        assert_eq!(falling.trend_direction, TrendDirection::Down);
    }

    #[test]
    fn zero_early_average_gives_zero_trend() {
        let stats = summarize(&series(&[0, 0, 10, 20]), 5.0);
        assert_eq!(stats.trend_percent, 0.0);
        assert_eq!(stats.trend_direction, TrendDirection::Flat);
    }

    #[test]
    fn threshold_is_configurable() {
        let stats = summarize(&series(&[100, 100, 108, 108]), 10.0);
        assert_eq!(stats.trend_percent, 8.0);
        assert_eq!(stats.trend_direction, TrendDirection::Flat);
    }

    #[test]
    fn peak_prefers_latest_on_tie() {
        let input = series(&[30, 55, 40, 55]);
        let top = peak(&input).unwrap();
        assert_eq!(top.total_patients, 55);
        assert_eq!(top.timestamp, input.points[3].timestamp);
    }
}
