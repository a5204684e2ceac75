//! Series cleaner: minute de-duplication, range filter and anomaly smoothing.

use std::collections::btree_map::{BTreeMap, Entry};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CleaningConfig;
use crate::hospital::normalize_code;
use crate::time::{gap_minutes, minute_bucket};
use crate::{CleanedSeries, RawSample, SeriesPoint};

/// How many samples survived each cleaning stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CleaningStats {
    pub raw: usize,
    pub deduplicated: usize,
    pub in_range: usize,
    pub smoothed: usize,
}

/// Clean one hospital's raw history. Never fails; empty input gives an empty series.
pub fn clean_series(
    samples: &[RawSample],
    hospital_code: &str,
    config: &CleaningConfig,
) -> CleanedSeries {
    clean_series_with_stats(samples, hospital_code, config).0
}

/// Same as [`clean_series`], also reporting per-stage counts.
pub fn clean_series_with_stats(
    samples: &[RawSample],
    hospital_code: &str,
    config: &CleaningConfig,
) -> (CleanedSeries, CleaningStats) {
    let code = normalize_code(hospital_code);

    let deduplicated = dedup_by_minute(samples);
    let deduplicated_count = deduplicated.len();

    let range = config.range_for(&code);
    let in_range: Vec<SeriesPoint> = deduplicated
        .into_iter()
        .map(SeriesPoint::from)
        .filter(|point| range.contains(point.total_patients))
        .collect();
    let in_range_count = in_range.len();

    let smoothed = smooth_anomalies(&code, in_range, config);

    let stats = CleaningStats {
        raw: samples.len(),
        deduplicated: deduplicated_count,
        in_range: in_range_count,
        smoothed: smoothed.len(),
    };
    debug!(
        hospital = %code,
        raw = stats.raw,
        deduplicated = stats.deduplicated,
        in_range = stats.in_range,
        smoothed = stats.smoothed,
        "cleaned series"
    );

    (
        CleanedSeries {
            hospital_code: code,
            points: smoothed,
        },
        stats,
    )
}

/// Keep the most recent sample of every UTC minute, ordered by time.
///
/// On an exact timestamp tie the sample that arrived later wins.
fn dedup_by_minute(samples: &[RawSample]) -> Vec<&RawSample> {
    let mut buckets: BTreeMap<i64, &RawSample> = BTreeMap::new();

    for sample in samples {
        match buckets.entry(minute_bucket(sample.timestamp)) {
            Entry::Occupied(mut entry) => {
                if sample.timestamp >= entry.get().timestamp {
                    entry.insert(sample);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(sample);
            }
        }
    }

    // Bucket order is chronological, so the values come out sorted.
    buckets.into_values().collect()
}

fn smooth_anomalies(
    hospital_code: &str,
    points: Vec<SeriesPoint>,
    config: &CleaningConfig,
) -> Vec<SeriesPoint> {
    let mut accepted: Vec<SeriesPoint> = Vec::with_capacity(points.len());

    for candidate in points {
        if let Some(previous) = accepted.last() {
            let gap = gap_minutes(previous.timestamp, candidate.timestamp);
            if gap <= f64::from(config.max_gap_minutes) && previous.total_patients > 0 {
                let before = f64::from(previous.total_patients);
                let change = (f64::from(candidate.total_patients) - before).abs() / before;
                if change > config.max_relative_change {
                    debug!(
                        hospital = %hospital_code,
                        previous = previous.total_patients,
                        candidate = candidate.total_patients,
                        change_percent = change * 100.0,
                        "dropping anomalous reading"
                    );
                    continue;
                }
            }
        }

        accepted.push(candidate);
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlausibleRange;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    fn sample(ts: DateTime<Utc>, total: u32) -> RawSample {
        RawSample::new("RUH", ts, total)
    }

    fn totals(series: &CleanedSeries) -> Vec<u32> {
        series.points.iter().map(|p| p.total_patients).collect()
    }

    fn wide_config() -> CleaningConfig {
        CleaningConfig {
            default_range: PlausibleRange::new(0, 1000),
            ranges: Default::default(),
            ..CleaningConfig::default()
        }
    }

    #[test]
    fn empty_input_gives_empty_series() {
        let (series, stats) = clean_series_with_stats(&[], "RUH", &CleaningConfig::default());
        assert!(series.is_empty());
        assert_eq!(series.hospital_code, "RUH");
        assert_eq!(stats, CleaningStats::default());
    }

    #[test]
    fn single_sample_is_unchanged() {
        let input = vec![sample(at(8, 0, 0), 40).with_admitted(12)];
        let series = clean_series(&input, "RUH", &CleaningConfig::default());
        assert_eq!(series.to_samples(), input);
    }

    #[test]
    fn clean_series_is_idempotent() {
        let input: Vec<RawSample> = [(0, 50), (10, 55), (20, 60), (45, 58), (50, 61)]
            .into_iter()
            .map(|(minute, total)| sample(at(9, 0, 0) + Duration::minutes(minute), total))
            .collect();
        let config = CleaningConfig::default();

        let once = clean_series(&input, "RUH", &config);
        assert_eq!(once.to_samples(), input);
        let twice = clean_series(&once.to_samples(), "RUH", &config);
        assert_eq!(once, twice);
    }

    #[test]
    fn latest_sample_in_minute_wins_regardless_of_order() {
        let early = sample(at(10, 5, 10), 50);
        let late = sample(at(10, 5, 40), 52);
        let config = wide_config();

        for input in [vec![early.clone(), late.clone()], vec![late.clone(), early.clone()]] {
            let series = clean_series(&input, "RUH", &config);
            assert_eq!(series.len(), 1);
            assert_eq!(series.points[0].timestamp, late.timestamp);
            assert_eq!(series.points[0].total_patients, 52);
        }
    }

    #[test]
    fn exact_timestamp_tie_keeps_later_arrival() {
        let first = sample(at(10, 5, 0), 50);
        let second = sample(at(10, 5, 0), 51);
        let series = clean_series(&[first, second], "RUH", &wide_config());
        assert_eq!(totals(&series), vec![51]);
    }

    #[test]
    fn output_is_sorted() {
        let input = vec![
            sample(at(11, 0, 0), 60),
            sample(at(9, 0, 0), 50),
            sample(at(10, 0, 0), 55),
        ];
        let series = clean_series(&input, "RUH", &CleaningConfig::default());
        assert_eq!(totals(&series), vec![50, 55, 60]);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let config = CleaningConfig::default();
        let kept = clean_series(&[sample(at(9, 0, 0), 120)], "RUH", &config);
        assert_eq!(totals(&kept), vec![120]);

        let dropped = clean_series(&[sample(at(9, 0, 0), 121)], "RUH", &config);
        assert!(dropped.is_empty());

        let below = clean_series(&[sample(at(9, 0, 0), 14)], "RUH", &config);
        assert!(below.is_empty());
    }

    #[test]
    fn missing_total_counts_as_zero() {
        let mut missing = sample(at(9, 0, 0), 0);
        missing.total_patients = None;

        let sch = clean_series(&[missing.clone()], "SCH", &CleaningConfig::default());
        assert_eq!(totals(&sch), vec![0]);

        // RUH requires at least 15 patients.
        let ruh = clean_series(&[missing], "RUH", &CleaningConfig::default());
        assert!(ruh.is_empty());
    }

    #[test]
    fn all_out_of_range_gives_empty_series() {
        let input = vec![sample(at(9, 0, 0), 500), sample(at(10, 0, 0), 600)];
        assert!(clean_series(&input, "JPCH", &CleaningConfig::default()).is_empty());
    }

    #[test]
    fn large_jump_within_gap_is_dropped() {
        let input = vec![sample(at(9, 0, 0), 100), sample(at(9, 5, 0), 160)];
        let series = clean_series(&input, "XYZ", &CleaningConfig::default());
        assert_eq!(totals(&series), vec![100]);
    }

    #[test]
    fn moderate_jump_within_gap_is_kept() {
        let input = vec![sample(at(9, 0, 0), 100), sample(at(9, 5, 0), 145)];
        let series = clean_series(&input, "XYZ", &CleaningConfig::default());
        assert_eq!(totals(&series), vec![100, 145]);
    }

    #[test]
    fn exactly_fifty_percent_is_kept() {
        let input = vec![sample(at(9, 0, 0), 100), sample(at(9, 5, 0), 50)];
        let series = clean_series(&input, "XYZ", &CleaningConfig::default());
        assert_eq!(totals(&series), vec![100, 50]);
    }

    #[test]
    fn jump_after_long_gap_is_accepted() {
        let input = vec![sample(at(9, 0, 0), 100), sample(at(9, 16, 0), 160)];
        let series = clean_series(&input, "XYZ", &CleaningConfig::default());
        assert_eq!(totals(&series), vec![100, 160]);

        let at_limit = vec![sample(at(9, 0, 0), 100), sample(at(9, 15, 0), 160)];
        let series = clean_series(&at_limit, "XYZ", &CleaningConfig::default());
        assert_eq!(totals(&series), vec![100]);
    }

    #[test]
    fn rejected_candidate_does_not_advance_previous() {
        // 160 is dropped, so 150 is compared against 100 (50%, kept),
        // and 40 against 150 (73%, dropped).
        let input = vec![
            sample(at(9, 0, 0), 100),
            sample(at(9, 5, 0), 160),
            sample(at(9, 10, 0), 150),
            sample(at(9, 12, 0), 40),
        ];
        let series = clean_series(&input, "XYZ", &CleaningConfig::default());
        assert_eq!(totals(&series), vec![100, 150]);
    }

    #[test]
    fn zero_previous_skips_anomaly_check() {
        let input = vec![sample(at(9, 0, 0), 0), sample(at(9, 5, 0), 30)];
        let series = clean_series(&input, "SCH", &CleaningConfig::default());
        assert_eq!(totals(&series), vec![0, 30]);
    }

    #[test]
    fn end_to_end_scenario() {
        let input = vec![
            sample(at(0, 0, 0), 50),
            sample(at(0, 5, 0), 52),
            sample(at(0, 5, 30), 999),
            sample(at(0, 20, 0), 200),
        ];
        let config = CleaningConfig {
            default_range: PlausibleRange::new(0, 120),
            ranges: Default::default(),
            ..CleaningConfig::default()
        };

        let (series, stats) = clean_series_with_stats(&input, "XYZ", &config);

        // 999 wins the 00:05 bucket, then falls outside the range; 200 is out of range too.
        assert_eq!(totals(&series), vec![50]);
        assert_eq!(series.points[0].timestamp, at(0, 0, 0));
        assert_eq!(
            stats,
            CleaningStats {
                raw: 4,
                deduplicated: 3,
                in_range: 1,
                smoothed: 1,
            }
        );
    }

    #[test]
    fn output_uses_normalized_code() {
        let series = clean_series(&[sample(at(9, 0, 0), 30)], " sph ", &CleaningConfig::default());
        assert_eq!(series.hospital_code, "SPH");
    }
}
