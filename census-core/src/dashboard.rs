//! Per-refresh dashboard state handed to the rendering layer.
//!
//! Every refresh builds a new [`DashboardSnapshot`] from the latest fetch
//! outcomes; the previous snapshot is simply replaced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clean::{clean_series_with_stats, CleaningStats};
use crate::config::CensusConfig;
use crate::hospital::{full_name, normalize_code, CapacityLevel};
use crate::summary::{summarize, SummaryStats};
use crate::time::HistoryWindow;
use crate::{CensusError, CleanedSeries, RawSample, SeriesPoint};

/// Outcome of fetching one hospital's history.
#[derive(Debug)]
pub struct HospitalFetch {
    pub hospital_code: String,
    pub outcome: Result<Vec<RawSample>, CensusError>,
}

impl HospitalFetch {
    pub fn ok(hospital_code: &str, samples: Vec<RawSample>) -> Self {
        Self {
            hospital_code: normalize_code(hospital_code),
            outcome: Ok(samples),
        }
    }

    pub fn failed(hospital_code: &str, error: CensusError) -> Self {
        Self {
            hospital_code: normalize_code(hospital_code),
            outcome: Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HospitalStatus {
    Ready,
    /// `reason` is set when the fetch failed; `None` means the feed had nothing usable.
    NoData { reason: Option<String> },
}

/// One line of the history table, newest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableRow {
    pub timestamp: DateTime<Utc>,
    pub total_patients: u32,
    pub admitted: u32,
    /// Difference from the next older row; `None` on the oldest row shown.
    pub change: Option<i64>,
}

/// Series in the shape the chart layer plots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartDataset {
    pub label: String,
    pub points: Vec<(DateTime<Utc>, u32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HospitalReport {
    pub hospital_code: String,
    pub name: String,
    pub status: HospitalStatus,
    pub series: CleanedSeries,
    pub summary: SummaryStats,
    pub cleaning: CleaningStats,
    pub capacity: CapacityLevel,
    pub last_updated: Option<DateTime<Utc>>,
}

impl HospitalReport {
    fn no_data(hospital_code: &str, reason: Option<String>) -> Self {
        let code = normalize_code(hospital_code);
        Self {
            name: full_name(&code),
            series: CleanedSeries {
                hospital_code: code.clone(),
                points: Vec::new(),
            },
            hospital_code: code,
            status: HospitalStatus::NoData { reason },
            summary: SummaryStats::default(),
            cleaning: CleaningStats::default(),
            capacity: CapacityLevel::Quiet,
            last_updated: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.status == HospitalStatus::Ready
    }

    pub fn chart_dataset(&self) -> ChartDataset {
        ChartDataset {
            label: self.hospital_code.clone(),
            points: self
                .series
                .points
                .iter()
                .map(|point| (point.timestamp, point.total_patients))
                .collect(),
        }
    }

    /// The last `count` points, for the small per-hospital charts.
    pub fn recent_points(&self, count: usize) -> &[SeriesPoint] {
        let points = &self.series.points;
        &points[points.len().saturating_sub(count)..]
    }

    /// The newest `limit` points as table rows, newest first.
    pub fn table_rows(&self, limit: usize) -> Vec<TableRow> {
        let newest_first: Vec<&SeriesPoint> = self.recent_points(limit).iter().rev().collect();

        newest_first
            .iter()
            .enumerate()
            .map(|(index, point)| TableRow {
                timestamp: point.timestamp,
                total_patients: point.total_patients,
                admitted: point.admitted_in_ed.unwrap_or(0),
                change: newest_first.get(index + 1).map(|older| {
                    i64::from(point.total_patients) - i64::from(older.total_patients)
                }),
            })
            .collect()
    }
}

/// Run one hospital's samples through the cleaner and aggregator.
pub fn build_report(hospital_code: &str, samples: &[RawSample], config: &CensusConfig) -> HospitalReport {
    let (series, cleaning) = clean_series_with_stats(samples, hospital_code, &config.cleaning);
    if series.is_empty() {
        let mut report = HospitalReport::no_data(hospital_code, None);
        report.cleaning = cleaning;
        return report;
    }

    let summary = summarize(&series, config.trend_threshold_percent);
    HospitalReport {
        name: full_name(&series.hospital_code),
        hospital_code: series.hospital_code.clone(),
        status: HospitalStatus::Ready,
        last_updated: series.latest().map(|point| point.timestamp),
        capacity: CapacityLevel::from_patients(summary.current),
        summary,
        cleaning,
        series,
    }
}

/// Everything the rendering layer needs after one refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub window: HistoryWindow,
    pub hospitals: Vec<HospitalReport>,
}

impl DashboardSnapshot {
    pub fn report(&self, hospital_code: &str) -> Option<&HospitalReport> {
        let code = normalize_code(hospital_code);
        self.hospitals.iter().find(|report| report.hospital_code == code)
    }

    pub fn has_any_data(&self) -> bool {
        self.hospitals.iter().any(HospitalReport::has_data)
    }

    /// Datasets for every hospital with data, in fetch order.
    pub fn datasets(&self) -> Vec<ChartDataset> {
        self.hospitals
            .iter()
            .filter(|report| report.has_data())
            .map(HospitalReport::chart_dataset)
            .collect()
    }
}

/// Build a fresh snapshot. A failed hospital becomes `NoData` without
/// touching the others.
pub fn build_dashboard(fetches: Vec<HospitalFetch>, config: &CensusConfig) -> DashboardSnapshot {
    let hospitals = fetches
        .into_iter()
        .map(|fetch| match fetch.outcome {
            Ok(samples) => build_report(&fetch.hospital_code, &samples, config),
            Err(error) => {
                debug!(hospital = %fetch.hospital_code, %error, "no data for hospital");
                HospitalReport::no_data(&fetch.hospital_code, Some(error.to_string()))
            }
        })
        .collect();

    DashboardSnapshot {
        generated_at: Utc::now(),
        window: config.window,
        hospitals,
    }
}

/// Datasets for the hospitals toggled on in the chart legend.
pub fn visible_datasets(snapshot: &DashboardSnapshot, selected: &[&str]) -> Vec<ChartDataset> {
    let selected: Vec<String> = selected.iter().map(|code| normalize_code(code)).collect();
    snapshot
        .datasets()
        .into_iter()
        .filter(|dataset| selected.contains(&dataset.label))
        .collect()
}
