//! Logic lõi làm sạch và tổng hợp số bệnh nhân khoa cấp cứu theo bệnh viện.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod clean;
pub mod config;
pub mod dashboard;
pub mod hospital;
pub mod summary;
pub mod time;

pub use clean::{clean_series, clean_series_with_stats, CleaningStats};
pub use config::{CensusConfig, CleaningConfig, ConfigOverrides, PlausibleRange};
pub use dashboard::{
    build_dashboard, build_report, visible_datasets, ChartDataset, DashboardSnapshot,
    HospitalFetch, HospitalReport, HospitalStatus, TableRow,
};
pub use hospital::{code_for_name, full_name, normalize_code, CapacityLevel, Hospital, HOSPITALS};
pub use summary::{peak, summarize, SummaryStats, TrendDirection};
pub use time::{describe_elapsed, gap_minutes, minute_bucket, HistoryWindow};

/// Một lần đo số bệnh nhân của một bệnh viện, đúng như nguồn cấp trả về.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawSample {
    pub hospital_code: String,
    pub timestamp: DateTime<Utc>,
    /// `None` khi nguồn thiếu hoặc gửi giá trị hỏng; được coi là 0.
    pub total_patients: Option<u32>,
    #[serde(rename = "admitted_patients_in_ed")]
    pub admitted_in_ed: Option<u32>,
}

impl RawSample {
    pub fn new(hospital_code: &str, timestamp: DateTime<Utc>, total_patients: u32) -> Self {
        Self {
            hospital_code: normalize_code(hospital_code),
            timestamp,
            total_patients: Some(total_patients),
            admitted_in_ed: None,
        }
    }

    pub fn with_admitted(mut self, admitted: u32) -> Self {
        self.admitted_in_ed = Some(admitted);
        self
    }

    /// Số bệnh nhân sau khi ép giá trị thiếu về 0.
    pub fn patients(&self) -> u32 {
        self.total_patients.unwrap_or(0)
    }
}

/// Một điểm trong chuỗi đã làm sạch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub total_patients: u32,
    #[serde(rename = "admitted_patients_in_ed")]
    pub admitted_in_ed: Option<u32>,
}

impl From<&RawSample> for SeriesPoint {
    fn from(sample: &RawSample) -> Self {
        Self {
            timestamp: sample.timestamp,
            total_patients: sample.patients(),
            admitted_in_ed: sample.admitted_in_ed,
        }
    }
}

/// Chuỗi thời gian đã khử trùng lặp, lọc khoảng và làm mượt cho một bệnh viện.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CleanedSeries {
    pub hospital_code: String,
    pub points: Vec<SeriesPoint>,
}

impl CleanedSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Điểm mới nhất (cuối chuỗi).
    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Chuyển ngược về dạng mẫu thô, giữ nguyên mã bệnh viện.
    pub fn to_samples(&self) -> Vec<RawSample> {
        self.points
            .iter()
            .map(|point| RawSample {
                hospital_code: self.hospital_code.clone(),
                timestamp: point.timestamp,
                total_patients: Some(point.total_patients),
                admitted_in_ed: point.admitted_in_ed,
            })
            .collect()
    }
}

/// Lỗi chung của pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CensusError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("could not parse data: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}
