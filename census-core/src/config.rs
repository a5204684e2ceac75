//! Cấu hình ngưỡng làm sạch và bảng khoảng hợp lý theo bệnh viện.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hospital::normalize_code;
use crate::time::HistoryWindow;
use crate::CensusError;

/// Khoảng giá trị `[min, max]` (bao gồm hai đầu) coi là hợp lý.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlausibleRange {
    pub min: u32,
    pub max: u32,
}

impl PlausibleRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Khoảng dùng cho mã bệnh viện không có trong bảng.
pub const DEFAULT_RANGE: PlausibleRange = PlausibleRange::new(0, 200);

fn default_ranges() -> BTreeMap<String, PlausibleRange> {
    [
        ("RUH", PlausibleRange::new(15, 120)),
        ("SPH", PlausibleRange::new(5, 80)),
        ("SCH", PlausibleRange::new(0, 60)),
        ("JPCH", PlausibleRange::new(0, 40)),
    ]
    .into_iter()
    .map(|(code, range)| (code.to_string(), range))
    .collect()
}

/// Tham số của bộ làm sạch chuỗi.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleaningConfig {
    /// Hai mẫu cách nhau không quá số phút này mới bị xét nhảy bất thường.
    pub max_gap_minutes: u32,
    /// Tỉ lệ thay đổi tương đối tối đa (0.5 = 50%).
    pub max_relative_change: f64,
    pub default_range: PlausibleRange,
    pub ranges: BTreeMap<String, PlausibleRange>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            max_gap_minutes: 15,
            max_relative_change: 0.5,
            default_range: DEFAULT_RANGE,
            ranges: default_ranges(),
        }
    }
}

impl CleaningConfig {
    /// Khoảng hợp lý của một bệnh viện, rơi về `default_range` nếu chưa cấu hình.
    pub fn range_for(&self, hospital_code: &str) -> PlausibleRange {
        self.ranges
            .get(&normalize_code(hospital_code))
            .copied()
            .unwrap_or(self.default_range)
    }
}

/// Cấu hình toàn bộ pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CensusConfig {
    pub cleaning: CleaningConfig,
    /// Ngưỡng (phần trăm) để xu hướng được coi là tăng hoặc giảm.
    pub trend_threshold_percent: f64,
    /// Số điểm gần nhất cho biểu đồ nhỏ.
    pub recent_points: usize,
    /// Số dòng của bảng lịch sử.
    pub table_rows: usize,
    pub window: HistoryWindow,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            cleaning: CleaningConfig::default(),
            trend_threshold_percent: 5.0,
            recent_points: 15,
            table_rows: 10,
            window: HistoryWindow::default(),
        }
    }
}

impl CensusConfig {
    pub fn validate(&self) -> Result<(), CensusError> {
        let cleaning = &self.cleaning;
        if !cleaning.max_relative_change.is_finite() || cleaning.max_relative_change < 0.0 {
            return Err(CensusError::Config(format!(
                "max_relative_change must be a non-negative number, got {}",
                cleaning.max_relative_change
            )));
        }
        if !self.trend_threshold_percent.is_finite() || self.trend_threshold_percent < 0.0 {
            return Err(CensusError::Config(format!(
                "trend_threshold_percent must be a non-negative number, got {}",
                self.trend_threshold_percent
            )));
        }

        let ranges = std::iter::once(("default", &cleaning.default_range))
            .chain(cleaning.ranges.iter().map(|(code, range)| (code.as_str(), range)));
        for (code, range) in ranges {
            if range.min > range.max {
                return Err(CensusError::Config(format!(
                    "range for {code} has min {} above max {}",
                    range.min, range.max
                )));
            }
        }

        if self.window.days() == 0 {
            return Err(CensusError::Config("window must cover at least one day".into()));
        }

        Ok(())
    }
}

/// Ghi đè từng phần lên cấu hình mặc định (file JSON của CLI, object JS của wasm).
///
/// Khác với deserialize thẳng `CensusConfig`, bảng `ranges` ở đây được gộp
/// vào bảng mặc định thay vì thay thế toàn bộ.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub max_gap_minutes: Option<u32>,
    #[serde(default)]
    pub max_relative_change: Option<f64>,
    #[serde(default)]
    pub default_range: Option<PlausibleRange>,
    #[serde(default)]
    pub ranges: Option<BTreeMap<String, PlausibleRange>>,
    #[serde(default)]
    pub trend_threshold_percent: Option<f64>,
    #[serde(default)]
    pub recent_points: Option<usize>,
    #[serde(default)]
    pub table_rows: Option<usize>,
    #[serde(default)]
    pub window_days: Option<u32>,
}

impl ConfigOverrides {
    pub fn apply(self, mut base: CensusConfig) -> Result<CensusConfig, CensusError> {
        if let Some(minutes) = self.max_gap_minutes {
            base.cleaning.max_gap_minutes = minutes;
        }
        if let Some(change) = self.max_relative_change {
            base.cleaning.max_relative_change = change;
        }
        if let Some(range) = self.default_range {
            base.cleaning.default_range = range;
        }
        if let Some(ranges) = self.ranges {
            base.cleaning.ranges.extend(
                ranges
                    .into_iter()
                    .map(|(code, range)| (normalize_code(&code), range)),
            );
        }
        if let Some(threshold) = self.trend_threshold_percent {
            base.trend_threshold_percent = threshold;
        }
        if let Some(points) = self.recent_points {
            base.recent_points = points;
        }
        if let Some(rows) = self.table_rows {
            base.table_rows = rows;
        }
        if let Some(days) = self.window_days {
            base.window = HistoryWindow::from_days(days);
        }

        base.validate()?;
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let config = CleaningConfig::default();
        assert_eq!(config.max_gap_minutes, 15);
        assert_eq!(config.max_relative_change, 0.5);
        assert_eq!(config.range_for("RUH"), PlausibleRange::new(15, 120));
        assert_eq!(config.range_for("sph"), PlausibleRange::new(5, 80));
        assert_eq!(config.range_for("SCH"), PlausibleRange::new(0, 60));
        assert_eq!(config.range_for("JPCH"), PlausibleRange::new(0, 40));
    }

    #[test]
    fn unknown_hospital_uses_wide_default() {
        let config = CleaningConfig::default();
        assert_eq!(config.range_for("XYZ"), PlausibleRange::new(0, 200));
    }

    #[test]
    fn overrides_merge_range_table() {
        let overrides: ConfigOverrides = serde_json::from_str(
            r#"{"ranges": {"ruh": {"min": 20, "max": 130}}, "max_gap_minutes": 30}"#,
        )
        .unwrap();
        let config = overrides.apply(CensusConfig::default()).unwrap();

        assert_eq!(config.cleaning.max_gap_minutes, 30);
        assert_eq!(config.cleaning.range_for("RUH"), PlausibleRange::new(20, 130));
        assert_eq!(config.cleaning.range_for("SPH"), PlausibleRange::new(5, 80));
    }

    #[test]
    fn overrides_reject_inverted_range() {
        let overrides = ConfigOverrides {
            default_range: Some(PlausibleRange::new(50, 10)),
            ..ConfigOverrides::default()
        };
        assert!(matches!(
            overrides.apply(CensusConfig::default()),
            Err(CensusError::Config(_))
        ));
    }

    #[test]
    fn partial_config_json_keeps_defaults() {
        let config: CensusConfig =
            serde_json::from_str(r#"{"trend_threshold_percent": 10.0}"#).unwrap();
        assert_eq!(config.trend_threshold_percent, 10.0);
        assert_eq!(config.cleaning, CleaningConfig::default());
        assert_eq!(config.recent_points, 15);
    }
}
