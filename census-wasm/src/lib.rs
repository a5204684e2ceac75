//! Bridge WASM <-> JavaScript cho dashboard trình duyệt.

use census_core::{
    CensusConfig, CensusError, ConfigOverrides, DashboardSnapshot, HospitalFetch, HospitalReport,
};
use serde::Deserialize;
use serde_json::Value;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Kết quả tải lịch sử của một bệnh viện do phía JS gửi sang.
///
/// `error` được điền khi fetch thất bại; `payload` là body JSON nguyên bản.
#[derive(Debug, Deserialize)]
struct JsHospitalFetch {
    hospital_code: String,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl From<JsHospitalFetch> for HospitalFetch {
    fn from(fetch: JsHospitalFetch) -> Self {
        let code = fetch.hospital_code;
        match (fetch.error, fetch.payload) {
            (Some(error), _) => HospitalFetch::failed(&code, CensusError::Transport(error)),
            (None, Some(payload)) => match census_feed::parse_history_value(&code, &payload) {
                Ok(samples) => HospitalFetch::ok(&code, samples),
                Err(err) => HospitalFetch::failed(&code, err),
            },
            (None, None) => HospitalFetch::failed(
                &code,
                CensusError::Malformed("no payload received".to_string()),
            ),
        }
    }
}

fn read_config(config: Option<JsValue>) -> Result<CensusConfig, JsValue> {
    let Some(js_cfg) = config else {
        return Ok(CensusConfig::default());
    };
    if js_cfg.is_undefined() || js_cfg.is_null() {
        return Ok(CensusConfig::default());
    }

    let overrides: ConfigOverrides = from_value(js_cfg)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
    overrides
        .apply(CensusConfig::default())
        .map_err(|err| JsValue::from_str(&format_census_error(err)))
}

fn read_payload(payload: JsValue) -> Result<Value, JsValue> {
    from_value::<Value>(payload)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được JSON payload: {err}")))
}

fn write<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|err| JsValue::from_str(&format!("Không serialize kết quả: {err}")))
}

fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Làm sạch body của `/api/hospital-history/{code}` và trả về chuỗi đã lọc.
#[wasm_bindgen]
pub fn clean_history(
    hospital_code: &str,
    payload: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init();
    let cfg = read_config(config)?;
    let payload = read_payload(payload)?;

    let samples = census_feed::parse_history_value(hospital_code, &payload)
        .map_err(|err| JsValue::from_str(&format_census_error(err)))?;
    let series = census_core::clean_series(&samples, hospital_code, &cfg.cleaning);
    write(&series)
}

/// Làm sạch và tổng hợp lịch sử một bệnh viện (chuỗi + thống kê).
#[wasm_bindgen]
pub fn summarize_history(
    hospital_code: &str,
    payload: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init();
    let cfg = read_config(config)?;
    let payload = read_payload(payload)?;

    let samples = census_feed::parse_history_value(hospital_code, &payload)
        .map_err(|err| JsValue::from_str(&format_census_error(err)))?;
    write(&census_core::build_report(hospital_code, &samples, &cfg))
}

/// Dựng snapshot dashboard từ danh sách `{hospital_code, payload?, error?}`.
///
/// Một bệnh viện lỗi chỉ chuyển sang trạng thái `no_data`, không làm hỏng các bệnh viện khác.
#[wasm_bindgen]
pub fn build_dashboard(fetches: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    init();
    let cfg = read_config(config)?;
    let fetches: Vec<JsHospitalFetch> = from_value(fetches)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được danh sách bệnh viện: {err}")))?;

    let snapshot = census_core::build_dashboard(fetches.into_iter().map(Into::into).collect(), &cfg);
    write(&snapshot)
}

/// Dataset biểu đồ cho các bệnh viện đang được bật.
#[wasm_bindgen]
pub fn visible_datasets(snapshot: JsValue, selected: JsValue) -> Result<JsValue, JsValue> {
    init();
    let snapshot: DashboardSnapshot = from_value(snapshot)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được snapshot: {err}")))?;
    let selected: Vec<String> = from_value(selected)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được danh sách chọn: {err}")))?;
    let selected: Vec<&str> = selected.iter().map(String::as_str).collect();

    write(&census_core::visible_datasets(&snapshot, &selected))
}

/// Các dòng bảng lịch sử (mới nhất trước) cho một báo cáo bệnh viện.
#[wasm_bindgen]
pub fn history_table(report: JsValue, limit: Option<usize>) -> Result<JsValue, JsValue> {
    init();
    let report: HospitalReport = from_value(report)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được báo cáo: {err}")))?;
    let limit = limit.unwrap_or(CensusConfig::default().table_rows);
    write(&report.table_rows(limit))
}

fn format_census_error(err: CensusError) -> String {
    format!("Census error: {err}")
}
