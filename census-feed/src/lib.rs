//! Hospital capacity API payloads to `RawSample`s.
//!
//! The API server has shipped several response shapes over time: a bare
//! array, `{"success": true, "data": [...]}` and `{"status": "success",
//! "data": [...]}`. All of them are accepted here. Individual records are
//! parsed leniently; only the envelope can make a payload malformed.

use census_core::{
    build_report, normalize_code, CensusConfig, CensusError, HistoryWindow, HospitalReport,
    RawSample,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

const COUNT_FIELDS: [&str; 2] = ["total_patients", "patient_count"];
const ADMITTED_FIELD: &str = "admitted_patients_in_ed";
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Request path for one hospital's history over `window`.
pub fn history_path(hospital_code: &str, window: HistoryWindow) -> String {
    format!(
        "/api/hospital-history/{}?days={}",
        normalize_code(hospital_code),
        window.days()
    )
}

/// Request path for the latest snapshot of every hospital.
pub fn snapshot_path() -> &'static str {
    "/api/hospital-data"
}

/// Parse a history response body for `hospital_code`.
pub fn parse_history_str(hospital_code: &str, payload: &str) -> Result<Vec<RawSample>, CensusError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|err| CensusError::Parse(err.to_string()))?;
    parse_history_value(hospital_code, &value)
}

/// Parse an already decoded history response.
pub fn parse_history_value(
    hospital_code: &str,
    payload: &Value,
) -> Result<Vec<RawSample>, CensusError> {
    let code = normalize_code(hospital_code);
    let records = unwrap_envelope(payload)?;

    let samples: Vec<RawSample> = records
        .iter()
        .filter_map(|record| parse_record(&code, record))
        .collect();

    if samples.len() < records.len() {
        debug!(
            hospital = %code,
            skipped = records.len() - samples.len(),
            "skipped history records without a usable timestamp"
        );
    }

    Ok(samples)
}

/// Parse the `/api/hospital-data` snapshot: one latest record per hospital.
pub fn parse_snapshot_str(payload: &str) -> Result<Vec<RawSample>, CensusError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|err| CensusError::Parse(err.to_string()))?;
    parse_snapshot_value(&value)
}

pub fn parse_snapshot_value(payload: &Value) -> Result<Vec<RawSample>, CensusError> {
    let records = unwrap_envelope(payload)?;

    Ok(records
        .iter()
        .filter_map(|record| {
            let code = record.get("hospital_code").and_then(Value::as_str)?;
            parse_record(&normalize_code(code), record)
        })
        .collect())
}

/// Parse a history payload and run it through the cleaner and aggregator.
pub fn summarize_history_str(
    hospital_code: &str,
    payload: &str,
    config: &CensusConfig,
) -> Result<HospitalReport, CensusError> {
    let samples = parse_history_str(hospital_code, payload)?;
    Ok(build_report(hospital_code, &samples, config))
}

fn unwrap_envelope(payload: &Value) -> Result<&[Value], CensusError> {
    if let Some(records) = payload.as_array() {
        return Ok(records);
    }

    let Some(object) = payload.as_object() else {
        return Err(CensusError::Malformed(
            "expected a JSON object or array".to_string(),
        ));
    };

    let succeeded = object.get("success").and_then(Value::as_bool) == Some(true)
        || object.get("status").and_then(Value::as_str) == Some("success");

    if !succeeded {
        let detail = object
            .get("error")
            .or_else(|| object.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("response did not report success");
        return Err(CensusError::Malformed(detail.to_string()));
    }

    object
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| CensusError::Malformed("missing data array".to_string()))
}

fn parse_record(hospital_code: &str, record: &Value) -> Option<RawSample> {
    let timestamp = record
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)?;

    let total_patients = COUNT_FIELDS
        .iter()
        .find_map(|field| record.get(*field).and_then(parse_count));

    Some(RawSample {
        hospital_code: hospital_code.to_string(),
        timestamp,
        total_patients,
        admitted_in_ed: record.get(ADMITTED_FIELD).and_then(parse_count),
    })
}

/// RFC 3339, or a naive ISO-8601 string which the server writes in UTC.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Counts arrive as integers, floats or numeric strings. Anything negative
/// or non-numeric is treated as missing.
fn parse_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => match number.as_u64() {
            Some(count) => Some(u32::try_from(count).unwrap_or(u32::MAX)),
            None => number.as_f64().and_then(count_from_float),
        },
        Value::String(text) => text.trim().parse::<f64>().ok().and_then(count_from_float),
        _ => None,
    }
}

fn count_from_float(value: f64) -> Option<u32> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.round().min(f64::from(u32::MAX)) as u32)
}
