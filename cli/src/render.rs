use std::fmt::Write;

use census_core::{
    describe_elapsed, full_name, peak, CapacityLevel, DashboardSnapshot, HospitalReport,
    HospitalStatus, RawSample,
};
use chrono::{DateTime, FixedOffset, Utc};

fn local(timestamp: DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

pub fn summary_table(snapshot: &DashboardSnapshot, offset: FixedOffset) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "{} summary (generated {})",
        snapshot.window.label(),
        local(snapshot.generated_at, offset)
    );

    if !snapshot.has_any_data() {
        let _ = writeln!(output, "No data available for summary statistics.");
    }

    let _ = writeln!(
        output,
        "{:<6} {:>8} {:>9} {:>8} {:>6} {:>7} {:>9}  {}",
        "Site", "Current", "Admitted", "Average", "Peak", "Lowest", "Trend", "Level"
    );

    for report in &snapshot.hospitals {
        match &report.status {
            HospitalStatus::Ready => {
                let summary = &report.summary;
                let _ = writeln!(
                    output,
                    "{:<6} {:>8} {:>9} {:>8} {:>6} {:>7} {:>2} {:>5.1}%  {}",
                    report.hospital_code,
                    summary.current,
                    summary.current_admitted,
                    summary.average,
                    summary.max,
                    summary.min,
                    summary.trend_direction.arrow(),
                    summary.trend_percent.abs(),
                    report.capacity.label()
                );
            }
            HospitalStatus::NoData { reason } => {
                let _ = writeln!(
                    output,
                    "{:<6} no data{}",
                    report.hospital_code,
                    reason
                        .as_deref()
                        .map(|reason| format!(" ({reason})"))
                        .unwrap_or_default()
                );
            }
        }
    }

    output
}

pub fn history_table(report: &HospitalReport, rows: usize, offset: FixedOffset) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## {} ({})", report.name, report.hospital_code);

    if !report.has_data() {
        let _ = writeln!(output, "No historical data available.");
        return output;
    }

    let cleaning = &report.cleaning;
    let _ = writeln!(
        output,
        "{} -> {} -> {} -> {} data points after filtering",
        cleaning.raw, cleaning.deduplicated, cleaning.in_range, cleaning.smoothed
    );
    if let Some(top) = peak(&report.series) {
        let _ = writeln!(
            output,
            "Peak {} at {}",
            top.total_patients,
            local(top.timestamp, offset)
        );
    }

    let _ = writeln!(
        output,
        "{:<16} {:>8} {:>9} {:>7}",
        "Date/Time", "Patients", "Admitted", "Change"
    );
    for row in report.table_rows(rows) {
        let change = match row.change {
            Some(diff) if diff > 0 => format!("+{diff}"),
            Some(diff) => diff.to_string(),
            None => String::new(),
        };
        let _ = writeln!(
            output,
            "{:<16} {:>8} {:>9} {:>7}",
            local(row.timestamp, offset),
            row.total_patients,
            row.admitted,
            change
        );
    }

    output
}

/// Hospital cards from the `/api/hospital-data` snapshot.
pub fn current_cards(samples: &[RawSample], now: DateTime<Utc>) -> String {
    let mut output = String::new();

    if samples.is_empty() {
        let _ = writeln!(output, "No current data available.");
        return output;
    }

    for sample in samples {
        let patients = sample.patients();
        let _ = writeln!(
            output,
            "{:<34} {:>4} patients  {:<9}  updated {}",
            full_name(&sample.hospital_code),
            patients,
            CapacityLevel::from_patients(patients).label(),
            describe_elapsed(now, sample.timestamp)
        );
    }

    output
}
