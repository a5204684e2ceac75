//! Danh mục bệnh viện và mức độ đông đúc của khoa cấp cứu.

use serde::{Deserialize, Serialize};

/// Một cơ sở được dashboard theo dõi.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hospital {
    pub code: &'static str,
    pub name: &'static str,
}

pub const HOSPITALS: [Hospital; 4] = [
    Hospital {
        code: "RUH",
        name: "Royal University Hospital",
    },
    Hospital {
        code: "SPH",
        name: "St. Paul's Hospital",
    },
    Hospital {
        code: "SCH",
        name: "Saskatoon City Hospital",
    },
    Hospital {
        code: "JPCH",
        name: "Jim Pattison Children's Hospital",
    },
];

/// Chuẩn hoá mã bệnh viện: bỏ khoảng trắng, viết hoa.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Tên đầy đủ của bệnh viện; trả lại chính mã nếu không có trong danh mục.
pub fn full_name(code: &str) -> String {
    let normalized = normalize_code(code);
    HOSPITALS
        .iter()
        .find(|hospital| hospital.code == normalized)
        .map(|hospital| hospital.name.to_string())
        .unwrap_or(normalized)
}

/// Tra ngược mã từ tên đầy đủ (không phân biệt hoa thường).
pub fn code_for_name(name: &str) -> Option<&'static str> {
    let wanted = name.trim();
    HOSPITALS
        .iter()
        .find(|hospital| hospital.name.eq_ignore_ascii_case(wanted))
        .map(|hospital| hospital.code)
}

/// Mức độ đông đúc hiển thị trên thẻ bệnh viện.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CapacityLevel {
    Quiet,
    Moderate,
    Busy,
    VeryBusy,
}

impl CapacityLevel {
    pub fn from_patients(patients: u32) -> Self {
        match patients {
            70.. => Self::VeryBusy,
            50..=69 => Self::Busy,
            30..=49 => Self::Moderate,
            _ => Self::Quiet,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Quiet => "Quiet",
            Self::Moderate => "Moderate",
            Self::Busy => "Busy",
            Self::VeryBusy => "Very Busy",
        }
    }
}
