//! Derived health metrics.
//!
//! Pure functions only: BMI from weight/height and the blood-pressure
//! normality check used when rendering readings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Systolic readings at or above this value are not normal (mmHg)
pub const SYSTOLIC_LIMIT: u16 = 140;

/// Diastolic readings at or above this value are not normal (mmHg)
pub const DIASTOLIC_LIMIT: u16 = 90;

/// Compute body-mass index from weight (kg) and height (cm)
///
/// Returns `None` instead of an error when either input is missing,
/// non-finite, zero or negative, so callers can render a placeholder.
/// The result is rounded to one decimal place.
pub fn compute_bmi(weight: Option<f64>, height: Option<f64>) -> Option<f64> {
    let weight = weight.filter(|w| w.is_finite() && *w > 0.0)?;
    let height = height.filter(|h| h.is_finite() && *h > 0.0)?;

    let height_m = height / 100.0;
    let bmi = weight / (height_m * height_m);
    if !bmi.is_finite() {
        return None;
    }

    Some((bmi * 10.0).round() / 10.0)
}

/// True iff systolic < 140 and diastolic < 90
pub fn is_blood_pressure_normal(systolic: u16, diastolic: u16) -> bool {
    systolic < SYSTOLIC_LIMIT && diastolic < DIASTOLIC_LIMIT
}

/// Blood-pressure classification shown next to each reading
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BloodPressureStatus {
    Normal,
    NotNormal,
}

impl BloodPressureStatus {
    pub fn from_readings(systolic: u16, diastolic: u16) -> Self {
        if is_blood_pressure_normal(systolic, diastolic) {
            BloodPressureStatus::Normal
        } else {
            BloodPressureStatus::NotNormal
        }
    }
}

impl fmt::Display for BloodPressureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BloodPressureStatus::Normal => write!(f, "normal"),
            BloodPressureStatus::NotNormal => write!(f, "not normal"),
        }
    }
}
