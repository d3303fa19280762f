//! Core domain types for the Vitals journal.
//!
//! This module defines:
//! - Persisted health records and their store-assigned ids
//! - The input shape callers hand to the store
//! - Inclusive date ranges used for trend queries

use crate::metrics::{compute_bmi, BloodPressureStatus};
use crate::{Error, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

// ============================================================================
// Records
// ============================================================================

/// Store-assigned surrogate key. Monotonic and never reused.
pub type RecordId = u64;

/// One day's set of health measurements
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthRecord {
    pub id: RecordId,
    pub date: NaiveDate,
    /// Kilograms
    pub weight: f64,
    /// Centimeters
    pub height: f64,
    pub systolic: u16,
    pub diastolic: u16,
    /// Beats per minute
    pub heart_rate: u16,
    /// Captured with the reading; not recomputed on read
    pub bmi: Option<f64>,
}

impl HealthRecord {
    /// Build a record from an input and the id the store assigned to it
    pub fn from_input(id: RecordId, input: &HealthRecordInput) -> Self {
        Self {
            id,
            date: input.date,
            weight: input.weight,
            height: input.height,
            systolic: input.systolic,
            diastolic: input.diastolic,
            heart_rate: input.heart_rate,
            bmi: input.bmi,
        }
    }

    /// Overwrite every non-key field with the input's values.
    ///
    /// `id` and `date` are left untouched.
    pub fn merge_from(&mut self, input: &HealthRecordInput) {
        self.weight = input.weight;
        self.height = input.height;
        self.systolic = input.systolic;
        self.diastolic = input.diastolic;
        self.heart_rate = input.heart_rate;
        self.bmi = input.bmi;
    }

    pub fn blood_pressure_status(&self) -> BloodPressureStatus {
        BloodPressureStatus::from_readings(self.systolic, self.diastolic)
    }
}

/// A reading as captured, before the store assigns an id
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthRecordInput {
    pub date: NaiveDate,
    pub weight: f64,
    pub height: f64,
    pub systolic: u16,
    pub diastolic: u16,
    pub heart_rate: u16,
    pub bmi: Option<f64>,
}

impl HealthRecordInput {
    /// Capture a reading, deriving BMI from weight and height
    pub fn new(
        date: NaiveDate,
        weight: f64,
        height: f64,
        systolic: u16,
        diastolic: u16,
        heart_rate: u16,
    ) -> Self {
        Self {
            date,
            weight,
            height,
            systolic,
            diastolic,
            heart_rate,
            bmi: compute_bmi(Some(weight), Some(height)),
        }
    }

    /// Check the measurement invariants before the reading is persisted
    pub fn validate(&self) -> Result<()> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(Error::InvalidRecord(format!(
                "weight must be a positive number, got {}",
                self.weight
            )));
        }
        if !self.height.is_finite() || self.height <= 0.0 {
            return Err(Error::InvalidRecord(format!(
                "height must be a positive number, got {}",
                self.height
            )));
        }
        if self.systolic == 0 || self.diastolic == 0 {
            return Err(Error::InvalidRecord(
                "blood pressure readings must be positive".into(),
            ));
        }
        if self.heart_rate == 0 {
            return Err(Error::InvalidRecord("heart rate must be positive".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Date ranges
// ============================================================================

/// Inclusive `[start, end]` date range
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The window ending at `end` and starting `days` days earlier
    ///
    /// Fails when the start would fall before the earliest representable date.
    pub fn trailing_days(end: NaiveDate, days: u32) -> Result<Self> {
        let start = end
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| {
                Error::Config(format!("a {} day window before {} is out of range", days, end))
            })?;
        Ok(Self { start, end })
    }

    /// True when the range can never match (start after end)
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_input_derives_bmi() {
        let input = HealthRecordInput::new(date("2024-01-15"), 70.0, 175.0, 120, 80, 72);
        assert_eq!(input.bmi, Some(22.9));
    }

    #[test]
    fn test_validate_rejects_bad_measurements() {
        let mut input = HealthRecordInput::new(date("2024-01-15"), 70.0, 175.0, 120, 80, 72);
        assert!(input.validate().is_ok());

        input.weight = 0.0;
        assert!(matches!(input.validate(), Err(Error::InvalidRecord(_))));

        input.weight = 70.0;
        input.height = f64::NAN;
        assert!(matches!(input.validate(), Err(Error::InvalidRecord(_))));

        input.height = 175.0;
        input.diastolic = 0;
        assert!(matches!(input.validate(), Err(Error::InvalidRecord(_))));

        input.diastolic = 80;
        input.heart_rate = 0;
        assert!(matches!(input.validate(), Err(Error::InvalidRecord(_))));
    }

    #[test]
    fn test_merge_keeps_id_and_date() {
        let first = HealthRecordInput::new(date("2024-01-15"), 70.0, 175.0, 120, 80, 72);
        let mut record = HealthRecord::from_input(7, &first);

        let mut second = HealthRecordInput::new(date("2024-01-15"), 72.5, 175.0, 135, 85, 80);
        second.date = date("2030-01-01");
        record.merge_from(&second);

        assert_eq!(record.id, 7);
        assert_eq!(record.date, date("2024-01-15"));
        assert_eq!(record.weight, 72.5);
        assert_eq!(record.systolic, 135);
        assert_eq!(record.bmi, second.bmi);
    }

    #[test]
    fn test_record_serializes_iso_date() {
        let input = HealthRecordInput::new(date("2024-03-10"), 70.0, 175.0, 120, 80, 72);
        let record = HealthRecord::from_input(1, &input);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"date\":\"2024-03-10\""));
    }

    #[test]
    fn test_trailing_days_window() {
        let range = DateRange::trailing_days(date("2024-03-31"), 30).unwrap();
        assert_eq!(range.start, date("2024-03-01"));
        assert_eq!(range.end, date("2024-03-31"));
        assert!(!range.is_empty());

        let today_only = DateRange::trailing_days(date("2024-03-31"), 0).unwrap();
        assert_eq!(today_only.start, today_only.end);

        assert!(DateRange::new(date("2024-02-01"), date("2024-01-01")).is_empty());
    }

    #[test]
    fn test_oversized_trailing_window_is_error() {
        let result = DateRange::trailing_days(date("2024-03-10"), u32::MAX);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
