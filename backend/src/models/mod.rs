//! Domain models for EcoTrack.
//!
//! - [`EmissionRecord`] - persisted emissions entry
//! - [`NaturalKey`] - the `(company, year, sector)` identity of a record
//! - [`RecordInput`] / [`RecordPatch`] - direct create/update payloads
//! - [`ParsedRow`] - a validated CSV row, alive only during one import

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

/// Number of decimal places kept for stored energy and emissions values.
pub const STORED_DECIMAL_PLACES: u32 = 2;

/// Largest number of integer digits a stored value may carry.
pub const MAX_INTEGER_DIGITS: u32 = 10;

/// Whether `value`, once rounded to stored precision, keeps at most
/// [`MAX_INTEGER_DIGITS`] integer digits.
pub fn fits_stored_range(value: Decimal) -> bool {
    let limit = Decimal::from(10_i64.pow(MAX_INTEGER_DIGITS));
    value.abs().round_dp(STORED_DECIMAL_PLACES) < limit
}

/// Round to the stored precision and fix the scale, so `1000.5` renders as `1000.50`.
pub fn to_stored_precision(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp(STORED_DECIMAL_PLACES);
    rounded.rescale(STORED_DECIMAL_PLACES);
    rounded
}

// =============================================================================
// Natural Key
// =============================================================================

/// Unique identity of an emissions record.
///
/// Matching is exact on the trimmed strings: case and inner whitespace matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub company: String,
    pub year: i32,
    pub sector: String,
}

impl NaturalKey {
    pub fn new(company: impl Into<String>, year: i32, sector: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            year,
            sector: sector.into(),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (year {}, sector {})", self.company, self.year, self.sector)
    }
}

// =============================================================================
// Emission Record
// =============================================================================

/// A stored emissions entry. Decimal fields serialize as strings (`"1000.50"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub id: i64,
    pub company: String,
    pub year: i32,
    pub sector: String,
    pub energy_consumption_mwh: Decimal,
    pub co2_emissions_tons: Decimal,
}

impl EmissionRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.company.clone(), self.year, self.sector.clone())
    }

    /// Whether `row` carries different tracked values once rounded to stored precision.
    pub fn differs_from(&self, row: &ParsedRow) -> bool {
        self.energy_consumption_mwh != to_stored_precision(row.energy_consumption_mwh)
            || self.co2_emissions_tons != to_stored_precision(row.co2_emissions_tons)
    }

    /// Overwrite the mutable fields with the values of `row`.
    pub fn apply_values(&mut self, row: &ParsedRow) {
        self.energy_consumption_mwh = to_stored_precision(row.energy_consumption_mwh);
        self.co2_emissions_tons = to_stored_precision(row.co2_emissions_tons);
    }
}

// =============================================================================
// Direct create / update payloads
// =============================================================================

/// Full set of fields for creating or replacing a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInput {
    pub company: String,
    pub year: i32,
    pub sector: String,
    pub energy_consumption_mwh: Decimal,
    pub co2_emissions_tons: Decimal,
}

impl RecordInput {
    /// Trim text fields, reject blanks and round decimals to stored precision.
    pub fn normalized(self) -> Result<Self, StoreError> {
        let company = self.company.trim().to_string();
        let sector = self.sector.trim().to_string();
        if company.is_empty() {
            return Err(StoreError::Invalid("company must not be blank".into()));
        }
        if sector.is_empty() {
            return Err(StoreError::Invalid("sector must not be blank".into()));
        }
        for (field, value) in [
            ("energy_consumption_mwh", self.energy_consumption_mwh),
            ("co2_emissions_tons", self.co2_emissions_tons),
        ] {
            if !fits_stored_range(value) {
                return Err(StoreError::Invalid(format!(
                    "{field} must have at most {MAX_INTEGER_DIGITS} integer digits"
                )));
            }
        }
        Ok(Self {
            company,
            year: self.year,
            sector,
            energy_consumption_mwh: to_stored_precision(self.energy_consumption_mwh),
            co2_emissions_tons: to_stored_precision(self.co2_emissions_tons),
        })
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.company.clone(), self.year, self.sector.clone())
    }
}

impl From<&ParsedRow> for RecordInput {
    fn from(row: &ParsedRow) -> Self {
        Self {
            company: row.company.clone(),
            year: row.year,
            sector: row.sector.clone(),
            energy_consumption_mwh: to_stored_precision(row.energy_consumption_mwh),
            co2_emissions_tons: to_stored_precision(row.co2_emissions_tons),
        }
    }
}

/// Partial update: only present fields change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPatch {
    pub company: Option<String>,
    pub year: Option<i32>,
    pub sector: Option<String>,
    pub energy_consumption_mwh: Option<Decimal>,
    pub co2_emissions_tons: Option<Decimal>,
}

impl RecordPatch {
    /// Merge onto an existing record, producing a full input.
    pub fn merge(self, current: &EmissionRecord) -> RecordInput {
        RecordInput {
            company: self.company.unwrap_or_else(|| current.company.clone()),
            year: self.year.unwrap_or(current.year),
            sector: self.sector.unwrap_or_else(|| current.sector.clone()),
            energy_consumption_mwh: self
                .energy_consumption_mwh
                .unwrap_or(current.energy_consumption_mwh),
            co2_emissions_tons: self.co2_emissions_tons.unwrap_or(current.co2_emissions_tons),
        }
    }
}

// =============================================================================
// Parsed Row
// =============================================================================

/// A CSV data row that passed field validation.
///
/// Numeric values keep the precision found in the file; rounding happens on write.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub company: String,
    pub year: i32,
    pub sector: String,
    pub energy_consumption_mwh: Decimal,
    pub co2_emissions_tons: Decimal,
    /// Position in the file, the header being row 1.
    pub row_number: usize,
}

impl ParsedRow {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.company.clone(), self.year, self.sector.clone())
    }

    /// Energy plus emissions, the metric used to pick between in-file duplicates.
    ///
    /// Saturates at [`Decimal::MAX`] instead of overflowing.
    pub fn total_impact(&self) -> Decimal {
        self.energy_consumption_mwh.saturating_add(self.co2_emissions_tons)
    }
}
