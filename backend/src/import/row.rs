//! Row parsing: raw CSV fields to a typed [`ParsedRow`].

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{RowError, RowFailure};
use crate::models::{fits_stored_range, ParsedRow};
use crate::parser::{
    RawRow, HEADER_COMPANY, HEADER_EMISSIONS, HEADER_ENERGY, HEADER_SECTOR, HEADER_YEAR,
    REQUIRED_HEADERS,
};

/// Validate and type one data row.
///
/// All required fields must be present and non-blank after trimming before
/// any numeric parsing is attempted.
pub fn parse_row(raw: &RawRow) -> Result<ParsedRow, RowFailure> {
    parse_fields(raw).map_err(|error| RowFailure {
        row: raw.row_number,
        error,
    })
}

fn parse_fields(raw: &RawRow) -> Result<ParsedRow, RowError> {
    let blank = REQUIRED_HEADERS
        .iter()
        .any(|header| raw.get(header).map_or(true, |v| v.trim().is_empty()));
    if blank {
        return Err(RowError::MissingFields);
    }

    Ok(ParsedRow {
        company: trimmed(raw, HEADER_COMPANY).to_string(),
        year: parse_year(trimmed(raw, HEADER_YEAR))?,
        sector: trimmed(raw, HEADER_SECTOR).to_string(),
        energy_consumption_mwh: parse_decimal(HEADER_ENERGY, trimmed(raw, HEADER_ENERGY))?,
        co2_emissions_tons: parse_decimal(HEADER_EMISSIONS, trimmed(raw, HEADER_EMISSIONS))?,
        row_number: raw.row_number,
    })
}

fn trimmed<'a>(raw: &'a RawRow, header: &str) -> &'a str {
    raw.get(header).map(str::trim).unwrap_or_default()
}

/// Base-10 integer, no separators.
fn parse_year(value: &str) -> Result<i32, RowError> {
    value.parse::<i32>().map_err(|_| RowError::InvalidFormat {
        field: HEADER_YEAR,
        value: value.to_string(),
    })
}

/// Decimal with `.` or `,` as the separator; every `,` is read as `.`.
/// Plain and scientific notation are accepted. Values outside the stored
/// range are rejected like unparsable ones.
fn parse_decimal(field: &'static str, value: &str) -> Result<Decimal, RowError> {
    let invalid = || RowError::InvalidFormat {
        field,
        value: value.to_string(),
    };
    let normalized = value.replace(',', ".");
    let parsed = Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|_| invalid())?;
    if !fits_stored_range(parsed) {
        return Err(invalid());
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn raw(values: [&str; 5]) -> RawRow {
        let fields: HashMap<String, String> = REQUIRED_HEADERS
            .iter()
            .zip(values)
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        RawRow { row_number: 2, fields }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_valid_row_is_trimmed_and_typed() {
        let fields = ["  Company A ", " 2023", "Energy ", "1000.50", "500,25"];
        let row = parse_row(&raw(fields)).unwrap();
        assert_eq!(row.company, "Company A");
        assert_eq!(row.year, 2023);
        assert_eq!(row.sector, "Energy");
        assert_eq!(row.energy_consumption_mwh, dec("1000.50"));
        assert_eq!(row.co2_emissions_tons, dec("500.25"));
        assert_eq!(row.row_number, 2);
    }

    #[test]
    fn test_blank_field_is_missing() {
        let failure = parse_row(&raw(["", "2023", "Energy", "1", "2"])).unwrap_err();
        assert_eq!(failure.row, 2);
        assert_eq!(failure.error, RowError::MissingFields);

        let failure = parse_row(&raw(["A", "2023", "   ", "1", "2"])).unwrap_err();
        assert_eq!(failure.error, RowError::MissingFields);
    }

    #[test]
    fn test_missing_fields_checked_before_numbers() {
        let failure = parse_row(&raw(["A", "not-a-year", "", "1", "2"])).unwrap_err();
        assert_eq!(failure.error, RowError::MissingFields);
    }

    #[test]
    fn test_absent_column_is_missing() {
        let mut row = raw(["A", "2023", "Energy", "1", "2"]);
        row.fields.remove(HEADER_EMISSIONS);
        assert_eq!(parse_row(&row).unwrap_err().error, RowError::MissingFields);
    }

    #[test]
    fn test_invalid_year() {
        let failure = parse_row(&raw(["A", "2023abc", "Energy", "1", "2"])).unwrap_err();
        assert_eq!(
            failure.error,
            RowError::InvalidFormat { field: HEADER_YEAR, value: "2023abc".into() }
        );
        assert!(parse_row(&raw(["A", "2.023", "Energy", "1", "2"])).is_err());
        assert!(parse_row(&raw(["A", "2,023", "Energy", "1", "2"])).is_err());
    }

    #[test]
    fn test_invalid_energy_and_emissions() {
        let failure = parse_row(&raw(["A", "2023", "Energy", "invalid", "2"])).unwrap_err();
        assert!(matches!(failure.error, RowError::InvalidFormat { field: HEADER_ENERGY, .. }));

        let failure = parse_row(&raw(["A", "2023", "Energy", "1", "not_a_number"])).unwrap_err();
        assert!(matches!(failure.error, RowError::InvalidFormat { field: HEADER_EMISSIONS, .. }));
    }

    #[test]
    fn test_values_beyond_ten_integer_digits_rejected() {
        let row = parse_row(&raw(["A", "2023", "Energy", "9999999999.99", "1"])).unwrap();
        assert_eq!(row.energy_consumption_mwh, dec("9999999999.99"));

        let failure = parse_row(&raw(["A", "2023", "Energy", "12345678901", "1"])).unwrap_err();
        assert_eq!(
            failure.error,
            RowError::InvalidFormat { field: HEADER_ENERGY, value: "12345678901".into() }
        );

        let failure = parse_row(&raw(["A", "2023", "Energy", "1", "5e28"])).unwrap_err();
        assert!(matches!(failure.error, RowError::InvalidFormat { field: HEADER_EMISSIONS, .. }));
    }

    #[test]
    fn test_thousands_separator_rejected() {
        // "1,000.50" becomes "1.000.50"
        let failure = parse_row(&raw(["A", "2023", "Energy", "1,000.50", "2"])).unwrap_err();
        assert!(matches!(failure.error, RowError::InvalidFormat { .. }));
    }

    #[test]
    fn test_scientific_and_negative_values() {
        let row = parse_row(&raw(["A", "2023", "Energy", "1e3", "-2,5"])).unwrap();
        assert_eq!(row.energy_consumption_mwh, dec("1000"));
        assert_eq!(row.co2_emissions_tons, dec("-2.5"));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(parse_row(&raw(["A", "2023", "Energy", "inf", "2"])).is_err());
        assert!(parse_row(&raw(["A", "2023", "Energy", "1", "NaN"])).is_err());
    }
}
