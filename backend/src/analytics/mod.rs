//! Dashboard aggregates over the stored records.
//!
//! Everything is computed in [`Decimal`]; sums are exact below
//! [`Decimal::MAX`] and saturate there, averages and ratios are rounded on
//! output. Ties in descending series are broken by
//! name so responses are stable.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::models::{to_stored_precision, EmissionRecord};

/// Default length of the top emitters series.
pub const DEFAULT_TOP_EMITTERS: usize = 5;

/// Decimal places of the efficiency ratio.
const EFFICIENCY_DECIMAL_PLACES: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_emissions: Decimal,
    pub total_energy: Decimal,
    pub companies: usize,
    pub average_emissions_per_company: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTotal {
    pub year: i32,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorTotal {
    pub sector: String,
    pub emissions: Decimal,
    pub energy: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyAverage {
    pub company: String,
    pub average: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyTotal {
    pub company: String,
    pub total: Decimal,
}

/// Tons of CO2 per MWh for one company.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyEfficiency {
    pub company: String,
    pub efficiency: Decimal,
}

/// Body of `GET /api/emissions/stats/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub overview: Overview,
    /// Ascending by year.
    pub emissions_by_year: Vec<YearTotal>,
    /// Descending by emissions.
    pub emissions_by_sector: Vec<SectorTotal>,
    /// Descending by average energy.
    pub average_energy_by_company: Vec<CompanyAverage>,
    pub top_emitters: Vec<CompanyTotal>,
    /// Descending by ratio. Companies without energy use are left out.
    pub energy_efficiency: Vec<CompanyEfficiency>,
}

#[derive(Default)]
struct CompanyAcc {
    energy: Decimal,
    emissions: Decimal,
    rows: u32,
}

/// Sums saturate at [`Decimal::MAX`] rather than panic.
fn accumulate(acc: &mut Decimal, value: Decimal) {
    *acc = acc.saturating_add(value);
}

impl DashboardStats {
    pub fn compute(records: &[EmissionRecord], top: usize) -> Self {
        let mut by_year: BTreeMap<i32, Decimal> = BTreeMap::new();
        let mut by_sector: HashMap<&str, (Decimal, Decimal)> = HashMap::new();
        let mut by_company: HashMap<&str, CompanyAcc> = HashMap::new();
        let mut total_emissions = Decimal::ZERO;
        let mut total_energy = Decimal::ZERO;

        for record in records {
            let co2 = record.co2_emissions_tons;
            let energy = record.energy_consumption_mwh;
            accumulate(&mut total_emissions, co2);
            accumulate(&mut total_energy, energy);

            accumulate(by_year.entry(record.year).or_default(), co2);

            let sector = by_sector.entry(record.sector.as_str()).or_default();
            accumulate(&mut sector.0, co2);
            accumulate(&mut sector.1, energy);

            let company = by_company.entry(record.company.as_str()).or_default();
            accumulate(&mut company.emissions, co2);
            accumulate(&mut company.energy, energy);
            company.rows += 1;
        }

        let companies = by_company.len();
        let average_emissions_per_company = if companies == 0 {
            Decimal::ZERO
        } else {
            to_stored_precision(total_emissions / Decimal::from(companies))
        };

        let emissions_by_year = by_year
            .into_iter()
            .map(|(year, total)| YearTotal { year, total })
            .collect();

        let mut emissions_by_sector: Vec<SectorTotal> = by_sector
            .into_iter()
            .map(|(sector, (emissions, energy))| SectorTotal {
                sector: sector.to_string(),
                emissions,
                energy,
            })
            .collect();
        emissions_by_sector
            .sort_by(|a, b| b.emissions.cmp(&a.emissions).then_with(|| a.sector.cmp(&b.sector)));

        let mut average_energy_by_company: Vec<CompanyAverage> = by_company
            .iter()
            .map(|(company, acc)| CompanyAverage {
                company: company.to_string(),
                average: to_stored_precision(acc.energy / Decimal::from(acc.rows)),
            })
            .collect();
        average_energy_by_company
            .sort_by(|a, b| b.average.cmp(&a.average).then_with(|| a.company.cmp(&b.company)));

        let mut top_emitters: Vec<CompanyTotal> = by_company
            .iter()
            .map(|(company, acc)| CompanyTotal {
                company: company.to_string(),
                total: acc.emissions,
            })
            .collect();
        top_emitters.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.company.cmp(&b.company)));
        top_emitters.truncate(top);

        let mut energy_efficiency: Vec<CompanyEfficiency> = by_company
            .iter()
            .filter_map(|(company, acc)| {
                let ratio = acc.emissions.checked_div(acc.energy)?;
                Some(CompanyEfficiency {
                    company: company.to_string(),
                    efficiency: ratio.round_dp(EFFICIENCY_DECIMAL_PLACES),
                })
            })
            .collect();
        energy_efficiency.sort_by(|a, b| {
            b.efficiency
                .cmp(&a.efficiency)
                .then_with(|| a.company.cmp(&b.company))
        });

        Self {
            overview: Overview {
                total_emissions,
                total_energy,
                companies,
                average_emissions_per_company,
            },
            emissions_by_year,
            emissions_by_sector,
            average_energy_by_company,
            top_emitters,
            energy_efficiency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn record(company: &str, year: i32, sector: &str, energy: &str, co2: &str) -> EmissionRecord {
        EmissionRecord {
            id: 0,
            company: company.into(),
            year,
            sector: sector.into(),
            energy_consumption_mwh: dec(energy),
            co2_emissions_tons: dec(co2),
        }
    }

    fn sample() -> Vec<EmissionRecord> {
        vec![
            record("A", 2023, "Energy", "1000", "500"),
            record("A", 2022, "Energy", "3000", "700"),
            record("B", 2023, "Retail", "200", "100"),
            record("C", 2021, "Retail", "0", "50"),
        ]
    }

    #[test]
    fn test_empty_store() {
        let stats = DashboardStats::compute(&[], DEFAULT_TOP_EMITTERS);
        assert_eq!(stats.overview.companies, 0);
        assert_eq!(stats.overview.average_emissions_per_company, Decimal::ZERO);
        assert!(stats.emissions_by_year.is_empty());
        assert!(stats.top_emitters.is_empty());
    }

    #[test]
    fn test_overview() {
        let stats = DashboardStats::compute(&sample(), DEFAULT_TOP_EMITTERS);
        assert_eq!(stats.overview.total_emissions, dec("1350"));
        assert_eq!(stats.overview.total_energy, dec("4200"));
        assert_eq!(stats.overview.companies, 3);
        assert_eq!(stats.overview.average_emissions_per_company, dec("450.00"));
    }

    #[test]
    fn test_years_ascending() {
        let stats = DashboardStats::compute(&sample(), DEFAULT_TOP_EMITTERS);
        let years: Vec<i32> = stats.emissions_by_year.iter().map(|y| y.year).collect();
        assert_eq!(years, vec![2021, 2022, 2023]);
        assert_eq!(stats.emissions_by_year[2].total, dec("600"));
    }

    #[test]
    fn test_sectors_descending() {
        let stats = DashboardStats::compute(&sample(), DEFAULT_TOP_EMITTERS);
        assert_eq!(stats.emissions_by_sector[0].sector, "Energy");
        assert_eq!(stats.emissions_by_sector[0].emissions, dec("1200"));
        assert_eq!(stats.emissions_by_sector[0].energy, dec("4000"));
        assert_eq!(stats.emissions_by_sector[1].sector, "Retail");
    }

    #[test]
    fn test_average_energy_per_company() {
        let stats = DashboardStats::compute(&sample(), DEFAULT_TOP_EMITTERS);
        let first = &stats.average_energy_by_company[0];
        assert_eq!(first.company, "A");
        assert_eq!(first.average, dec("2000.00"));
    }

    #[test]
    fn test_top_emitters_truncated() {
        let stats = DashboardStats::compute(&sample(), 2);
        let names: Vec<&str> = stats.top_emitters.iter().map(|c| c.company.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(stats.top_emitters[0].total, dec("1200"));
    }

    #[test]
    fn test_sums_beyond_decimal_range_saturate() {
        let huge = Decimal::from_scientific("5e28").unwrap();
        let mut records = vec![
            record("A", 2023, "Energy", "0", "1"),
            record("B", 2023, "Energy", "0", "1"),
        ];
        for r in &mut records {
            r.energy_consumption_mwh = huge;
        }

        let stats = DashboardStats::compute(&records, DEFAULT_TOP_EMITTERS);

        assert_eq!(stats.overview.total_energy, Decimal::MAX);
        assert_eq!(stats.emissions_by_sector[0].energy, Decimal::MAX);
        assert_eq!(stats.overview.total_emissions, dec("2"));
    }

    #[test]
    fn test_efficiency_skips_zero_energy() {
        let stats = DashboardStats::compute(&sample(), DEFAULT_TOP_EMITTERS);
        let names: Vec<&str> = stats.energy_efficiency.iter().map(|c| c.company.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(stats.energy_efficiency[0].efficiency, dec("0.5"));
        assert_eq!(stats.energy_efficiency[1].efficiency, dec("0.3"));
    }
}
