//! List filtering and ordering for the record collection.

use serde::Deserialize;

/// Query-string parameters of the list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordQuery {
    /// Whitespace-separated terms; each must match company or sector.
    pub search: Option<String>,
    /// Comma list of sortable fields, `-` prefix for descending.
    pub ordering: Option<String>,
}

/// Fields the list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Year,
    EnergyConsumption,
    Co2Emissions,
}

impl SortField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "year" => Some(Self::Year),
            "energy_consumption_mwh" => Some(Self::EnergyConsumption),
            "co2_emissions_tons" => Some(Self::Co2Emissions),
            _ => None,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Self::Year => "year",
            // Decimals are stored as text
            Self::EnergyConsumption => "CAST(energy_consumption_mwh AS REAL)",
            Self::Co2Emissions => "CAST(co2_emissions_tons AS REAL)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortTerm {
    pub field: SortField,
    pub descending: bool,
}

/// Parse `"-year,co2_emissions_tons"`. Unknown or empty entries are ignored.
pub fn parse_ordering(raw: &str) -> Vec<SortTerm> {
    raw.split(',')
        .map(str::trim)
        .filter_map(|part| {
            let (descending, name) = match part.strip_prefix('-') {
                Some(name) => (true, name),
                None => (false, part),
            };
            SortField::from_name(name).map(|field| SortTerm { field, descending })
        })
        .collect()
}

impl RecordQuery {
    pub fn search_terms(&self) -> Vec<&str> {
        self.search
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// `WHERE` clause (possibly empty) and its bound `LIKE` patterns.
    pub(crate) fn where_clause(&self) -> (String, Vec<String>) {
        let terms = self.search_terms();
        if terms.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut clauses = Vec::with_capacity(terms.len());
        let mut patterns = Vec::with_capacity(terms.len());
        for (i, term) in terms.iter().enumerate() {
            let n = i + 1;
            clauses.push(format!(
                "(company LIKE ?{n} ESCAPE '\\' OR sector LIKE ?{n} ESCAPE '\\')"
            ));
            patterns.push(like_pattern(term));
        }

        (format!(" WHERE {}", clauses.join(" AND ")), patterns)
    }

    /// `ORDER BY` clause; falls back to newest year first, then company.
    pub(crate) fn order_clause(&self) -> String {
        let terms = self
            .ordering
            .as_deref()
            .map(parse_ordering)
            .unwrap_or_default();

        let mut parts: Vec<String> = if terms.is_empty() {
            vec!["year DESC".to_string(), "company ASC".to_string()]
        } else {
            terms
                .iter()
                .map(|t| format!("{} {}", t.field.sql(), if t.descending { "DESC" } else { "ASC" }))
                .collect()
        };
        parts.push("id ASC".to_string());

        format!(" ORDER BY {}", parts.join(", "))
    }
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
