//! Fold parsed rows into one kept row per natural key.
//!
//! ```text
//! Row outcomes (file order)               Kept rows (encounter order)
//! ┌──────────────────────────────────┐    ┌────────────────────────┐
//! │ row 2: A/2023/Energy  total 1500 │    │ A/2023/Energy  (row 3) │
//! │ row 3: A/2023/Energy  total 2800 │ →  │ B/2023/Retail  (row 5) │
//! │ row 4: <parse failure>           │    └────────────────────────┘
//! │ row 5: B/2023/Retail             │    + messages for rows 2 and 4
//! └──────────────────────────────────┘
//! ```
//!
//! On a key collision the row with the strictly greater total impact wins;
//! ties keep the row seen first.

use std::collections::HashMap;

use crate::error::RowFailure;
use crate::models::{NaturalKey, ParsedRow};

/// Result of folding one file's rows.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Surviving rows, positioned where their key was first seen.
    pub kept: Vec<ParsedRow>,
    /// Parse errors and duplicate notices, in row encounter order.
    pub messages: Vec<String>,
}

/// Fold row outcomes strictly in the order given.
pub fn deduplicate<I>(rows: I) -> DedupOutcome
where
    I: IntoIterator<Item = Result<ParsedRow, RowFailure>>,
{
    let mut index: HashMap<NaturalKey, usize> = HashMap::new();
    let mut outcome = DedupOutcome::default();

    for row in rows {
        let row = match row {
            Ok(row) => row,
            Err(failure) => {
                outcome.messages.push(failure.to_string());
                continue;
            }
        };

        let key = row.natural_key();
        match index.get(&key) {
            None => {
                index.insert(key, outcome.kept.len());
                outcome.kept.push(row);
            }
            Some(&slot) => {
                let existing = &mut outcome.kept[slot];
                outcome.messages.push(conflict_notice(&key, existing, &row));
                if row.total_impact() > existing.total_impact() {
                    *existing = row;
                }
            }
        }
    }

    outcome
}

fn conflict_notice(key: &NaturalKey, existing: &ParsedRow, incoming: &ParsedRow) -> String {
    let new_total = incoming.total_impact();
    let existing_total = existing.total_impact();

    if new_total > existing_total {
        format!(
            "Row {}: Duplicate entry for {}. Keeping row {} with higher emissions/energy values \
             (new total: {:.2} vs existing: {:.2})",
            existing.row_number, key, incoming.row_number, new_total, existing_total
        )
    } else {
        format!(
            "Row {}: Duplicate entry for {}. Keeping row {} with higher emissions/energy values \
             (existing total: {:.2} vs new: {:.2})",
            incoming.row_number, key, existing.row_number, existing_total, new_total
        )
    }
}
