//! Diff kept rows against stored records and persist the net changes.

use std::collections::HashMap;

use crate::db::{self, Database};
use crate::error::StoreResult;
use crate::models::{EmissionRecord, NaturalKey, ParsedRow, RecordInput};

/// Net changes for one import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub inserts: Vec<RecordInput>,
    pub updates: Vec<EmissionRecord>,
    /// Rows matching a stored record with identical values.
    pub unchanged: usize,
}

impl ReconcilePlan {
    /// Partition `kept` rows given the stored records sharing their keys.
    pub fn build(kept: &[ParsedRow], mut existing: HashMap<NaturalKey, EmissionRecord>) -> Self {
        let mut plan = Self::default();

        for row in kept {
            match existing.remove(&row.natural_key()) {
                None => plan.inserts.push(RecordInput::from(row)),
                Some(mut stored) if stored.differs_from(row) => {
                    stored.apply_values(row);
                    plan.updates.push(stored);
                }
                Some(_) => plan.unchanged += 1,
            }
        }

        plan
    }
}

/// Counts reported back to the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Look up, diff and write `kept` rows as one transaction.
///
/// Either every insert and update commits, or none does.
pub fn reconcile_and_persist(db: &Database, kept: &[ParsedRow]) -> StoreResult<ReconcileSummary> {
    db.with_transaction(|tx| {
        let keys: Vec<NaturalKey> = kept.iter().map(ParsedRow::natural_key).collect();
        let existing = db::find_by_keys(tx, &keys)?;
        let plan = ReconcilePlan::build(kept, existing);

        for input in &plan.inserts {
            db::insert_record(tx, input)?;
        }
        for record in &plan.updates {
            db::update_record_values(tx, record)?;
        }

        Ok(ReconcileSummary {
            created: plan.inserts.len(),
            updated: plan.updates.len(),
            unchanged: plan.unchanged,
        })
    })
}
