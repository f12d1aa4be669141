//! SQLite-backed record store.
//!
//! [`Database`] owns one connection behind a mutex and exposes record CRUD.
//! The free functions take a `&Connection` so they run unchanged inside a
//! transaction opened with [`Database::with_transaction`].

pub mod query;

use rusqlite::{
    ffi, params,
    types::{Type, ValueRef},
    Connection, OptionalExtension, ToSql, Transaction, TransactionBehavior,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::models::{EmissionRecord, NaturalKey, RecordInput};

pub use query::{parse_ordering, RecordQuery, SortField, SortTerm};

const COLUMNS: &str = "id, company, year, sector, energy_consumption_mwh, co2_emissions_tons";

/// Natural keys per bulk lookup statement (three bound parameters each).
const KEY_LOOKUP_CHUNK: usize = 300;

/// Shared handle to the record store. Cloning shares the connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (and initialize) the database at `path`. `:memory:` opens a private in-memory store.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        info!("Opened database at {:?}", path);
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Run `f` inside one write transaction.
    ///
    /// The write lock is taken up front. Only a successful return commits;
    /// any error (or panic) drops the transaction, which rolls it back.
    pub fn with_transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn list(&self, query: &RecordQuery) -> StoreResult<Vec<EmissionRecord>> {
        let conn = self.lock()?;
        list_records(&conn, query)
    }

    pub fn get(&self, id: i64) -> StoreResult<EmissionRecord> {
        let conn = self.lock()?;
        get_record(&conn, id)?.ok_or(StoreError::NotFound(id))
    }

    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM emission_records", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    pub fn create(&self, input: RecordInput) -> StoreResult<EmissionRecord> {
        let input = input.normalized()?;
        let conn = self.lock()?;
        let id = insert_record(&conn, &input)?;
        debug!(id, key = %input.natural_key(), "created record");
        get_record(&conn, id)?.ok_or(StoreError::NotFound(id))
    }

    /// Replace every field of record `id`.
    pub fn update(&self, id: i64, input: RecordInput) -> StoreResult<EmissionRecord> {
        let input = input.normalized()?;
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE emission_records
                 SET company = ?1, year = ?2, sector = ?3,
                     energy_consumption_mwh = ?4, co2_emissions_tons = ?5
                 WHERE id = ?6",
                params![
                    input.company,
                    input.year,
                    input.sector,
                    input.energy_consumption_mwh.to_string(),
                    input.co2_emissions_tons.to_string(),
                    id,
                ],
            )
            .map_err(|e| constraint_to_duplicate(e, &input.natural_key()))?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        get_record(&conn, id)?.ok_or(StoreError::NotFound(id))
    }

    pub fn delete(&self, id: i64) -> StoreResult<()> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM emission_records WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

pub fn list_records(conn: &Connection, query: &RecordQuery) -> StoreResult<Vec<EmissionRecord>> {
    let (where_clause, patterns) = query.where_clause();
    let sql = format!(
        "SELECT {COLUMNS} FROM emission_records{where_clause}{}",
        query.order_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = patterns.iter().map(|p| p as &dyn ToSql).collect();
    let records = stmt
        .query_map(params.as_slice(), row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

pub fn get_record(conn: &Connection, id: i64) -> StoreResult<Option<EmissionRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM emission_records WHERE id = ?1"),
            [id],
            row_to_record,
        )
        .optional()?;
    Ok(record)
}

/// Fetch every stored record whose natural key is in `keys`.
pub fn find_by_keys(
    conn: &Connection,
    keys: &[NaturalKey],
) -> StoreResult<HashMap<NaturalKey, EmissionRecord>> {
    let mut found = HashMap::with_capacity(keys.len());

    for chunk in keys.chunks(KEY_LOOKUP_CHUNK) {
        let placeholders = vec!["(?, ?, ?)"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT {COLUMNS} FROM emission_records
             WHERE (company, year, sector) IN (VALUES {placeholders})"
        );
        let params: Vec<&dyn ToSql> = chunk
            .iter()
            .flat_map(|k| [&k.company as &dyn ToSql, &k.year, &k.sector])
            .collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), row_to_record)?;
        for record in rows {
            let record = record?;
            found.insert(record.natural_key(), record);
        }
    }

    Ok(found)
}

/// Insert one record. Values must already be at stored precision.
pub fn insert_record(conn: &Connection, input: &RecordInput) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO emission_records
            (company, year, sector, energy_consumption_mwh, co2_emissions_tons)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            input.company,
            input.year,
            input.sector,
            input.energy_consumption_mwh.to_string(),
            input.co2_emissions_tons.to_string(),
        ],
    )
    .map_err(|e| constraint_to_duplicate(e, &input.natural_key()))?;

    Ok(conn.last_insert_rowid())
}

/// Write the numeric fields of an existing record.
pub fn update_record_values(conn: &Connection, record: &EmissionRecord) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE emission_records
         SET energy_consumption_mwh = ?1, co2_emissions_tons = ?2
         WHERE id = ?3",
        params![
            record.energy_consumption_mwh.to_string(),
            record.co2_emissions_tons.to_string(),
            record.id,
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(record.id));
    }
    Ok(())
}

fn constraint_to_duplicate(err: rusqlite::Error, key: &NaturalKey) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::Duplicate(key.clone())
        }
        other => StoreError::Sqlite(other),
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<EmissionRecord> {
    Ok(EmissionRecord {
        id: row.get(0)?,
        company: row.get(1)?,
        year: row.get(2)?,
        sector: row.get(3)?,
        energy_consumption_mwh: get_decimal_value(row, 4)?,
        co2_emissions_tons: get_decimal_value(row, 5)?,
    })
}

/// Read a Decimal column (handles TEXT, INTEGER and REAL storage).
fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Decimal> {
    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
            })?;
            Decimal::from_str(s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
            })
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => Decimal::try_from(f).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Real, Box::new(e))
        }),
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            other.data_type(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn input(company: &str, year: i32, sector: &str, energy: &str, co2: &str) -> RecordInput {
        RecordInput {
            company: company.into(),
            year,
            sector: sector.into(),
            energy_consumption_mwh: dec(energy),
            co2_emissions_tons: dec(co2),
        }
    }

    #[test]
    fn test_create_rounds_and_reads_back() {
        let db = Database::open_in_memory().unwrap();
        let record = db.create(input(" Company A ", 2023, "Energy", "1000.5", "500.254")).unwrap();

        assert_eq!(record.company, "Company A");
        assert_eq!(record.energy_consumption_mwh.to_string(), "1000.50");
        assert_eq!(record.co2_emissions_tons.to_string(), "500.25");
        assert_eq!(db.get(record.id).unwrap(), record);
    }

    #[test]
    fn test_natural_key_is_unique() {
        let db = Database::open_in_memory().unwrap();
        db.create(input("A", 2023, "Energy", "1", "1")).unwrap();

        let err = db.create(input("A", 2023, "Energy", "2", "2")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        // Same company and year in another sector is a different record
        db.create(input("A", 2023, "Retail", "2", "2")).unwrap();
        assert_eq!(db.count().unwrap(), 2);
    }

    #[test]
    fn test_update_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let record = db.create(input("A", 2023, "Energy", "1", "1")).unwrap();

        let updated = db.update(record.id, input("A", 2024, "Energy", "3", "4")).unwrap();
        assert_eq!(updated.year, 2024);
        assert_eq!(updated.co2_emissions_tons, dec("4"));

        db.delete(record.id).unwrap();
        assert!(matches!(db.get(record.id), Err(StoreError::NotFound(_))));
        assert!(matches!(db.delete(record.id), Err(StoreError::NotFound(_))));
        assert!(matches!(
            db.update(record.id, input("A", 2023, "Energy", "1", "1")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_find_by_keys_matches_exactly() {
        let db = Database::open_in_memory().unwrap();
        db.create(input("A", 2023, "Energy", "1", "1")).unwrap();
        db.create(input("B", 2023, "Energy", "1", "1")).unwrap();

        let keys = vec![
            NaturalKey::new("A", 2023, "Energy"),
            NaturalKey::new("a", 2023, "Energy"),
            NaturalKey::new("B", 2022, "Energy"),
        ];
        let found = db.with_transaction(|tx| find_by_keys(tx, &keys)).unwrap();

        assert_eq!(found.len(), 1);
        assert!(found.contains_key(&NaturalKey::new("A", 2023, "Energy")));
    }

    #[test]
    fn test_find_by_keys_spans_chunks() {
        let db = Database::open_in_memory().unwrap();
        let keys: Vec<NaturalKey> = (0..(KEY_LOOKUP_CHUNK + 25))
            .map(|i| NaturalKey::new(format!("Company {i}"), 2023, "Energy"))
            .collect();
        db.with_transaction(|tx| {
            for key in &keys {
                insert_record(tx, &input(&key.company, key.year, &key.sector, "1.00", "2.00"))?;
            }
            Ok(())
        })
        .unwrap();

        let found = db.with_transaction(|tx| find_by_keys(tx, &keys)).unwrap();
        assert_eq!(found.len(), keys.len());
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();

        let result: StoreResult<()> = db.with_transaction(|tx| {
            insert_record(tx, &input("A", 2023, "Energy", "1.00", "1.00"))?;
            insert_record(tx, &input("B", 2023, "Energy", "1.00", "1.00"))?;
            // Clashes with the first insert
            insert_record(tx, &input("A", 2023, "Energy", "9.00", "9.00"))?;
            Ok(())
        });

        assert!(matches!(result, Err(StoreError::Duplicate(_))));
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn test_list_search_and_ordering() {
        let db = Database::open_in_memory().unwrap();
        db.create(input("Acme Steel", 2022, "Manufacturing", "100", "900")).unwrap();
        db.create(input("Borealis", 2023, "Energy", "300", "50")).unwrap();
        db.create(input("Cargo Co", 2021, "Logistics", "200", "10.5")).unwrap();

        let all = db.list(&RecordQuery::default()).unwrap();
        let years: Vec<i32> = all.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2023, 2022, 2021]);

        let by_sector = db
            .list(&RecordQuery { search: Some("energy".into()), ..Default::default() })
            .unwrap();
        assert_eq!(by_sector.len(), 1);
        assert_eq!(by_sector[0].company, "Borealis");

        let by_company = db
            .list(&RecordQuery { search: Some("STEEL".into()), ..Default::default() })
            .unwrap();
        assert_eq!(by_company[0].company, "Acme Steel");

        // Numeric, not lexicographic: 10.5 < 50 < 900
        let by_emissions = db
            .list(&RecordQuery {
                ordering: Some("co2_emissions_tons".into()),
                ..Default::default()
            })
            .unwrap();
        let companies: Vec<&str> = by_emissions.iter().map(|r| r.company.as_str()).collect();
        assert_eq!(companies, vec!["Cargo Co", "Borealis", "Acme Steel"]);

        let by_energy_desc = db
            .list(&RecordQuery {
                ordering: Some("-energy_consumption_mwh".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_energy_desc[0].company, "Borealis");
    }

    #[test]
    fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");

        Database::open(&path)
            .unwrap()
            .create(input("A", 2023, "Energy", "1", "2"))
            .unwrap();

        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
