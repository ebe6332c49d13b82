#![forbid(unsafe_code)]

mod error;

pub use error::{Outcome, StoreError};

use crate::{DocumentStore, StoreConfig};
use error::is_check_violation;
use rusqlite::{Connection, OptionalExtension, params};
use sq_core::ids::{CollectionName, SequenceName};
use sq_core::model::{Mutation, Sequence};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, trace};

/// Sequence documents persisted in one SQLite table.
///
/// Every handle owns one connection. Handles opened on the same database file,
/// in this process or another, share SQLite's write lock and therefore act as a
/// single linearizable endpoint.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
    collection: CollectionName,
    sql: Statements,
}

#[derive(Debug)]
struct Statements {
    increment: String,
    set: String,
    find: String,
    remove: String,
}

impl Statements {
    fn for_collection(collection: &CollectionName) -> Self {
        let table = collection.as_str();
        Self {
            // The WHERE guard skips the update instead of letting the sum leave
            // the i64 range, so no row comes back on overflow.
            increment: format!(
                "INSERT INTO {table}(name, value) VALUES (?1, ?2) \
                 ON CONFLICT(name) DO UPDATE SET value = value + excluded.value \
                 WHERE (excluded.value >= 0 AND value <= 9223372036854775807 - excluded.value) \
                    OR (excluded.value < 0 AND value >= (-9223372036854775807 - 1) - excluded.value) \
                 RETURNING name, value"
            ),
            set: format!(
                "INSERT INTO {table}(name, value) VALUES (?1, ?2) \
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value \
                 RETURNING name, value"
            ),
            find: format!("SELECT name, value FROM {table} WHERE name=?1"),
            remove: format!("DELETE FROM {table} WHERE name=?1"),
        }
    }
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::connect(&StoreConfig::new(storage_dir))
    }

    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        std::fs::create_dir_all(&config.storage_dir)?;

        let db_path = config.db_path();
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(config.busy_timeout)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            "#,
        )?;

        preflight_gate(&conn, &config.collection)?;
        install_schema(&conn, &config.collection)?;

        info!(
            db = %db_path.display(),
            collection = %config.collection,
            "sequence store ready"
        );

        Ok(Self {
            conn,
            storage_dir: config.storage_dir.clone(),
            sql: Statements::for_collection(&config.collection),
            collection: config.collection.clone(),
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    /// Deletes the document for `name`. Returns whether one existed.
    ///
    /// The sequence counter never calls this.
    pub fn remove(&self, name: &SequenceName) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .prepare_cached(&self.sql.remove)?
            .execute(params![name.as_str()])?;
        Ok(deleted > 0)
    }
}

impl DocumentStore for SqliteStore {
    fn find_one_and_update(
        &self,
        name: &SequenceName,
        mutation: Mutation,
    ) -> Result<Sequence, StoreError> {
        let (sql, operand) = match mutation {
            Mutation::Increment(delta) => (&self.sql.increment, delta),
            Mutation::Set(value) => (&self.sql.set, value),
        };

        let mut stmt = self.conn.prepare_cached(sql)?;
        let mut rows = stmt
            .query(params![name.as_str(), operand])
            .map_err(|err| write_error(err, name))?;

        let (stored_name, value) = match rows.next() {
            Ok(Some(row)) => (row.get::<_, String>(0)?, row.get::<_, i64>(1)?),
            // Only the guarded increment can decline to return its row.
            Ok(None) => {
                return Err(StoreError::Overflow {
                    name: name.to_string(),
                });
            }
            Err(err) => return Err(write_error(err, name)),
        };

        // The autocommit transaction commits when the statement runs to
        // completion; a failed commit must surface here, not on reset.
        while rows
            .next()
            .map_err(|err| write_error(err, name))?
            .is_some()
        {}

        trace!(
            collection = %self.collection,
            name = %stored_name,
            op = mutation.as_str(),
            operand,
            value,
            "find_one_and_update"
        );

        Ok(Sequence {
            name: SequenceName::try_new(stored_name)
                .map_err(|_| StoreError::InvalidInput("stored sequence name is empty"))?,
            value,
        })
    }

    fn find_one(&self, name: &SequenceName) -> Result<Option<Sequence>, StoreError> {
        let value = self
            .conn
            .prepare_cached(&self.sql.find)?
            .query_row(params![name.as_str()], |row| row.get::<_, i64>(1))
            .optional()?;

        Ok(value.map(|value| Sequence {
            name: name.clone(),
            value,
        }))
    }
}

fn write_error(err: rusqlite::Error, name: &SequenceName) -> StoreError {
    if is_check_violation(&err) {
        return StoreError::Overflow {
            name: name.to_string(),
        };
    }
    err.into()
}

fn preflight_gate(conn: &Connection, collection: &CollectionName) -> Result<(), StoreError> {
    let mut stmt =
        conn.prepare("SELECT name, upper(type), pk FROM pragma_table_info(?1)")?;
    let mut rows = stmt.query(params![collection.as_str()])?;
    let mut columns = BTreeSet::new();
    while let Some(row) = rows.next()? {
        columns.insert((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
        ));
    }

    if columns.is_empty() {
        return Ok(());
    }

    // `name` must be the whole primary key for ON CONFLICT(name) to resolve.
    let expected: BTreeSet<(String, String, i64)> = [
        ("name".to_string(), "TEXT".to_string(), 1),
        ("value".to_string(), "INTEGER".to_string(), 0),
    ]
    .into_iter()
    .collect();

    if columns != expected {
        return Err(StoreError::InvalidInput(
            "RESET_REQUIRED: collection table has an unexpected shape",
        ));
    }

    Ok(())
}

fn install_schema(conn: &Connection, collection: &CollectionName) -> Result<(), StoreError> {
    let table = collection.as_str();
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
          name TEXT PRIMARY KEY NOT NULL,
          value INTEGER NOT NULL CHECK(typeof(value) = 'integer')
        );
        "#
    ))?;
    Ok(())
}
