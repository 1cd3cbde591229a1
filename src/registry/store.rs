//! SQLite-backed registry store.
//!
//! # Responsibilities
//! - Persist domain records (one row per hostname)
//! - Keep the append-only snapshot log of accepted documents
//! - Provide the single transaction covering {record mutation +
//!   snapshot append} the orchestrator relies on
//!
//! # Design Decisions
//! - SQLite in WAL mode behind a `Mutex<Connection>`; calls are local
//!   and fast, so blocking inside the async runtime is acceptable
//! - Schema embedded at compile time
//! - Health write-backs touch exactly three columns, nothing else

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use crate::document::Document;
use crate::registry::record::{now_unix, BasicAuthCredential, DomainRecord, HealthCheckSpec};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Errors from registry storage.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored column could not be decoded.
    #[error("corrupt row for {host}: {source}")]
    CorruptRow {
        host: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored record id is not a valid UUID.
    #[error("corrupt row for {host}: invalid id '{id}'")]
    CorruptId { host: String, id: String },

    /// A snapshot row could not be decoded into a document.
    #[error("corrupt snapshot {id}: {source}")]
    CorruptSnapshot {
        id: i64,
        #[source]
        source: serde_json::Error,
    },

    /// Document serialization failed before writing a snapshot.
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A registry mutation committed atomically with its snapshot.
#[derive(Debug, Clone)]
pub enum RecordMutation {
    Insert(DomainRecord),
    Update(DomainRecord),
    Delete(String),
    /// Snapshot only; used by import, which upserts records separately.
    None,
}

/// One row of the append-only snapshot log.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: i64,
    pub document: Document,
    pub created_at: i64,
}

/// Handle to the registry database.
pub struct RegistryDb {
    conn: Mutex<Connection>,
}

impl RegistryDb {
    /// Open (or create) the registry at the given path.
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory registry for tests.
    pub fn open_in_memory() -> Result<Self, RegistryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // Poisoning only happens after a panic elsewhere; the connection
    // itself is still usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply one mutation and append the accepted document's snapshot
    /// in the same transaction.
    pub fn commit_mutation(
        &self,
        mutation: RecordMutation,
        accepted: &Document,
    ) -> Result<(), RegistryError> {
        let config = serde_json::to_string(accepted)?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        match mutation {
            RecordMutation::Insert(record) => {
                insert_record(&tx, &record)?;
            }
            RecordMutation::Update(record) => {
                update_record(&tx, &record)?;
            }
            RecordMutation::Delete(host) => {
                tx.execute(
                    "DELETE FROM domains WHERE incoming_address = ?1",
                    params![host],
                )?;
            }
            RecordMutation::None => {}
        }

        tx.execute(
            "INSERT INTO snapshots (config, created_at) VALUES (?1, ?2)",
            params![config, now_unix()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Insert or replace a record outside the snapshot transaction.
    /// Used by import decomposition, where each route is persisted
    /// independently.
    pub fn upsert_record(&self, record: &DomainRecord) -> Result<(), RegistryError> {
        let conn = self.conn();
        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM domains WHERE incoming_address = ?1",
                params![record.incoming_address],
                |row| row.get(0),
            )
            .optional()?;

        match exists {
            Some(_) => update_record(&conn, record),
            None => insert_record(&conn, record),
        }
    }

    pub fn find_by_host(&self, host: &str) -> Result<Option<DomainRecord>, RegistryError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM domains WHERE incoming_address = ?1"
        ))?;
        let record = stmt
            .query_row(params![host], row_to_record)
            .optional()?
            .map(decode_record)
            .transpose()?;
        Ok(record)
    }

    pub fn list_all(&self) -> Result<Vec<DomainRecord>, RegistryError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM domains ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map([], row_to_record)?;
        rows.map(|row| decode_record(row?))
            .collect::<Result<Vec<_>, _>>()
    }

    /// Records carrying an active health-check configuration.
    pub fn list_with_health_check(&self) -> Result<Vec<DomainRecord>, RegistryError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM domains WHERE health_check_url IS NOT NULL"
        ))?;
        let rows = stmt.query_map([], row_to_record)?;
        rows.map(|row| decode_record(row?))
            .collect::<Result<Vec<_>, _>>()
    }

    /// Write back one probe outcome. Touches only the health columns.
    pub fn write_health(
        &self,
        host: &str,
        healthy: bool,
        detail: &str,
        checked_at: i64,
    ) -> Result<(), RegistryError> {
        self.conn().execute(
            "UPDATE domains
                SET last_health_status = ?2,
                    last_health_detail = ?3,
                    last_checked_at = ?4
              WHERE incoming_address = ?1",
            params![host, healthy, detail, checked_at],
        )?;
        Ok(())
    }

    /// Append a snapshot without a record mutation.
    pub fn append_snapshot(&self, accepted: &Document) -> Result<(), RegistryError> {
        let config = serde_json::to_string(accepted)?;
        self.conn().execute(
            "INSERT INTO snapshots (config, created_at) VALUES (?1, ?2)",
            params![config, now_unix()],
        )?;
        Ok(())
    }

    /// Most recently accepted document, if any.
    pub fn latest_snapshot(&self) -> Result<Option<Snapshot>, RegistryError> {
        let conn = self.conn();
        let row: Option<(i64, String, i64)> = conn
            .query_row(
                "SELECT id, config, created_at FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(id, config, created_at)| {
            let document = serde_json::from_str(&config)
                .map_err(|source| RegistryError::CorruptSnapshot { id, source })?;
            Ok(Snapshot {
                id,
                document,
                created_at,
            })
        })
        .transpose()
    }

    pub fn snapshot_count(&self) -> Result<u64, RegistryError> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

const COLUMNS: &str = "id, incoming_address, destination_address, port, enable_https, \
     redirect_url, transport_versions, auth_username, auth_password_hash, \
     health_check_url, health_check_method, health_check_interval_secs, \
     is_locked, last_health_status, last_health_detail, last_checked_at, created_at";

fn insert_record(conn: &Connection, record: &DomainRecord) -> Result<(), RegistryError> {
    let versions = record
        .transport_versions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO domains (
            id, incoming_address, destination_address, port, enable_https,
            redirect_url, transport_versions, auth_username, auth_password_hash,
            health_check_url, health_check_method, health_check_interval_secs,
            is_locked, last_health_status, last_health_detail, last_checked_at, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            record.id.to_string(),
            record.incoming_address,
            record.destination_address,
            record.port,
            record.enable_https,
            record.redirect_url,
            versions,
            record.basic_auth.as_ref().map(|a| a.username.clone()),
            record.basic_auth.as_ref().map(|a| a.password_hash.clone()),
            record.health_check.as_ref().map(|h| h.url.clone()),
            record.health_check.as_ref().map(|h| h.method.clone()),
            record.health_check.as_ref().map(|h| h.interval_secs),
            record.is_locked,
            record.last_health_status,
            record.last_health_detail,
            record.last_checked_at,
            record.created_at,
        ],
    )?;
    Ok(())
}

/// Update everything mutable; `incoming_address` and `id` never change.
fn update_record(conn: &Connection, record: &DomainRecord) -> Result<(), RegistryError> {
    let versions = record
        .transport_versions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "UPDATE domains SET
            destination_address = ?2,
            port = ?3,
            enable_https = ?4,
            redirect_url = ?5,
            transport_versions = ?6,
            auth_username = ?7,
            auth_password_hash = ?8,
            health_check_url = ?9,
            health_check_method = ?10,
            health_check_interval_secs = ?11
         WHERE incoming_address = ?1",
        params![
            record.incoming_address,
            record.destination_address,
            record.port,
            record.enable_https,
            record.redirect_url,
            versions,
            record.basic_auth.as_ref().map(|a| a.username.clone()),
            record.basic_auth.as_ref().map(|a| a.password_hash.clone()),
            record.health_check.as_ref().map(|h| h.url.clone()),
            record.health_check.as_ref().map(|h| h.method.clone()),
            record.health_check.as_ref().map(|h| h.interval_secs),
        ],
    )?;
    Ok(())
}

/// Intermediate row shape before the id and JSON columns are decoded.
struct RawRecord {
    record: DomainRecord,
    id_raw: String,
    versions_json: Option<String>,
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    let id: String = row.get(0)?;
    let auth_username: Option<String> = row.get(7)?;
    let auth_password_hash: Option<String> = row.get(8)?;
    let health_url: Option<String> = row.get(9)?;
    let health_method: Option<String> = row.get(10)?;
    let health_interval: Option<u64> = row.get(11)?;

    let basic_auth = match (auth_username, auth_password_hash) {
        (Some(username), Some(hash)) => Some(BasicAuthCredential::from_hash(&username, &hash)),
        _ => None,
    };
    let health_check = health_url.map(|url| HealthCheckSpec {
        url,
        method: health_method.unwrap_or_else(|| "GET".to_string()),
        interval_secs: health_interval.unwrap_or(0),
    });

    Ok(RawRecord {
        record: DomainRecord {
            id: uuid::Uuid::nil(),
            incoming_address: row.get(1)?,
            destination_address: row.get(2)?,
            port: row.get(3)?,
            enable_https: row.get(4)?,
            redirect_url: row.get(5)?,
            transport_versions: None,
            basic_auth,
            health_check,
            is_locked: row.get(12)?,
            last_health_status: row.get(13)?,
            last_health_detail: row.get(14)?,
            last_checked_at: row.get(15)?,
            created_at: row.get(16)?,
        },
        id_raw: id,
        versions_json: row.get(6)?,
    })
}

fn decode_record(raw: RawRecord) -> Result<DomainRecord, RegistryError> {
    let mut record = raw.record;
    record.id = raw.id_raw.parse().map_err(|_| RegistryError::CorruptId {
        host: record.incoming_address.clone(),
        id: raw.id_raw.clone(),
    })?;
    if let Some(json) = raw.versions_json {
        record.transport_versions = Some(serde_json::from_str(&json).map_err(|source| {
            RegistryError::CorruptRow {
                host: record.incoming_address.clone(),
                source,
            }
        })?);
    }
    Ok(record)
}
