//! SQLite store for items, providers and their price links
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! Duplicate detection relies on the table constraints: a uniqueness
//! violation surfaces as [`SyncError::Conflict`], classified from the SQLite
//! extended error code.

use crate::error::{Result, SyncError};
use crate::prices::PriceUpdate;
use chrono::{SecondsFormat, Utc};
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Transaction};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};

/// Delay between readiness checks while opening the store
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long a statement waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS item (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS provider (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    -- One link per (item, provider); external_id maps to exactly one link
    CREATE TABLE IF NOT EXISTS price_link (
        item_id INTEGER NOT NULL REFERENCES item(id) ON UPDATE CASCADE ON DELETE CASCADE,
        provider_id INTEGER NOT NULL REFERENCES provider(id) ON UPDATE CASCADE ON DELETE CASCADE,
        external_id TEXT NOT NULL UNIQUE,
        initial_price REAL,
        final_price REAL,
        discount INTEGER NOT NULL DEFAULT 0,
        is_free INTEGER NOT NULL DEFAULT 0,
        currency TEXT,
        refreshed_at TEXT,
        PRIMARY KEY (item_id, provider_id)
    );

    CREATE INDEX IF NOT EXISTS idx_price_link_refresh
        ON price_link(provider_id, refreshed_at, item_id);

    -- Rebuilt wholesale on every featured refresh
    CREATE TABLE IF NOT EXISTS featured (
        item_id INTEGER NOT NULL REFERENCES item(id) ON UPDATE CASCADE ON DELETE CASCADE,
        provider_id INTEGER NOT NULL REFERENCES provider(id) ON UPDATE CASCADE ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (item_id, provider_id)
    );
";

const DROP_SCHEMA: &str = "
    DROP TABLE IF EXISTS featured;
    DROP TABLE IF EXISTS price_link;
    DROP TABLE IF EXISTS provider;
    DROP TABLE IF EXISTS item;
";

/// Outcome of linking an item to a provider id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    /// The link (or the external id) was already present
    AlreadyLinked,
}

/// A link queued for a price refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLink {
    pub external_id: String,
    pub item_id: i64,
}

/// One row of the featured snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeaturedEntry {
    pub item_id: i64,
    pub provider_id: i64,
}

/// Stored price fields for one link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredPrice {
    pub initial: Option<f64>,
    #[serde(rename = "final")]
    pub final_price: Option<f64>,
    pub discount: i64,
    pub is_free: bool,
    pub currency: Option<String>,
}

/// The relational store every sync component reads and writes through
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open the database at `path`, polling until it answers or `wait` runs out
    pub fn open(path: &Path, wait: Duration) -> Result<Self> {
        let started = Instant::now();
        loop {
            match connect(path) {
                Ok(conn) => {
                    log::info!("Opened database: {}", path.display());
                    return Ok(Self { conn });
                }
                Err(source) if started.elapsed() >= wait => {
                    return Err(SyncError::Connectivity {
                        path: path.to_path_buf(),
                        waited: started.elapsed(),
                        source,
                    });
                }
                Err(e) => {
                    log::debug!("Database not ready yet: {}", e);
                    std::thread::sleep(READY_POLL_INTERVAL);
                }
            }
        }
    }

    /// Open a private in-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Create any missing tables, keeping existing data
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(CREATE_SCHEMA)?;
        log::info!("Database schema initialized");
        Ok(())
    }

    /// Drop and recreate every table.
    ///
    /// Destroys all stored data; only meant for a cold bootstrap.
    pub fn ensure_schema(&self) -> Result<()> {
        log::warn!("Dropping and recreating all tables");
        self.conn.execute_batch(DROP_SCHEMA)?;
        self.init_schema()
    }

    /// Start a transaction scope; statements issued through `self` while it
    /// is open become part of it.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Seed a provider row; an already seeded provider is not an error
    pub fn ensure_provider(&self, id: i64, name: &str) -> Result<()> {
        let inserted = self
            .conn
            .prepare_cached("INSERT INTO provider (id, name) VALUES (?1, ?2)")?
            .execute(params![id, name])
            .map_err(|e| classify(e, || format!("provider {} ({})", id, name)));

        match inserted {
            Ok(_) => log::info!("Seeded provider {} ({})", name, id),
            Err(SyncError::Conflict(what)) => log::debug!("Provider already seeded: {}", what),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Insert an item by name, or return the id of the existing one
    pub fn upsert_item(&self, name: &str) -> Result<i64> {
        let inserted = self
            .conn
            .prepare_cached("INSERT INTO item (name) VALUES (?1)")?
            .execute(params![name])
            .map_err(|e| classify(e, || format!("item {:?}", name)));

        match inserted {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(SyncError::Conflict(_)) => self
                .conn
                .prepare_cached("SELECT id FROM item WHERE name = ?1")?
                .query_row(params![name], |row| row.get(0))
                .optional()?
                .ok_or_else(|| SyncError::NotFound(format!("item {:?}", name))),
            Err(e) => Err(e),
        }
    }

    /// Link an item to its provider-specific id with empty price fields
    pub fn link_item_to_provider(
        &self,
        item_id: i64,
        provider_id: i64,
        external_id: &str,
    ) -> Result<LinkOutcome> {
        let inserted = self
            .conn
            .prepare_cached(
                "INSERT INTO price_link (item_id, provider_id, external_id) VALUES (?1, ?2, ?3)",
            )?
            .execute(params![item_id, provider_id, external_id])
            .map_err(|e| {
                classify(e, || {
                    format!(
                        "link item {} / provider {} / external id {}",
                        item_id, provider_id, external_id
                    )
                })
            });

        match inserted {
            Ok(_) => Ok(LinkOutcome::Created),
            Err(SyncError::Conflict(what)) => {
                log::debug!("Already linked: {}", what);
                Ok(LinkOutcome::AlreadyLinked)
            }
            Err(e) => Err(e),
        }
    }

    /// Up to `limit` links of a provider not refreshed since `stale_before`,
    /// least recently refreshed first.
    ///
    /// Never-refreshed links come first, then by `refreshed_at`, then by
    /// item id. Links stamped at or after `stale_before` are left out, so
    /// pages taken with the same cutoff never repeat a link.
    pub fn page_links(
        &self,
        provider_id: i64,
        limit: usize,
        stale_before: &str,
    ) -> Result<Vec<PendingLink>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare_cached(
            "SELECT external_id, item_id
             FROM price_link
             WHERE provider_id = ?1 AND (refreshed_at IS NULL OR refreshed_at < ?2)
             ORDER BY refreshed_at IS NOT NULL, refreshed_at, item_id
             LIMIT ?3",
        )?;

        let links = stmt
            .query_map(params![provider_id, stale_before, limit], |row| {
                Ok(PendingLink {
                    external_id: row.get(0)?,
                    item_id: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    /// Write the price fields of an existing link
    pub fn apply_price(&self, item_id: i64, provider_id: i64, price: &PriceUpdate) -> Result<()> {
        let updated = self
            .conn
            .prepare_cached(
                "UPDATE price_link
                 SET initial_price = ?1, discount = ?2, is_free = ?3, final_price = ?4,
                     currency = ?5, refreshed_at = ?6
                 WHERE item_id = ?7 AND provider_id = ?8",
            )?
            .execute(params![
                price.initial,
                price.discount,
                price.is_free,
                price.final_price,
                &price.currency,
                now_stamp(),
                item_id,
                provider_id,
            ])?;

        if updated == 0 {
            return Err(SyncError::NotFound(format!(
                "price link for item {} / provider {}",
                item_id, provider_id
            )));
        }
        Ok(())
    }

    /// Stamp a link as checked without touching its prices
    pub fn mark_refreshed(&self, item_id: i64, provider_id: i64) -> Result<()> {
        let updated = self
            .conn
            .prepare_cached(
                "UPDATE price_link SET refreshed_at = ?1 WHERE item_id = ?2 AND provider_id = ?3",
            )?
            .execute(params![now_stamp(), item_id, provider_id])?;

        if updated == 0 {
            return Err(SyncError::NotFound(format!(
                "price link for item {} / provider {}",
                item_id, provider_id
            )));
        }
        Ok(())
    }

    /// Map a provider-specific id back to the local item
    pub fn resolve_external_id(&self, external_id: &str, provider_id: i64) -> Result<Option<i64>> {
        let item_id = self
            .conn
            .prepare_cached(
                "SELECT item_id FROM price_link WHERE external_id = ?1 AND provider_id = ?2",
            )?
            .query_row(params![external_id, provider_id], |row| row.get(0))
            .optional()?;
        Ok(item_id)
    }

    /// Replace the whole featured snapshot in one transaction.
    ///
    /// Entries keep their slice order as rank. Duplicates are skipped.
    /// Returns the number of rows written.
    pub fn replace_featured(&self, entries: &[FeaturedEntry]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM featured", [])?;

        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO featured (item_id, provider_id, position) VALUES (?1, ?2, ?3)",
            )?;
            for (position, entry) in entries.iter().enumerate() {
                let inserted = stmt
                    .execute(params![entry.item_id, entry.provider_id, position as i64])
                    .map_err(|e| {
                        classify(e, || {
                            format!("featured item {} / provider {}", entry.item_id, entry.provider_id)
                        })
                    });
                match inserted {
                    Ok(_) => written += 1,
                    Err(SyncError::Conflict(what)) => {
                        log::info!("Duplicate entry in featured list skipped: {}", what)
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        tx.commit()?;
        log::info!("Featured snapshot replaced with {} entries", written);
        Ok(written)
    }

    /// Stored prices of one link
    pub fn get_price(&self, item_id: i64, provider_id: i64) -> Result<StoredPrice> {
        self.conn
            .prepare_cached(
                "SELECT initial_price, final_price, discount, is_free, currency
                 FROM price_link
                 WHERE item_id = ?1 AND provider_id = ?2",
            )?
            .query_row(params![item_id, provider_id], |row| {
                Ok(StoredPrice {
                    initial: row.get(0)?,
                    final_price: row.get(1)?,
                    discount: row.get(2)?,
                    is_free: row.get(3)?,
                    currency: row.get(4)?,
                })
            })
            .optional()?
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "price link for item {} / provider {}",
                    item_id, provider_id
                ))
            })
    }

    /// Name of one item
    pub fn get_item_name(&self, item_id: i64) -> Result<String> {
        self.conn
            .prepare_cached("SELECT name FROM item WHERE id = ?1")?
            .query_row(params![item_id], |row| row.get(0))
            .optional()?
            .ok_or_else(|| SyncError::NotFound(format!("item {}", item_id)))
    }

    /// Current featured snapshot in rank order
    pub fn list_featured(&self) -> Result<Vec<FeaturedEntry>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT item_id, provider_id FROM featured ORDER BY position")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(FeaturedEntry {
                    item_id: row.get(0)?,
                    provider_id: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Number of items
    pub fn item_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM item", [], |row| row.get(0))?)
    }

    /// Number of price links across all providers
    pub fn link_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM price_link", [], |row| row.get(0))?)
    }

    /// Raw connection for tests that need to shape the schema
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn connect(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    // Readiness check
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(conn)
}

/// Turn UNIQUE / PRIMARY KEY violations into `Conflict`; everything else
/// (foreign keys included) stays a database error.
fn classify(err: rusqlite::Error, what: impl FnOnce() -> String) -> SyncError {
    let conflict = matches!(
        &err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    );

    if conflict {
        SyncError::Conflict(what())
    } else {
        SyncError::Database(err)
    }
}

/// Fixed-width UTC timestamp, so text ordering matches time ordering
pub fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
