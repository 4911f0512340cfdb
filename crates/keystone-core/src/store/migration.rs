use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::error::{KeystoneError, Result};

use super::episodes::{max_issued_sequence, raise_high_water};
use super::{EpisodeStore, u64_to_i64_saturating};

const MIGRATION_SCHEMA_SQL: &str = r"
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = FULL;
    CREATE TABLE IF NOT EXISTS episodes (
        id TEXT PRIMARY KEY,
        sequence INTEGER NOT NULL,
        payload BLOB NOT NULL,
        size_bytes INTEGER NOT NULL,
        enqueued_at INTEGER NOT NULL,
        retry_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_episodes_sequence ON episodes(sequence);

    CREATE TABLE IF NOT EXISTS queue_meta (
        key TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS dead_letters (
        id TEXT PRIMARY KEY,
        sequence INTEGER NOT NULL,
        payload BLOB NOT NULL,
        size_bytes INTEGER NOT NULL,
        enqueued_at INTEGER NOT NULL,
        retry_count INTEGER NOT NULL,
        reason TEXT NOT NULL,
        dead_lettered_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_dead_letters_dead_lettered_at
    ON dead_letters(dead_lettered_at);
";

/// Table written by the first generation of the edge agent: no sequence
/// column and a zero `created_at` for every spilled row.
const LEGACY_QUEUE_TABLE: &str = "sync_queue";

impl EpisodeStore {
    pub(super) fn migrate(&mut self) -> Result<()> {
        self.conn.execute_batch(MIGRATION_SCHEMA_SQL)?;
        ensure_required_column(
            &self.conn,
            "episodes",
            "retry_count",
            "unsupported episodes schema: retry_count is missing; reset the queue database",
        )?;
        if has_table(&self.conn, LEGACY_QUEUE_TABLE)? {
            let imported = self.import_legacy_queue()?;
            info!(imported, "imported legacy sync_queue rows");
        }
        Ok(())
    }

    /// Moves legacy rows into `episodes` in rowid order, the only order the
    /// legacy table preserved, and drops the old table in the same
    /// transaction.
    fn import_legacy_queue(&mut self) -> Result<u64> {
        self.with_tx(|tx| {
            let base = max_issued_sequence(tx)?.unwrap_or(0);
            let mut imported = 0_u64;
            {
                let mut select = tx.prepare(&format!(
                    "SELECT id, data FROM {LEGACY_QUEUE_TABLE} ORDER BY rowid ASC"
                ))?;
                let rows = select.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?;
                let now = chrono::Utc::now().timestamp_millis();
                for row in rows {
                    let (id, payload) = row?;
                    let sequence = base.saturating_add(imported + 1);
                    let size_bytes = u64_to_i64_saturating(payload.len() as u64);
                    let inserted = tx.execute(
                        r"
                        INSERT OR IGNORE INTO episodes(id, sequence, payload, size_bytes, enqueued_at, retry_count)
                        VALUES (?1, ?2, ?3, ?4, ?5, 0)
                        ",
                        params![id, u64_to_i64_saturating(sequence), payload, size_bytes, now],
                    )?;
                    if inserted > 0 {
                        imported += 1;
                    }
                }
            }
            if imported > 0 {
                raise_high_water(tx, base.saturating_add(imported))?;
            }
            tx.execute_batch(&format!("DROP TABLE {LEGACY_QUEUE_TABLE}"))?;
            Ok(imported)
        })
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn has_table(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 LIMIT 1",
            params![table],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(exists)
}

fn ensure_required_column(
    conn: &Connection,
    table: &str,
    column: &str,
    error_message: &'static str,
) -> Result<()> {
    if has_column(conn, table, column)? {
        Ok(())
    } else {
        Err(KeystoneError::Validation(error_message.to_string()))
    }
}
