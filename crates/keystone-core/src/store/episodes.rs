use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{KeystoneError, Result};
use crate::models::EpisodeRecord;

use super::{EpisodeStore, i64_to_u64_saturating, u64_to_i64_saturating};

const META_LAST_SEQUENCE: &str = "last_sequence";

impl EpisodeStore {
    /// Persists `record` and raises the sequence high-water mark in one
    /// commit.
    pub fn insert(&mut self, record: &EpisodeRecord) -> Result<()> {
        self.with_tx(|tx| {
            if id_exists(tx, &record.id)? {
                return Err(KeystoneError::DuplicateId(record.id.clone()));
            }
            tx.execute(
                r"
                INSERT INTO episodes(id, sequence, payload, size_bytes, enqueued_at, retry_count)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
                params![
                    record.id,
                    u64_to_i64_saturating(record.sequence),
                    record.payload,
                    u64_to_i64_saturating(record.size_bytes),
                    record.enqueued_at,
                    i64::from(record.retry_count)
                ],
            )?;
            raise_high_water(tx, record.sequence)?;
            Ok(())
        })
    }

    pub fn peek_oldest(&self) -> Result<Option<EpisodeRecord>> {
        let record = self
            .conn
            .query_row(
                r"
                SELECT id, sequence, payload, size_bytes, enqueued_at, retry_count
                FROM episodes
                ORDER BY sequence ASC
                LIMIT 1
                ",
                [],
                episode_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn delete_by_id(&mut self, id: &str) -> Result<()> {
        if self.delete_if_present(id)? {
            Ok(())
        } else {
            Err(KeystoneError::NotFound(format!("episode {id}")))
        }
    }

    /// Idempotent delete for acknowledgement flows; reports whether a row
    /// was removed.
    pub fn delete_if_present(&mut self, id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM episodes WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        id_exists(&self.conn, id)
    }

    pub fn count(&self) -> Result<u64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM episodes", [], |row| row.get::<_, i64>(0))?;
        Ok(i64_to_u64_saturating(count))
    }

    pub fn total_bytes(&self) -> Result<u64> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM episodes",
            [],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(i64_to_u64_saturating(total))
    }

    /// Highest sequence ever committed here: stored rows or the persisted
    /// high-water mark, whichever is larger. `None` for a fresh store.
    pub fn recover_max_sequence(&self) -> Result<Option<u64>> {
        max_issued_sequence(&self.conn)
    }

    /// Records that every sequence up to `sequence` has been issued. Never
    /// lowers the stored mark.
    pub fn record_high_water(&mut self, sequence: u64) -> Result<()> {
        raise_high_water(&self.conn, sequence)
    }

    #[cfg(test)]
    pub(crate) fn fail_inserts_for_test(&self) -> Result<()> {
        self.conn.execute_batch(
            r"
            CREATE TRIGGER fail_episode_insert BEFORE INSERT ON episodes
            BEGIN
                SELECT RAISE(ABORT, 'disk tier unavailable');
            END;
            ",
        )?;
        Ok(())
    }
}

fn id_exists(conn: &Connection, id: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM episodes WHERE id = ?1 LIMIT 1",
            params![id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(exists)
}

pub(super) fn max_issued_sequence(conn: &Connection) -> Result<Option<u64>> {
    let stored = conn.query_row("SELECT MAX(sequence) FROM episodes", [], |row| {
        row.get::<_, Option<i64>>(0)
    })?;
    let persisted = conn
        .query_row(
            "SELECT value FROM queue_meta WHERE key = ?1",
            params![META_LAST_SEQUENCE],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(stored
        .into_iter()
        .chain(persisted)
        .max()
        .map(i64_to_u64_saturating))
}

pub(super) fn raise_high_water(conn: &Connection, sequence: u64) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO queue_meta(key, value)
        VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET
          value = MAX(value, excluded.value)
        ",
        params![META_LAST_SEQUENCE, u64_to_i64_saturating(sequence)],
    )?;
    Ok(())
}

pub(super) fn episode_from_row(row: &Row<'_>) -> rusqlite::Result<EpisodeRecord> {
    let retry_count = row.get::<_, i64>(5)?;
    Ok(EpisodeRecord {
        id: row.get(0)?,
        sequence: i64_to_u64_saturating(row.get::<_, i64>(1)?),
        payload: row.get(2)?,
        size_bytes: i64_to_u64_saturating(row.get::<_, i64>(3)?),
        enqueued_at: row.get(4)?,
        retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
    })
}
