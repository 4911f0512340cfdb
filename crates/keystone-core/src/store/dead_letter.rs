use rusqlite::params;

use crate::error::{KeystoneError, Result};
use crate::models::{DeadLetterRecord, EpisodeRecord};

use super::episodes::episode_from_row;
use super::{EpisodeStore, i64_to_u64_saturating, u64_to_i64_saturating};

impl EpisodeStore {
    /// Parks an episode that exhausted its retry budget. A second dead-letter
    /// for the same id replaces the first.
    pub fn insert_dead_letter(&mut self, record: &EpisodeRecord, reason: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            r"
            INSERT INTO dead_letters(
                id, sequence, payload, size_bytes, enqueued_at, retry_count, reason, dead_lettered_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
              sequence = excluded.sequence,
              payload = excluded.payload,
              size_bytes = excluded.size_bytes,
              enqueued_at = excluded.enqueued_at,
              retry_count = excluded.retry_count,
              reason = excluded.reason,
              dead_lettered_at = excluded.dead_lettered_at
            ",
            params![
                record.id,
                u64_to_i64_saturating(record.sequence),
                record.payload,
                u64_to_i64_saturating(record.size_bytes),
                record.enqueued_at,
                i64::from(record.retry_count),
                reason,
                now
            ],
        )?;
        Ok(())
    }

    pub fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r"
            SELECT id, sequence, payload, size_bytes, enqueued_at, retry_count, reason, dead_lettered_at
            FROM dead_letters
            ORDER BY dead_lettered_at ASC, sequence ASC
            LIMIT ?1
            ",
        )?;
        let rows = stmt.query_map(
            params![i64::try_from(limit).unwrap_or(i64::MAX)],
            |row| {
                Ok(DeadLetterRecord {
                    episode: episode_from_row(row)?,
                    reason: row.get(6)?,
                    dead_lettered_at: row.get(7)?,
                })
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn delete_dead_letter(&mut self, id: &str) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM dead_letters WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(KeystoneError::NotFound(format!("dead letter {id}")));
        }
        Ok(())
    }

    pub fn purge_dead_letters(&mut self) -> Result<u64> {
        let affected = self.conn.execute("DELETE FROM dead_letters", [])?;
        Ok(affected as u64)
    }

    pub fn dead_letter_bytes(&self) -> Result<u64> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM dead_letters",
            [],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(i64_to_u64_saturating(total))
    }

    pub fn count_dead_letters(&self) -> Result<u64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM dead_letters", [], |row| {
                row.get::<_, i64>(0)
            })?;
        Ok(i64_to_u64_saturating(count))
    }
}
