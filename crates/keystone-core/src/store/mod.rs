use std::path::Path;
#[cfg(unix)]
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{Connection, Transaction};

use crate::error::Result;

mod dead_letter;
mod episodes;
mod migration;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Disk tier: an SQLite file holding spilled episodes, the sequence
/// high-water mark and the dead-letter table.
///
/// Every write runs in its own transaction and the connection is opened with
/// `synchronous = FULL`, so a call that returns `Ok` has been committed to
/// disk. One store per path; concurrent openers are not coordinated.
pub struct EpisodeStore {
    conn: Connection,
}

impl std::fmt::Debug for EpisodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeStore").finish_non_exhaustive()
    }
}

impl EpisodeStore {
    fn with_tx<T>(&mut self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let tx = self.conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mut store = Self { conn };
        store.migrate()?;
        #[cfg(unix)]
        harden_sqlite_permissions(path)?;
        Ok(store)
    }

    /// Releases the connection, surfacing any error from the final close.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| err)?;
        Ok(())
    }
}

fn u64_to_i64_saturating(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn i64_to_u64_saturating(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(unix)]
fn harden_sqlite_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for suffix in ["", "-wal", "-shm"] {
        let mut os = path.as_os_str().to_os_string();
        os.push(suffix);
        let candidate = PathBuf::from(os);
        if candidate.exists() {
            std::fs::set_permissions(candidate, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
