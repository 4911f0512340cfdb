use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::error::{KeystoneError, Result};
use crate::metrics::QueueMetrics;
use crate::models::{
    DeadLetterRecord, DeadLetterReplay, Episode, EpisodeRecord, HealthStatus, QueueStatus,
    ReplayedEpisode, RequeueOutcome,
};
use crate::queue_policy::RetryPolicy;
use crate::store::EpisodeStore;

mod capacity;
mod memory;
mod sequencer;

use self::capacity::CapacityPolicy;
use self::memory::MemoryTier;
use self::sequencer::Sequencer;

/// Two-tier durable episode queue.
///
/// New episodes land in a bounded memory buffer and spill to the SQLite disk
/// tier once it is full. Every admission is stamped with a sequence number,
/// and [`pop`](Self::pop) always returns the lowest pending sequence across
/// both tiers. All operations serialize on one lock.
///
/// Only disk-resident episodes survive [`close`](Self::close) or a crash;
/// whatever sits in the memory tier at that point is discarded. `pop` does not
/// drain after close.
pub struct SyncQueue {
    state: Mutex<QueueState>,
    metrics: Arc<QueueMetrics>,
    retry: RetryPolicy,
    batch_size: usize,
    degraded_ratio: f64,
}

struct QueueState {
    // `None` once closed.
    store: Option<EpisodeStore>,
    memory: MemoryTier,
    sequencer: Sequencer,
    capacity: CapacityPolicy,
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue").finish_non_exhaustive()
    }
}

impl SyncQueue {
    pub fn open(config: &QueueConfig) -> Result<Self> {
        Self::open_with_metrics(config, Arc::new(QueueMetrics::new()))
    }

    pub fn open_with_metrics(config: &QueueConfig, metrics: Arc<QueueMetrics>) -> Result<Self> {
        config.validate()?;
        let store = EpisodeStore::open(&config.db_path)?;
        let last_sequence = store.recover_max_sequence()?;
        let disk_items = store.count()?;
        let disk_bytes = store.total_bytes()?;
        info!(
            path = %config.db_path.display(),
            disk_items,
            disk_bytes,
            last_sequence = last_sequence.unwrap_or(0),
            "sync queue opened"
        );

        Ok(Self {
            state: Mutex::new(QueueState {
                store: Some(store),
                memory: MemoryTier::with_capacity(config.memory_capacity),
                sequencer: Sequencer::resume_after(last_sequence),
                capacity: CapacityPolicy::new(config.max_bytes, disk_bytes),
            }),
            metrics,
            retry: config.retry,
            batch_size: config.batch_size,
            degraded_ratio: config.degraded_ratio,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| KeystoneError::mutex_poisoned("sync queue"))
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<QueueMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Admits an episode and returns its sequence number.
    pub fn push(&self, id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Result<u64> {
        self.push_episode(Episode::new(id, payload))
    }

    pub fn push_episode(&self, episode: Episode) -> Result<u64> {
        if episode.id.trim().is_empty() {
            return Err(KeystoneError::Validation(
                "episode id must not be empty".to_string(),
            ));
        }

        let mut guard = self.lock()?;
        self.admit_locked(&mut guard, episode)
    }

    fn admit_locked(&self, state: &mut QueueState, episode: Episode) -> Result<u64> {
        let QueueState {
            store,
            memory,
            sequencer,
            capacity,
        } = state;
        let store = store.as_mut().ok_or(KeystoneError::QueueClosed)?;

        // A spill is checked for duplicates inside the insert transaction.
        if memory.contains(&episode.id) || (!memory.is_full() && store.contains(&episode.id)?) {
            self.metrics.inc_rejected_duplicate();
            return Err(KeystoneError::DuplicateId(episode.id));
        }

        let size_bytes = episode.payload.len() as u64;
        if let Err(err) = capacity.check(size_bytes) {
            self.metrics.inc_rejected_capacity();
            warn!(
                id = %episode.id,
                size_bytes,
                used_bytes = capacity.used_bytes(),
                max_bytes = capacity.max_bytes(),
                "rejecting episode: byte ceiling reached"
            );
            return Err(err);
        }

        let record = EpisodeRecord {
            id: episode.id,
            payload: episode.payload,
            sequence: sequencer.next(),
            size_bytes,
            enqueued_at: Utc::now().timestamp_millis(),
            retry_count: episode.retry_count,
        };
        let sequence = record.sequence;

        match memory.try_push(record) {
            Ok(()) => {
                self.metrics.inc_pushed_memory();
            }
            Err(record) => match store.insert(&record) {
                Ok(()) => {
                    self.metrics.inc_spilled_disk();
                    debug!(id = %record.id, sequence, "episode spilled to disk");
                }
                Err(err @ KeystoneError::DuplicateId(_)) => {
                    self.metrics.inc_rejected_duplicate();
                    return Err(err);
                }
                Err(err) => {
                    self.metrics.inc_persistence_failures();
                    error!(
                        id = %record.id,
                        sequence,
                        error = %err,
                        "failed to spill episode to disk"
                    );
                    return Err(KeystoneError::persistence(&record.id, err));
                }
            },
        }
        capacity.admit(size_bytes);
        Ok(sequence)
    }

    /// Removes and returns the lowest-sequence pending episode, or `None`
    /// when both tiers are empty.
    pub fn pop(&self) -> Result<Option<EpisodeRecord>> {
        let mut guard = self.lock()?;
        let record = pop_locked(&mut guard)?;
        if record.is_some() {
            self.metrics.add_popped(1);
        }
        Ok(record)
    }

    /// Pops up to `max` episodes in sequence order under one lock hold.
    pub fn pop_batch(&self, max: usize) -> Result<Vec<EpisodeRecord>> {
        let mut guard = self.lock()?;
        let mut batch = Vec::with_capacity(max.min(self.batch_size.max(1)));
        while batch.len() < max {
            match pop_locked(&mut guard) {
                Ok(Some(record)) => batch.push(record),
                Ok(None) => break,
                // Records already in `batch` have left both tiers; hand them
                // over and let the next call surface the error.
                Err(err) if !batch.is_empty() => {
                    warn!(popped = batch.len(), error = %err, "stopping batch early");
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        self.metrics.add_popped(batch.len() as u64);
        Ok(batch)
    }

    /// [`pop_batch`](Self::pop_batch) with the configured batch size.
    pub fn pop_default_batch(&self) -> Result<Vec<EpisodeRecord>> {
        self.pop_batch(self.batch_size)
    }

    /// Memory items plus disk rows, read under the queue lock.
    pub fn size(&self) -> Result<u64> {
        let guard = self.lock()?;
        let store = guard.store.as_ref().ok_or(KeystoneError::QueueClosed)?;
        Ok(guard.memory.len() as u64 + store.count()?)
    }

    pub fn total_bytes(&self) -> Result<u64> {
        let guard = self.lock()?;
        if guard.store.is_none() {
            return Err(KeystoneError::QueueClosed);
        }
        Ok(guard.capacity.used_bytes())
    }

    pub fn status(&self) -> Result<QueueStatus> {
        let guard = self.lock()?;
        let store = guard.store.as_ref().ok_or(KeystoneError::QueueClosed)?;
        let memory_items = guard.memory.len() as u64;
        let disk_items = store.count()?;
        let dead_letters = store.count_dead_letters()?;
        let dead_letter_bytes = store.dead_letter_bytes()?;
        let used_bytes = guard.capacity.used_bytes();
        let max_bytes = guard.capacity.max_bytes();
        Ok(QueueStatus {
            memory_items,
            memory_capacity: guard.memory.capacity() as u64,
            disk_items,
            total_items: memory_items + disk_items,
            used_bytes,
            max_bytes,
            next_sequence: guard.sequencer.peek(),
            dead_letters,
            dead_letter_bytes,
            health: evaluate_health(used_bytes, max_bytes, self.degraded_ratio, dead_letters),
        })
    }

    /// Never fails: a closed queue, poisoned lock or unreadable store all
    /// report [`HealthStatus::Unhealthy`].
    #[must_use]
    pub fn health(&self) -> HealthStatus {
        self.status()
            .map_or(HealthStatus::Unhealthy, |status| status.health)
    }

    /// Uploader failure path. Bumps `retry_count` and either re-admits the
    /// episode at the back of the queue or dead-letters it once the retry
    /// budget is spent. The caller keeps `record`, so a failed requeue (for
    /// example a full byte ceiling) can be retried later.
    pub fn requeue(&self, record: &EpisodeRecord) -> Result<RequeueOutcome> {
        let attempt = record.retry_count.saturating_add(1);
        if !self.retry.should_retry(attempt) {
            let reason = format!("retry budget exhausted after {attempt} attempts");
            let exhausted = EpisodeRecord {
                retry_count: attempt,
                ..record.clone()
            };
            self.dead_letter(&exhausted, &reason)?;
            return Ok(RequeueOutcome::DeadLettered {
                retry_count: attempt,
            });
        }

        let backoff_secs = self.retry.backoff_seconds(attempt, &record.id);
        let episode = Episode {
            retry_count: attempt,
            ..Episode::from(record.clone())
        };
        let sequence = self.push_episode(episode)?;
        self.metrics.inc_requeued();
        Ok(RequeueOutcome::Requeued {
            sequence,
            retry_count: attempt,
            backoff_secs,
        })
    }

    /// Parks a delivered episode in the dead-letter table. The episode must
    /// no longer be pending in either tier.
    pub fn dead_letter(&self, record: &EpisodeRecord, reason: &str) -> Result<()> {
        let mut guard = self.lock()?;
        let QueueState { store, memory, .. } = &mut *guard;
        let store = store.as_mut().ok_or(KeystoneError::QueueClosed)?;
        if memory.contains(&record.id) || store.contains(&record.id)? {
            return Err(KeystoneError::Validation(format!(
                "episode {} is still queued and cannot be dead-lettered",
                record.id
            )));
        }
        store.insert_dead_letter(record, reason)?;
        self.metrics.inc_dead_lettered();
        warn!(
            id = %record.id,
            sequence = record.sequence,
            retry_count = record.retry_count,
            reason,
            "episode dead-lettered"
        );
        Ok(())
    }

    pub fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterRecord>> {
        let guard = self.lock()?;
        let store = guard.store.as_ref().ok_or(KeystoneError::QueueClosed)?;
        store.list_dead_letters(limit)
    }

    /// Moves up to `limit` dead letters, oldest first, back onto the queue
    /// with a fresh retry budget. Stops early at the first entry the queue
    /// refuses (byte ceiling or an id that is pending again) and reports how
    /// many were moved.
    pub fn replay_dead_letters(&self, limit: usize) -> Result<DeadLetterReplay> {
        let mut guard = self.lock()?;
        let candidates = guard
            .store
            .as_ref()
            .ok_or(KeystoneError::QueueClosed)?
            .list_dead_letters(limit)?;

        let mut replay = DeadLetterReplay::default();
        for entry in candidates {
            let id = entry.episode.id.clone();
            let episode = Episode {
                retry_count: 0,
                ..Episode::from(entry.episode)
            };
            match self.admit_locked(&mut guard, episode) {
                Ok(sequence) => {
                    let store = guard.store.as_mut().ok_or(KeystoneError::QueueClosed)?;
                    store.delete_dead_letter(&id)?;
                    replay.replayed.push(ReplayedEpisode { id, sequence });
                }
                Err(err)
                    if err.is_backpressure() || matches!(err, KeystoneError::DuplicateId(_)) =>
                {
                    warn!(id = %id, error = %err, "dead-letter replay stopped");
                    replay.stopped_at = Some(id);
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        replay.remaining = guard
            .store
            .as_ref()
            .ok_or(KeystoneError::QueueClosed)?
            .count_dead_letters()?;
        if !replay.replayed.is_empty() {
            info!(
                replayed = replay.replayed.len(),
                remaining = replay.remaining,
                "dead letters replayed"
            );
        }
        Ok(replay)
    }

    /// Deletes every dead letter and returns how many were removed.
    pub fn purge_dead_letters(&self) -> Result<u64> {
        let mut guard = self.lock()?;
        let store = guard.store.as_mut().ok_or(KeystoneError::QueueClosed)?;
        let purged = store.purge_dead_letters()?;
        if purged > 0 {
            warn!(purged, "dead letters purged");
        }
        Ok(purged)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().map_or(true, |guard| guard.store.is_none())
    }

    /// Closes the queue. Memory-tier episodes are discarded; the sequence
    /// high-water mark is persisted so a clean reopen never reissues numbers.
    /// Every later call, including a second `close`, fails with
    /// [`KeystoneError::QueueClosed`].
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        let store = guard.store.take().ok_or(KeystoneError::QueueClosed)?;

        let dropped_bytes = guard.memory.bytes();
        let dropped = guard.memory.clear();
        if dropped > 0 {
            warn!(dropped, dropped_bytes, "discarding memory-tier episodes on close");
        }
        guard.capacity = CapacityPolicy::new(guard.capacity.max_bytes(), 0);
        let high_water = guard.sequencer.last_issued();
        drop(guard);

        let mut store = store;
        let persisted = match high_water {
            Some(sequence) => store.record_high_water(sequence),
            None => Ok(()),
        };
        store.close()?;
        persisted?;
        info!(last_sequence = high_water.unwrap_or(0), "sync queue closed");
        Ok(())
    }

    #[cfg(test)]
    fn with_store_for_test<T>(&self, f: impl FnOnce(&mut EpisodeStore) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let store = guard.store.as_mut().ok_or(KeystoneError::QueueClosed)?;
        f(store)
    }
}

/// Two-way merge step: whichever tier holds the lower sequence gives up its
/// head.
fn pop_locked(state: &mut QueueState) -> Result<Option<EpisodeRecord>> {
    let QueueState {
        store,
        memory,
        capacity,
        ..
    } = state;
    let store = store.as_mut().ok_or(KeystoneError::QueueClosed)?;

    let disk_head = store.peek_oldest()?;
    let take_memory = match (memory.peek(), disk_head.as_ref()) {
        (None, None) => return Ok(None),
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (Some(in_memory), Some(on_disk)) => in_memory.sequence < on_disk.sequence,
    };

    let record = if take_memory {
        memory
            .try_pop()
            .ok_or_else(|| KeystoneError::Internal("memory tier head vanished".to_string()))?
    } else {
        let record = disk_head
            .ok_or_else(|| KeystoneError::Internal("disk tier head vanished".to_string()))?;
        if let Err(err) = store.delete_by_id(&record.id) {
            error!(
                id = %record.id,
                sequence = record.sequence,
                error = %err,
                "failed to remove popped episode from disk"
            );
            return Err(err);
        }
        record
    };
    capacity.release(record.size_bytes);
    Ok(Some(record))
}

fn evaluate_health(used_bytes: u64, max_bytes: u64, ratio: f64, dead_letters: u64) -> HealthStatus {
    #[allow(clippy::cast_precision_loss)]
    let utilization = if max_bytes == 0 {
        1.0
    } else {
        used_bytes as f64 / max_bytes as f64
    };
    if utilization >= ratio || dead_letters > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
