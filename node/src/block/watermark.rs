use std::sync::Arc;

use parking_lot::Mutex;

/// Watermark value before anything has been committed.
pub const NOTHING_BLOCKED: i64 = -1;

/// Durable home of the blocked sequence and of the sequence to resume reconciliation from.
pub trait SequenceStore: Send + Sync {
    fn load_blocked_seq(&self) -> anyhow::Result<Option<i64>>;

    fn store_blocked_seq(&self, seq: i64) -> anyhow::Result<()>;

    fn load_resume_seq(&self) -> anyhow::Result<Option<i64>>;

    fn store_resume_seq(&self, seq: i64) -> anyhow::Result<()>;
}

/// Highest main chain sequence whose transactions are committed into a local block.
///
/// Only moves forward. Every advance is persisted before it becomes visible.
///
/// Blocks pack the most recent sequences first, so the blocked sequence may pass older
/// sequences whose transactions are still cached. The tracker also keeps the resume sequence,
/// the lowest sequence which may still have unblocked transactions. A restarted node
/// reconciles again from there.
pub struct BlockedSeqTracker {
    seq: Mutex<i64>,
    resume: Mutex<i64>,
    store: Arc<dyn SequenceStore>,
}

impl BlockedSeqTracker {
    pub fn load(store: Arc<dyn SequenceStore>) -> anyhow::Result<Self> {
        let seq = store.load_blocked_seq()?.unwrap_or(NOTHING_BLOCKED);
        let resume = store.load_resume_seq()?.unwrap_or(seq + 1);
        log::info!("Loaded blocked sequence: {seq}, resume sequence: {resume}");
        Ok(Self {
            seq: Mutex::new(seq),
            resume: Mutex::new(resume),
            store,
        })
    }

    pub fn get(&self) -> i64 {
        *self.seq.lock()
    }

    pub fn resume_seq(&self) -> i64 {
        *self.resume.lock()
    }

    /// Advances the resume sequence to `seq`. Returns `false` if `seq` isn't greater than the current value.
    pub fn set_resume(&self, seq: i64) -> anyhow::Result<bool> {
        let mut current = self.resume.lock();
        if seq <= *current {
            return Ok(false);
        }
        self.store.store_resume_seq(seq)?;
        log::trace!("Resume sequence advanced {} -> {seq}", *current);
        *current = seq;
        Ok(true)
    }

    /// Advances the watermark to `seq`. Returns `false` if `seq` isn't greater than the current value.
    pub fn set(&self, seq: i64) -> anyhow::Result<bool> {
        let mut current = self.seq.lock();
        if seq <= *current {
            return Ok(false);
        }
        self.store.store_blocked_seq(seq)?;
        log::debug!("Blocked sequence advanced {} -> {seq}", *current);
        *current = seq;
        Ok(true)
    }
}
