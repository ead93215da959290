use std::sync::atomic::{AtomicI64, Ordering};

use crate::block::cache::TxCache;
use crate::block::watermark::BlockedSeqTracker;

/// State shared by the sequence reconciler and the block producer.
pub struct SyncContext {
    pub cache: TxCache,
    pub watermark: BlockedSeqTracker,
    ///Next main chain sequence to reconcile
    current_seq: AtomicI64,
}

impl SyncContext {
    /// Reconciliation resumes from the lowest sequence which may have unblocked transactions.
    pub fn new(cache: TxCache, watermark: BlockedSeqTracker) -> Self {
        let current_seq = AtomicI64::new(watermark.resume_seq());
        Self {
            cache,
            watermark,
            current_seq,
        }
    }

    pub fn current_seq(&self) -> i64 {
        self.current_seq.load(Ordering::Acquire)
    }

    pub(crate) fn set_current_seq(&self, seq: i64) {
        self.current_seq.store(seq, Ordering::Release);
    }

    /// How many sequences have been reconciled but not yet blocked.
    pub fn sequence_gap(&self) -> i64 {
        self.current_seq() - self.watermark.get()
    }
}
