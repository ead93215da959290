//! Sequence aware cache of transactions admitted from the main chain.
//!
//! Reading (`pull`) and removal are separate operations. Block producer pulls a batch,
//! and only after the block made it to the chain the batch is removed. A failed commit
//! leaves everything in place and the same transactions are pulled again next time.
use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

use crate::block::types::transaction::Transaction;
use crate::utilities::hash::Hash;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    #[error("Transaction is already in cache: {0}")]
    Duplicate(Hash),
    #[error("Cache is full and transaction {hash} at sequence {seq} is older than all cached ones")]
    Capacity { hash: Hash, seq: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub tx: Transaction,
    ///Main chain sequence which admitted the transaction
    pub seq: i64,
}

#[derive(Default)]
struct Entries {
    by_hash: HashMap<Hash, (CacheEntry, u64)>,
    ///(sequence, insertion order) -> hash
    by_seq: BTreeMap<(i64, u64), Hash>,
    next_insertion: u64,
}

impl Entries {
    fn remove(&mut self, hash: &Hash) -> Option<CacheEntry> {
        let (entry, insertion) = self.by_hash.remove(hash)?;
        self.by_seq.remove(&(entry.seq, insertion));
        Some(entry)
    }

    fn lowest_seq(&self) -> Option<i64> {
        self.by_seq.keys().next().map(|(seq, _)| *seq)
    }

    fn highest_seq(&self) -> Option<i64> {
        self.by_seq.keys().next_back().map(|(seq, _)| *seq)
    }
}

pub struct TxCache {
    capacity: usize,
    entries: Mutex<Entries>,
    ///Fired every time the cache becomes empty
    drained: Notify,
}

impl TxCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
            drained: Notify::new(),
        }
    }

    /// Adds transaction admitted by sequence `seq`.
    ///
    /// When the cache is full the entry with the lowest sequence is evicted first.
    pub fn push(&self, tx: Transaction, seq: i64) -> Result<(), CacheError> {
        let hash = tx.hash();
        let mut entries = self.entries.lock();

        if entries.by_hash.contains_key(&hash) {
            return Err(CacheError::Duplicate(hash));
        }

        if entries.by_hash.len() >= self.capacity {
            match entries.lowest_seq() {
                Some(lowest) if lowest <= seq => {
                    if let Some((_, evicted)) = entries.by_seq.pop_first() {
                        if let Some((entry, _)) = entries.by_hash.remove(&evicted) {
                            log::warn!(
                                "Cache full, evicted transaction {evicted} at sequence {}",
                                entry.seq
                            );
                        }
                    }
                }
                _ => return Err(CacheError::Capacity { hash, seq }),
            }
        }

        let insertion = entries.next_insertion;
        entries.next_insertion += 1;
        entries.by_seq.insert((seq, insertion), hash);
        entries.by_hash.insert(hash, (CacheEntry { tx, seq }, insertion));

        log::trace!("Cache size after push: {}", entries.by_hash.len());
        Ok(())
    }

    pub fn exists(&self, hash: &Hash) -> bool {
        self.entries.lock().by_hash.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<CacheEntry> {
        self.entries
            .lock()
            .by_hash
            .get(hash)
            .map(|(entry, _)| entry.clone())
    }

    /// Removes the transaction if present.
    pub fn remove(&self, hash: &Hash) -> Option<CacheEntry> {
        let (removed, now_empty) = {
            let mut entries = self.entries.lock();
            let removed = entries.remove(hash);
            (removed, entries.by_hash.is_empty())
        };
        if removed.is_some() && now_empty {
            self.drained.notify_waiters();
        }
        removed
    }

    /// Removes all given transactions which are cached.
    /// Returns the highest sequence among the removed ones.
    pub fn remove_txs(&self, txs: &[Transaction]) -> Option<i64> {
        let (highest, now_empty) = {
            let mut entries = self.entries.lock();
            let highest = txs
                .iter()
                .filter_map(|tx| entries.remove(&tx.hash()))
                .map(|entry| entry.seq)
                .max();
            (highest, entries.by_hash.is_empty())
        };
        if highest.is_some() && now_empty {
            self.drained.notify_waiters();
        }
        highest
    }

    pub fn size(&self) -> usize {
        self.entries.lock().by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Lowest sequence among cached transactions.
    pub fn lowest_seq(&self) -> Option<i64> {
        self.entries.lock().lowest_seq()
    }

    /// Returns up to `max_count` transactions ordered by sequence.
    ///
    /// Only transactions admitted within the last `seq_range` sequences(counted from the highest
    /// cached one) are eligible, older ones wait until newer ones leave the cache.
    /// Nothing is removed.
    pub fn pull(&self, max_count: usize, seq_range: i64, exclude: &[Hash]) -> Vec<Transaction> {
        let entries = self.entries.lock();
        let highest = match entries.highest_seq() {
            Some(highest) => highest,
            None => return vec![],
        };
        let lowest_allowed = highest.saturating_sub(seq_range).saturating_add(1);

        entries
            .by_seq
            .range((lowest_allowed, 0)..)
            .filter(|(_, hash)| !exclude.contains(*hash))
            .take(max_count)
            .filter_map(|(_, hash)| entries.by_hash.get(hash))
            .map(|(entry, _)| entry.tx.clone())
            .collect()
    }

    /// Completes when the cache has no entries.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
