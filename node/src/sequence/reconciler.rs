use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::block::cache::CacheError;
use crate::block::manager::{BlockManager, BlockManagerError};
use crate::block::types::transaction::Transaction;
use crate::chain::{ChainError, LocalChain};
use crate::config::SequenceConfiguration;
use crate::core::shutdown::Shutdown;
use crate::mainchain::types::MainBlock;
use crate::mainchain::MainChainClient;
use crate::sequence::types::{Operation, SequenceEntry};
use crate::utilities::backoff::Backoff;
use crate::utilities::hash::Hash;

pub(crate) type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Requested {requested} blocks from main chain but got {returned}")]
    BlockCountMismatch { requested: usize, returned: usize },
    #[error("Expected sequence {expected} from main chain but got {actual}")]
    SequenceMismatch { expected: i64, actual: i64 },
    #[error("Main chain couldn't resolve block {0}")]
    UnresolvedBlock(Hash),
    #[error("Cache didn't drain within {timeout:?}, {remaining} txs remain")]
    DrainTimeout { timeout: Duration, remaining: usize },
    #[error("Block manager error: {0}")]
    BlockManager(#[from] BlockManagerError),
    #[error("Local chain error: {0}")]
    Chain(#[from] ChainError),
}

impl ReconcileError {
    /// Main chain view is torn, continuing would build on garbage.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReconcileError::BlockCountMismatch { .. }
                | ReconcileError::SequenceMismatch { .. }
                | ReconcileError::UnresolvedBlock(_)
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Main chain has nothing beyond the current sequence
    CaughtUp,
    /// Main chain couldn't be reached
    Unavailable,
    /// Sequences `from..=to` were applied
    Applied { from: i64, to: i64 },
}

/// Replays the main chain sequence log into the transaction cache and the local chain.
pub struct SequenceReconciler<M: MainChainClient + ?Sized, C: LocalChain + ?Sized> {
    main_chain: Arc<M>,
    manager: Arc<BlockManager<C>>,
    config: SequenceConfiguration,
    executor_filter: String,
}

impl<M: MainChainClient + ?Sized, C: LocalChain + ?Sized> SequenceReconciler<M, C> {
    pub fn new(
        main_chain: Arc<M>,
        manager: Arc<BlockManager<C>>,
        config: SequenceConfiguration,
        executor_filter: String,
    ) -> Self {
        Self {
            main_chain,
            manager,
            config,
            executor_filter,
        }
    }

    pub(crate) async fn run(self, mut shutdown: Shutdown) -> anyhow::Result<()> {
        log::info!(
            "Sequence reconciler started at sequence {}, executor filter '{}'",
            self.manager.context().current_seq(),
            self.executor_filter
        );
        let poll_interval = self.config.poll_interval();
        let mut backoff = Backoff::new(poll_interval, self.config.max_backoff());
        let mut delay = poll_interval;
        loop {
            tokio::select! {
                _ = shutdown.shutdown_signal_rcv.recv() => {
                    log::info!("Shutting down sequence reconciler");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            delay = match self.reconcile().await {
                Ok(CycleOutcome::Applied { from, to }) => {
                    log::debug!(
                        "Applied sequences {from}..={to}, cache size: {}",
                        self.manager.context().cache.size()
                    );
                    backoff.reset();
                    poll_interval
                }
                Ok(CycleOutcome::CaughtUp) => {
                    backoff.reset();
                    poll_interval
                }
                Ok(CycleOutcome::Unavailable) => {
                    let delay = backoff.next_delay();
                    log::warn!("Main chain unavailable, retrying in {delay:?}");
                    delay
                }
                Err(err) if err.is_fatal() => {
                    log::error!("Main chain consistency fault, stopping: {err}");
                    return Err(err.into());
                }
                Err(err) => {
                    log::error!(
                        "Failed to reconcile sequence {}: {err}",
                        self.manager.context().current_seq()
                    );
                    poll_interval
                }
            };
        }
        Ok(())
    }

    /// One reconciliation cycle starting from the current sequence.
    pub async fn reconcile(&self) -> Result<CycleOutcome> {
        let context = self.manager.context();
        let start = context.current_seq();

        let highest = match self.main_chain.highest_sequence().await {
            Ok(highest) => highest,
            Err(err) => {
                log::warn!("Failed to get highest main chain sequence: {err}");
                return Ok(CycleOutcome::Unavailable);
            }
        };
        if highest < start {
            log::trace!("Caught up, highest main chain sequence {highest}, current {start}");
            return Ok(CycleOutcome::CaughtUp);
        }

        let end = highest.min(start + self.config.step() - 1);
        let entries = match self.main_chain.sequence_window(start, end).await {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("Failed to get main chain sequences {start}..={end}: {err}");
                return Ok(CycleOutcome::Unavailable);
            }
        };
        if entries.is_empty() {
            log::debug!("Main chain returned no sequences for {start}..={end}");
            return Ok(CycleOutcome::CaughtUp);
        }
        for (expected, entry) in (start..).zip(entries.iter()) {
            if entry.seq != expected {
                return Err(ReconcileError::SequenceMismatch {
                    expected,
                    actual: entry.seq,
                });
            }
        }

        let hashes = entries.iter().map(|e| e.block_hash).collect::<Vec<_>>();
        let blocks = match self.main_chain.blocks_by_hashes(&hashes).await {
            Ok(blocks) => blocks,
            Err(err) => {
                log::warn!("Failed to get main chain blocks: {err}");
                return Ok(CycleOutcome::Unavailable);
            }
        };
        if blocks.len() != hashes.len() {
            return Err(ReconcileError::BlockCountMismatch {
                requested: hashes.len(),
                returned: blocks.len(),
            });
        }

        let mut last = start;
        for (entry, block) in entries.into_iter().zip(blocks) {
            let block = block.ok_or(ReconcileError::UnresolvedBlock(entry.block_hash))?;
            self.apply(&entry, &block).await?;
            context.set_current_seq(entry.seq + 1);
            last = entry.seq;
        }
        Ok(CycleOutcome::Applied {
            from: start,
            to: last,
        })
    }

    async fn apply(&self, entry: &SequenceEntry, block: &MainBlock) -> Result<()> {
        let txs = block.txs_for_executor(&self.executor_filter);
        log::debug!(
            "Applying {entry}, main chain height {}, {} matching txs",
            block.height,
            txs.len()
        );
        match entry.operation {
            Operation::Add => {
                self.admit(entry.seq, txs);
                Ok(())
            }
            Operation::Del => self.revert(txs).await,
            Operation::Unknown(code) => {
                log::error!("Unknown operation {code} at sequence {}, skipping", entry.seq);
                Ok(())
            }
        }
    }

    /// Caches transactions which aren't in the local chain yet.
    ///
    /// After a restart sequences are reconciled again from the resume sequence, their
    /// transactions which already made it to a local block are skipped.
    fn admit(&self, seq: i64, txs: Vec<Transaction>) {
        let cache = &self.manager.context().cache;
        let chain = self.manager.chain();
        for tx in txs {
            let hash = tx.hash();
            match chain.tx_height(&hash) {
                Ok(height) => {
                    log::debug!("Transaction {hash} already at local height {height}, skipping");
                    continue;
                }
                Err(ChainError::TxNotFound(_)) => {}
                Err(err) => log::error!("Failed to look up transaction {hash}: {err}"),
            }
            match cache.push(tx, seq) {
                Ok(()) => {}
                Err(CacheError::Duplicate(hash)) => {
                    log::debug!("Transaction {hash} already cached, skipping")
                }
                Err(err) => log::error!("Failed to cache transaction: {err}"),
            }
        }
    }

    /// Un-admits reverted transactions and rebuilds the local chain from the highest local block
    /// which included any of them.
    async fn revert(&self, txs: Vec<Transaction>) -> Result<()> {
        let reverted = txs.iter().map(Transaction::hash).collect::<HashSet<_>>();

        let height = match self.revert_fork_height(&reverted) {
            Some(height) if height > 0 => height,
            _ => {
                log::debug!("No local block includes reverted transactions");
                return Ok(());
            }
        };
        log::info!("Reverted transactions included up to local height {height}");

        self.wait_drained().await?;
        self.rewrite_from(height, &reverted)
    }

    /// Removes reverted transactions from the cache and finds the highest local block
    /// including any of them.
    ///
    /// Runs under the head lock, a reverted transaction is either still cached or already
    /// in a local block, never in a block being built.
    fn revert_fork_height(&self, reverted: &HashSet<Hash>) -> Option<u64> {
        let cache = &self.manager.context().cache;
        let chain = self.manager.chain();
        let _head = self.manager.lock_head();

        let mut fork_height: Option<u64> = None;
        for hash in reverted {
            if cache.remove(hash).is_some() {
                log::debug!("Reverted transaction {hash} removed from cache");
                continue;
            }
            match chain.tx_height(hash) {
                Ok(height) => {
                    fork_height = Some(fork_height.map_or(height, |h| h.max(height)));
                }
                Err(ChainError::TxNotFound(_)) => {
                    log::debug!("Reverted transaction {hash} isn't in local chain")
                }
                Err(err) => log::error!("Failed to look up reverted transaction {hash}: {err}"),
            }
        }
        fork_height
    }

    /// Waits until the producer has blocked everything still cached.
    async fn wait_drained(&self) -> Result<()> {
        let cache = &self.manager.context().cache;
        let timeout = self.config.drain_timeout();
        let mut progress = tokio::time::interval(self.config.drain_poll());

        let drained = tokio::time::timeout(timeout, async {
            loop {
                tokio::select! {
                    _ = cache.wait_drained() => break,
                    _ = progress.tick() => {
                        log::info!("{} txs remain to be blocked", cache.size());
                    }
                }
            }
        })
        .await;

        drained.map_err(|_| ReconcileError::DrainTimeout {
            timeout,
            remaining: cache.size(),
        })
    }

    /// Replaces local blocks `height..=head` with blocks on top of `height - 1` holding
    /// the transactions which weren't reverted, in their original order.
    fn rewrite_from(&self, height: u64, reverted: &HashSet<Hash>) -> Result<()> {
        let chain = self.manager.chain();
        let mut head = self.manager.lock_head();

        if head.height < height {
            log::warn!(
                "Local head {} is already below fork height {height}",
                head.height
            );
            return Ok(());
        }

        let fork_point = chain.block_at(height - 1)?;
        let mut survivors = vec![];
        for h in height..=head.height {
            let block = chain.block_at(h)?;
            survivors.extend(
                block
                    .txs
                    .into_iter()
                    .filter(|tx| !reverted.contains(&tx.hash())),
            );
        }
        log::info!(
            "Rewriting local chain above height {}, {} txs survive",
            fork_point.height,
            survivors.len()
        );

        if survivors.is_empty() {
            self.manager.reset_head(&mut head, fork_point)?;
            return Ok(());
        }

        let max_tx_number = chain.chain_parameter(height).max_tx_number.max(1);
        let mut parent = fork_point;
        for batch in survivors.chunks(max_tx_number) {
            parent = self
                .manager
                .create_block(&mut head, &parent, batch.to_vec())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use crate::block::cache::TxCache;
    use crate::block::producer::{BlockProducer, ProduceOutcome};
    use crate::block::types::block::Block;
    use crate::block::watermark::{BlockedSeqTracker, SequenceStore};
    use crate::config::BlockConfiguration;
    use crate::core::context::SyncContext;
    use crate::core::shutdown::ShutdownManager;
    use crate::test_utils::{context, MemorySequenceStore, ScriptedMainChain, TestChain};

    use super::*;

    struct Fixture {
        main_chain: Arc<ScriptedMainChain>,
        chain: Arc<TestChain>,
        manager: Arc<BlockManager<TestChain>>,
        reconciler: SequenceReconciler<ScriptedMainChain, TestChain>,
    }

    fn fixture_with(config: SequenceConfiguration) -> Fixture {
        let main_chain = Arc::new(ScriptedMainChain::default());
        let chain = Arc::new(TestChain::with_genesis());
        let head = chain.last_block().unwrap().unwrap();
        let manager = Arc::new(BlockManager::new(chain.clone(), context(100), head));
        let reconciler = SequenceReconciler::new(
            main_chain.clone(),
            manager.clone(),
            config,
            "ticket".to_string(),
        );
        Fixture {
            main_chain,
            chain,
            manager,
            reconciler,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(SequenceConfiguration {
            poll_interval_ms: 1,
            drain_timeout_sec: 5,
            drain_poll_ms: 10,
            ..SequenceConfiguration::default()
        })
    }

    fn ticket(n: u8) -> Transaction {
        Transaction::new("ticket", vec![n], 0)
    }

    fn coins(n: u8) -> Transaction {
        Transaction::new("coins", vec![n], 0)
    }

    fn commit(fixture: &Fixture, txs: Vec<Transaction>) -> Block {
        let mut head = fixture.manager.lock_head();
        let parent = head.clone();
        fixture.manager.create_block(&mut head, &parent, txs).unwrap()
    }

    #[tokio::test]
    async fn test_add_admits_matching_txs_and_block_settles_them() {
        let fixture = fixture();
        fixture
            .main_chain
            .push(Operation::Add, MainBlock::new(1, vec![ticket(1), coins(2)]));

        let outcome = fixture.reconciler.reconcile().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Applied { from: 0, to: 0 });

        let context = fixture.manager.context().clone();
        assert_eq!(context.current_seq(), 1);
        assert_eq!(context.cache.size(), 1);
        assert_eq!(context.cache.get(&ticket(1).hash()).unwrap().seq, 0);
        assert!(!context.cache.exists(&coins(2).hash()));

        let config = BlockConfiguration::default();
        let mut producer = BlockProducer::new(fixture.manager.clone(), config, 5);
        let block = assert_matches!(producer.produce(), ProduceOutcome::Block(block) => block);

        assert_eq!(block.txs, vec![ticket(1)]);
        assert!(context.cache.is_empty());
        assert_eq!(context.watermark.get(), 0);
    }

    #[tokio::test]
    async fn test_caught_up() {
        let fixture = fixture();
        assert_eq!(
            fixture.reconciler.reconcile().await.unwrap(),
            CycleOutcome::CaughtUp
        );

        fixture
            .main_chain
            .push(Operation::Add, MainBlock::new(1, vec![ticket(1)]));
        fixture.reconciler.reconcile().await.unwrap();

        assert_eq!(
            fixture.reconciler.reconcile().await.unwrap(),
            CycleOutcome::CaughtUp
        );
        assert_eq!(fixture.manager.context().current_seq(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_main_chain_is_not_an_error() {
        let fixture = fixture();
        fixture
            .main_chain
            .push(Operation::Add, MainBlock::new(1, vec![ticket(1)]));
        fixture.main_chain.set_unavailable(true);

        assert_eq!(
            fixture.reconciler.reconcile().await.unwrap(),
            CycleOutcome::Unavailable
        );
        assert_eq!(fixture.manager.context().current_seq(), 0);

        fixture.main_chain.set_unavailable(false);
        assert_eq!(
            fixture.reconciler.reconcile().await.unwrap(),
            CycleOutcome::Applied { from: 0, to: 0 }
        );
    }

    #[tokio::test]
    async fn test_duplicate_add_is_skipped() {
        let fixture = fixture();
        fixture
            .main_chain
            .push(Operation::Add, MainBlock::new(1, vec![ticket(1)]));
        fixture
            .main_chain
            .push(Operation::Add, MainBlock::new(2, vec![ticket(1), ticket(2)]));

        fixture.reconciler.reconcile().await.unwrap();
        fixture.reconciler.reconcile().await.unwrap();

        let cache = &fixture.manager.context().cache;
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.get(&ticket(1).hash()).unwrap().seq, 0);
        assert_eq!(fixture.manager.context().current_seq(), 2);
    }

    #[tokio::test]
    async fn test_unknown_operation_advances() {
        let fixture = fixture();
        fixture
            .main_chain
            .push(Operation::Unknown(7), MainBlock::new(1, vec![ticket(1)]));

        assert_eq!(
            fixture.reconciler.reconcile().await.unwrap(),
            CycleOutcome::Applied { from: 0, to: 0 }
        );
        assert_eq!(fixture.manager.context().current_seq(), 1);
        assert!(fixture.manager.context().cache.is_empty());
    }

    #[tokio::test]
    async fn test_step_applies_several_sequences() {
        let fixture = fixture_with(SequenceConfiguration {
            step: 3,
            ..SequenceConfiguration::default()
        });
        for n in 0..5 {
            fixture
                .main_chain
                .push(Operation::Add, MainBlock::new(n as i64, vec![ticket(n)]));
        }

        assert_eq!(
            fixture.reconciler.reconcile().await.unwrap(),
            CycleOutcome::Applied { from: 0, to: 2 }
        );
        assert_eq!(
            fixture.reconciler.reconcile().await.unwrap(),
            CycleOutcome::Applied { from: 3, to: 4 }
        );
        let cache = &fixture.manager.context().cache;
        assert_eq!(cache.size(), 5);
        assert_eq!(cache.get(&ticket(4).hash()).unwrap().seq, 4);
    }

    #[tokio::test]
    async fn test_block_count_mismatch_is_fatal() {
        let fixture = fixture();
        fixture
            .main_chain
            .push(Operation::Add, MainBlock::new(1, vec![ticket(1)]));
        fixture.main_chain.return_extra_block(true);

        let err = fixture.reconciler.reconcile().await.unwrap_err();
        assert_matches!(
            err,
            ReconcileError::BlockCountMismatch {
                requested: 1,
                returned: 2
            }
        );
        assert!(err.is_fatal());
        assert_eq!(fixture.manager.context().current_seq(), 0);
    }

    #[tokio::test]
    async fn test_sequence_mismatch_is_fatal() {
        let fixture = fixture();
        fixture
            .main_chain
            .push(Operation::Add, MainBlock::new(1, vec![ticket(1)]));
        fixture.main_chain.shift_sequences(3);

        let err = fixture.reconciler.reconcile().await.unwrap_err();
        assert_matches!(
            err,
            ReconcileError::SequenceMismatch {
                expected: 0,
                actual: 3
            }
        );
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_unresolved_block_is_fatal() {
        let fixture = fixture();
        let hash = fixture
            .main_chain
            .push(Operation::Add, MainBlock::new(1, vec![ticket(1)]));
        fixture.main_chain.forget_block(&hash);

        let err = fixture.reconciler.reconcile().await.unwrap_err();
        assert_matches!(err, ReconcileError::UnresolvedBlock(h) if h == hash);
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_revert_of_cached_txs_only_touches_cache() {
        let fixture = fixture();
        let block = MainBlock::new(1, vec![ticket(1), ticket(2)]);
        fixture.main_chain.push(Operation::Add, block.clone());
        fixture.main_chain.push(Operation::Del, block);

        fixture.reconciler.reconcile().await.unwrap();
        assert_eq!(fixture.manager.context().cache.size(), 2);

        fixture.reconciler.reconcile().await.unwrap();
        assert!(fixture.manager.context().cache.is_empty());
        assert_eq!(fixture.chain.height(), 0);
        assert_eq!(fixture.manager.context().current_seq(), 2);
    }

    #[tokio::test]
    async fn test_revert_rebuilds_block_without_reverted_txs() {
        let fixture = fixture();
        let base = commit(&fixture, vec![ticket(9)]);
        let original = commit(&fixture, vec![ticket(1), ticket(2), ticket(3)]);

        fixture
            .main_chain
            .push(Operation::Del, MainBlock::new(5, vec![ticket(2)]));
        fixture.reconciler.reconcile().await.unwrap();

        let head = fixture.manager.current_block();
        assert_eq!(head.height, original.height);
        assert_eq!(head.parent_hash, base.hash());
        assert_eq!(head.txs, vec![ticket(1), ticket(3)]);
        assert_ne!(head.hash(), original.hash());
        assert_eq!(fixture.chain.last_block().unwrap(), Some(head));
    }

    #[tokio::test]
    async fn test_revert_keeps_txs_of_later_blocks() {
        let fixture = fixture();
        let base = commit(&fixture, vec![ticket(9)]);
        commit(&fixture, vec![ticket(1), ticket(2)]);
        commit(&fixture, vec![ticket(3)]);

        fixture
            .main_chain
            .push(Operation::Del, MainBlock::new(5, vec![ticket(2)]));
        fixture.reconciler.reconcile().await.unwrap();

        let head = fixture.manager.current_block();
        assert_eq!(head.height, 2);
        assert_eq!(head.parent_hash, base.hash());
        assert_eq!(head.txs, vec![ticket(1), ticket(3)]);
        assert_eq!(fixture.chain.height(), 2);
    }

    #[tokio::test]
    async fn test_revert_of_whole_block_resets_head() {
        let fixture = fixture();
        let base = commit(&fixture, vec![ticket(9)]);
        commit(&fixture, vec![ticket(1)]);

        fixture
            .main_chain
            .push(Operation::Del, MainBlock::new(5, vec![ticket(1)]));
        fixture.reconciler.reconcile().await.unwrap();

        assert_eq!(fixture.manager.current_block(), base);
        assert_eq!(fixture.chain.last_block().unwrap(), Some(base));
    }

    #[tokio::test]
    async fn test_revert_waits_for_cache_to_drain() {
        let fixture = fixture();
        commit(&fixture, vec![ticket(1), ticket(2)]);
        fixture.manager.context().cache.push(ticket(5), 0).unwrap();
        fixture
            .main_chain
            .push(Operation::Del, MainBlock::new(5, vec![ticket(2)]));

        let context = fixture.manager.context().clone();
        let drainer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            context.cache.remove(&ticket(5).hash());
        });

        fixture.reconciler.reconcile().await.unwrap();
        drainer.await.unwrap();

        let head = fixture.manager.current_block();
        assert_eq!(head.height, 1);
        assert_eq!(head.txs, vec![ticket(1)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_revert_waits_for_block_being_built() {
        let fixture = fixture();
        fixture
            .main_chain
            .push(Operation::Add, MainBlock::new(1, vec![ticket(1), ticket(2)]));
        fixture
            .main_chain
            .push(Operation::Del, MainBlock::new(2, vec![ticket(2)]));
        fixture.reconciler.reconcile().await.unwrap();

        let (entered, release) = fixture.chain.pause_next_execution();
        let mut producer =
            BlockProducer::new(fixture.manager.clone(), BlockConfiguration::default(), 5);
        let building = std::thread::spawn(move || producer.produce());
        entered.recv().unwrap();

        let reconciler = fixture.reconciler;
        let reverting = tokio::spawn(async move { reconciler.reconcile().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reverting.is_finished());

        release.send(()).unwrap();
        let built = assert_matches!(building.join().unwrap(), ProduceOutcome::Block(block) => block);
        assert_eq!(built.txs, vec![ticket(1), ticket(2)]);
        assert_eq!(
            reverting.await.unwrap().unwrap(),
            CycleOutcome::Applied { from: 1, to: 1 }
        );

        let head = fixture.manager.current_block();
        assert_eq!(head.height, 1);
        assert_eq!(head.txs, vec![ticket(1)]);
        assert_matches!(
            fixture.chain.tx_height(&ticket(2).hash()),
            Err(ChainError::TxNotFound(_))
        );
    }

    fn node_on(
        store: Arc<MemorySequenceStore>,
        main_chain: Arc<ScriptedMainChain>,
        chain: Arc<TestChain>,
    ) -> (
        SequenceReconciler<ScriptedMainChain, TestChain>,
        BlockProducer<TestChain>,
    ) {
        let watermark = BlockedSeqTracker::load(store).unwrap();
        let context = Arc::new(SyncContext::new(TxCache::new(100), watermark));
        let head = chain.last_block().unwrap().unwrap();
        let manager = Arc::new(BlockManager::new(chain, context, head));
        let reconciler = SequenceReconciler::new(
            main_chain,
            manager.clone(),
            SequenceConfiguration::default(),
            "ticket".to_string(),
        );
        (
            reconciler,
            BlockProducer::new(manager, BlockConfiguration::default(), 5),
        )
    }

    async fn catch_up(reconciler: &SequenceReconciler<ScriptedMainChain, TestChain>) {
        while reconciler.reconcile().await.unwrap() != CycleOutcome::CaughtUp {}
    }

    #[tokio::test]
    async fn test_restart_replays_sequences_with_unblocked_txs() {
        let store = Arc::new(MemorySequenceStore::default());
        let main_chain = Arc::new(ScriptedMainChain::default());
        let chain = Arc::new(TestChain::with_genesis());
        main_chain.push(Operation::Add, MainBlock::new(1, vec![ticket(1)]));
        for n in 2..11 {
            main_chain.push(Operation::Add, MainBlock::new(n, vec![coins(n as u8)]));
        }
        main_chain.push(Operation::Add, MainBlock::new(11, vec![ticket(2)]));

        let (reconciler, mut producer) = node_on(store.clone(), main_chain.clone(), chain.clone());
        catch_up(&reconciler).await;
        let block = assert_matches!(producer.produce(), ProduceOutcome::Block(block) => block);
        assert_eq!(block.txs, vec![ticket(2)]);
        assert_eq!(store.load_blocked_seq().unwrap(), Some(10));
        assert_eq!(reconciler.manager.context().watermark.resume_seq(), 0);

        //Node goes down with ticket(1) only in memory
        drop((reconciler, producer));

        let (reconciler, mut producer) = node_on(store, main_chain, chain.clone());
        assert_eq!(reconciler.manager.context().current_seq(), 0);
        catch_up(&reconciler).await;

        let cache = &reconciler.manager.context().cache;
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get(&ticket(1).hash()).unwrap().seq, 0);

        let block = assert_matches!(producer.produce(), ProduceOutcome::Block(block) => block);
        assert_eq!(block.txs, vec![ticket(1)]);
        assert_eq!(chain.height(), 2);
    }

    #[tokio::test]
    async fn test_drain_timeout_is_retryable() {
        let fixture = fixture_with(SequenceConfiguration {
            drain_timeout_sec: 0,
            ..SequenceConfiguration::default()
        });
        let original = commit(&fixture, vec![ticket(1), ticket(2)]);
        fixture.manager.context().cache.push(ticket(5), 0).unwrap();
        fixture
            .main_chain
            .push(Operation::Del, MainBlock::new(5, vec![ticket(2)]));

        let err = fixture.reconciler.reconcile().await.unwrap_err();
        assert_matches!(err, ReconcileError::DrainTimeout { remaining: 1, .. });
        assert!(!err.is_fatal());
        assert_eq!(fixture.manager.context().current_seq(), 0);
        assert_eq!(fixture.manager.current_block(), original);
    }

    #[tokio::test]
    async fn test_run_stops_on_fatal_error() {
        let fixture = fixture();
        fixture
            .main_chain
            .push(Operation::Add, MainBlock::new(1, vec![ticket(1)]));
        fixture.main_chain.return_extra_block(true);

        let (manager, _handle) = ShutdownManager::init();
        let result = fixture.reconciler.run(manager.subscribe()).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let fixture = fixture();
        fixture.main_chain.set_unavailable(true);

        let (manager, _handle) = ShutdownManager::init();
        let shutdown = manager.subscribe();
        let task = tokio::spawn(fixture.reconciler.run(shutdown));
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.shutdown_tx.send(()).unwrap();

        assert!(task.await.unwrap().is_ok());
    }
}
