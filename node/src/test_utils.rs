use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::block::cache::TxCache;
use crate::block::types::block::{Block, BlockDetail, ExecutedBlock};
use crate::block::types::transaction::Transaction;
use crate::block::watermark::{BlockedSeqTracker, SequenceStore};
use crate::chain::{ChainError, ChainParameter, LocalChain, Result as ChainResult};
use crate::config::DatabaseConfiguration;
use crate::core::context::SyncContext;
use crate::mainchain::types::MainBlock;
use crate::mainchain::{MainChainClient, Result as TransportResult, TransportError};
use crate::sequence::types::{Operation, SequenceEntry};
use crate::utilities::hash::Hash;
use crate::utilities::merkle::Merkle;

pub(crate) fn temp_database_config() -> DatabaseConfiguration {
    let path = std::env::temp_dir().join(format!("parachain-test-{}", uuid::Uuid::new_v4()));
    DatabaseConfiguration {
        rocksdb_path: path.to_string_lossy().into_owned(),
        create_if_not_exists: true,
    }
}

pub(crate) fn context(capacity: usize) -> Arc<SyncContext> {
    let watermark = BlockedSeqTracker::load(Arc::new(MemorySequenceStore::default()))
        .expect("memory store doesn't fail");
    Arc::new(SyncContext::new(TxCache::new(capacity), watermark))
}

#[derive(Default)]
pub(crate) struct MemorySequenceStore {
    seq: Mutex<Option<i64>>,
    resume: Mutex<Option<i64>>,
    fail_writes: AtomicBool,
}

impl MemorySequenceStore {
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }
}

impl SequenceStore for MemorySequenceStore {
    fn load_blocked_seq(&self) -> anyhow::Result<Option<i64>> {
        Ok(*self.seq.lock())
    }

    fn store_blocked_seq(&self, seq: i64) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            anyhow::bail!("write failure");
        }
        *self.seq.lock() = Some(seq);
        Ok(())
    }

    fn load_resume_seq(&self) -> anyhow::Result<Option<i64>> {
        Ok(*self.resume.lock())
    }

    fn store_resume_seq(&self, seq: i64) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            anyhow::bail!("write failure");
        }
        *self.resume.lock() = Some(seq);
        Ok(())
    }
}

struct ChainState {
    blocks: Vec<Block>,
    reject_commits: bool,
    fail_execution: bool,
    dropped: Vec<Hash>,
    max_tx_number: usize,
}

/// Holds an execution until the test releases it.
struct ExecutionGate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// In memory local chain with failure injection.
pub(crate) struct TestChain {
    state: Mutex<ChainState>,
    mining: AtomicBool,
    gate: Mutex<Option<ExecutionGate>>,
}

impl TestChain {
    pub(crate) fn with_genesis() -> Self {
        let parameter = ChainParameter::default();
        Self {
            state: Mutex::new(ChainState {
                blocks: vec![Block::new_genesis_block(parameter.difficulty, 0)],
                reject_commits: false,
                fail_execution: false,
                dropped: vec![],
                max_tx_number: parameter.max_tx_number,
            }),
            mining: AtomicBool::new(true),
            gate: Mutex::new(None),
        }
    }

    /// Next block execution signals `entered` and waits until `release` is sent.
    pub(crate) fn pause_next_execution(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        *self.gate.lock() = Some(ExecutionGate {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    pub(crate) fn reject_commits(&self, reject: bool) {
        self.state.lock().reject_commits = reject;
    }

    pub(crate) fn fail_execution(&self, fail: bool) {
        self.state.lock().fail_execution = fail;
    }

    /// Executor drops these transactions from every block.
    pub(crate) fn drop_txs(&self, hashes: Vec<Hash>) {
        self.state.lock().dropped = hashes;
    }

    pub(crate) fn set_max_tx_number(&self, max: usize) {
        self.state.lock().max_tx_number = max;
    }

    pub(crate) fn set_mining_ready(&self, ready: bool) {
        self.mining.store(ready, Ordering::Relaxed);
    }

    pub(crate) fn height(&self) -> u64 {
        self.state.lock().blocks.len() as u64 - 1
    }
}

impl LocalChain for TestChain {
    fn tx_height(&self, hash: &Hash) -> ChainResult<u64> {
        self.state
            .lock()
            .blocks
            .iter()
            .find(|block| block.txs.iter().any(|tx| tx.hash() == *hash))
            .map(|block| block.height)
            .ok_or(ChainError::TxNotFound(*hash))
    }

    fn block_at(&self, height: u64) -> ChainResult<Block> {
        self.state
            .lock()
            .blocks
            .get(height as usize)
            .cloned()
            .ok_or(ChainError::BlockNotFound(height))
    }

    fn last_block(&self) -> ChainResult<Option<Block>> {
        Ok(self.state.lock().blocks.last().cloned())
    }

    fn execute_block(&self, prev_state_hash: &Hash, mut block: Block) -> ChainResult<ExecutedBlock> {
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }

        let state = self.state.lock();
        let (dropped, kept): (Vec<Transaction>, Vec<Transaction>) = block
            .txs
            .into_iter()
            .partition(|tx| state.dropped.contains(&tx.hash()));

        if state.fail_execution {
            return Err(ChainError::ExecutionFailed {
                reason: "test failure".to_string(),
                dropped,
            });
        }

        if !dropped.is_empty() {
            block.tx_hash = Merkle::calculate_root(&kept.iter().map(Transaction::hash).collect::<Vec<_>>());
        }
        block.txs = kept;
        block.state_hash = if block.txs.is_empty() {
            *prev_state_hash
        } else {
            let mut bytes = prev_state_hash.as_bytes().to_vec();
            bytes.extend_from_slice(block.tx_hash.as_bytes());
            Hash::digest(&bytes)
        };
        Ok(ExecutedBlock {
            detail: BlockDetail {
                block,
                prev_state_hash: *prev_state_hash,
            },
            dropped,
        })
    }

    fn commit_block(&self, detail: &BlockDetail) -> ChainResult<()> {
        let mut state = self.state.lock();
        if state.reject_commits {
            return Err(ChainError::Rejected("test rejection".to_string()));
        }
        let block = &detail.block;
        if block.height == 0 {
            return Err(ChainError::Rejected("genesis exists".to_string()));
        }
        let parent = state
            .blocks
            .get(block.height as usize - 1)
            .ok_or_else(|| ChainError::Rejected("no parent".to_string()))?;
        if parent.hash() != block.parent_hash {
            return Err(ChainError::Rejected("parent mismatch".to_string()));
        }
        state.blocks.truncate(block.height as usize);
        state.blocks.push(block.clone());
        Ok(())
    }

    fn set_head(&self, block: &Block) -> ChainResult<()> {
        let mut state = self.state.lock();
        match state.blocks.get(block.height as usize) {
            Some(stored) if stored == block => {
                state.blocks.truncate(block.height as usize + 1);
                Ok(())
            }
            _ => Err(ChainError::BlockNotFound(block.height)),
        }
    }

    fn is_mining_ready(&self) -> bool {
        self.mining.load(Ordering::Relaxed)
    }

    fn chain_parameter(&self, _height: u64) -> ChainParameter {
        ChainParameter {
            max_tx_number: self.state.lock().max_tx_number,
            ..ChainParameter::default()
        }
    }
}

#[derive(Default)]
struct Script {
    entries: Vec<SequenceEntry>,
    blocks: HashMap<Hash, MainBlock>,
    unavailable: bool,
    sequence_shift: i64,
    extra_block: bool,
}

/// Main chain whose sequence log is written by the test.
#[derive(Default)]
pub(crate) struct ScriptedMainChain {
    script: Mutex<Script>,
}

impl ScriptedMainChain {
    /// Appends an event for `block` to the log and returns the block hash.
    pub(crate) fn push(&self, operation: Operation, block: MainBlock) -> Hash {
        let hash = Hash::digest(&serde_json::to_vec(&block).expect("block serializes"));
        let mut script = self.script.lock();
        let seq = script.entries.len() as i64;
        script.entries.push(SequenceEntry::new(seq, operation, hash));
        script.blocks.insert(hash, block);
        hash
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.script.lock().unavailable = unavailable;
    }

    /// Shifts sequence numbers of returned entries.
    pub(crate) fn shift_sequences(&self, shift: i64) {
        self.script.lock().sequence_shift = shift;
    }

    pub(crate) fn return_extra_block(&self, extra: bool) {
        self.script.lock().extra_block = extra;
    }

    pub(crate) fn forget_block(&self, hash: &Hash) {
        self.script.lock().blocks.remove(hash);
    }

    fn check_available(script: &Script) -> TransportResult<()> {
        if script.unavailable {
            return Err(TransportError::Rpc {
                code: -1,
                message: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MainChainClient for ScriptedMainChain {
    async fn highest_sequence(&self) -> TransportResult<i64> {
        let script = self.script.lock();
        Self::check_available(&script)?;
        Ok(script.entries.len() as i64 - 1)
    }

    async fn sequence_window(&self, start: i64, end: i64) -> TransportResult<Vec<SequenceEntry>> {
        let script = self.script.lock();
        Self::check_available(&script)?;
        Ok(script
            .entries
            .iter()
            .filter(|entry| entry.seq >= start && entry.seq <= end)
            .map(|entry| {
                let mut entry = entry.clone();
                entry.seq += script.sequence_shift;
                entry
            })
            .collect())
    }

    async fn blocks_by_hashes(&self, hashes: &[Hash]) -> TransportResult<Vec<Option<MainBlock>>> {
        let script = self.script.lock();
        Self::check_available(&script)?;
        let mut blocks = hashes
            .iter()
            .map(|hash| script.blocks.get(hash).cloned())
            .collect::<Vec<_>>();
        if script.extra_block {
            blocks.push(None);
        }
        Ok(blocks)
    }
}
