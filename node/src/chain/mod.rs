//! Local chain collaborator: transaction lookup, block queries, execution and commit.
use thiserror::Error;

use crate::block::types::block::{Block, BlockDetail, ExecutedBlock};
use crate::block::types::transaction::Transaction;
use crate::utilities::hash::Hash;

pub mod node;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Transaction not found: {0}")]
    TxNotFound(Hash),
    #[error("Block not found at height {0}")]
    BlockNotFound(u64),
    #[error("Block execution failed: {reason}")]
    ExecutionFailed {
        reason: String,
        ///Transactions the executor dropped before failing
        dropped: Vec<Transaction>,
    },
    #[error("Block rejected: {0}")]
    Rejected(String),
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainParameter {
    pub max_tx_number: usize,
    pub difficulty: u32,
}

pub const DEFAULT_MAX_TX_NUMBER: usize = 1500;
pub const DEFAULT_DIFFICULTY: u32 = 0x1f00_ffff;

impl Default for ChainParameter {
    fn default() -> Self {
        Self {
            max_tx_number: DEFAULT_MAX_TX_NUMBER,
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

/// Everything the driver needs from the local parachain node.
///
/// Calls are synchronous and expected to be reasonably fast, they are made while
/// the local head is locked.
pub trait LocalChain: Send + Sync {
    /// Height of the local block which contains the transaction.
    fn tx_height(&self, hash: &Hash) -> Result<u64>;

    fn block_at(&self, height: u64) -> Result<Block>;

    fn last_block(&self) -> Result<Option<Block>>;

    /// Executes `block` on top of state `prev_state_hash`.
    fn execute_block(&self, prev_state_hash: &Hash, block: Block) -> Result<ExecutedBlock>;

    /// Persists an executed block. The chain decides whether it accepts it.
    fn commit_block(&self, detail: &BlockDetail) -> Result<()>;

    /// Makes `block` the last block, forgetting everything above it.
    fn set_head(&self, block: &Block) -> Result<()>;

    /// True when the node is caught up and allowed to produce blocks.
    fn is_mining_ready(&self) -> bool;

    fn chain_parameter(&self, height: u64) -> ChainParameter;
}
