use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::block::types::transaction::Transaction;
use crate::utilities::hash::Hash;
use crate::utilities::merkle::Merkle;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Block {
    pub parent_hash: Hash,
    pub height: u64,
    ///Merkle root of `txs`
    pub tx_hash: Hash,
    ///State after executing the block. Filled in by the executor.
    pub state_hash: Hash,
    pub difficulty: u32,
    ///Unix time in seconds
    pub block_time: i64,
    pub txs: Vec<Transaction>,
}

impl Block {
    pub(crate) fn new_genesis_block(difficulty: u32, block_time: i64) -> Self {
        Self {
            parent_hash: Hash::ZERO,
            height: 0,
            tx_hash: Hash::ZERO,
            state_hash: Hash::ZERO,
            difficulty,
            block_time,
            txs: Vec::new(),
        }
    }

    /// Child of `parent` containing `txs`. State hash is left to the executor.
    pub(crate) fn new_child(
        parent: &Block,
        txs: Vec<Transaction>,
        difficulty: u32,
        block_time: i64,
    ) -> Self {
        let tx_hash = Merkle::calculate_root(&txs.iter().map(Transaction::hash).collect::<Vec<_>>());
        Self {
            parent_hash: parent.hash(),
            height: parent.height + 1,
            tx_hash,
            state_hash: Hash::ZERO,
            difficulty,
            block_time,
            txs,
        }
    }

    /// Hash of the header. Transactions are covered through `tx_hash`.
    pub fn hash(&self) -> Hash {
        let mut bytes = Vec::with_capacity(32 * 3 + 8 + 4 + 8);
        bytes.extend_from_slice(self.parent_hash.as_bytes());
        bytes.extend_from_slice(&self.height.to_be_bytes());
        bytes.extend_from_slice(self.tx_hash.as_bytes());
        bytes.extend_from_slice(self.state_hash.as_bytes());
        bytes.extend_from_slice(&self.difficulty.to_be_bytes());
        bytes.extend_from_slice(&self.block_time.to_be_bytes());
        Hash::digest(&bytes)
    }

    pub fn tx_hashes(&self) -> Vec<Hash> {
        self.txs.iter().map(Transaction::hash).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hash = self.hash();
        let height = self.height;
        let parent = &self.parent_hash;
        write!(
            f,
            "hash: {hash}, height: {height}, parent: {parent}, nr of txs: {}",
            self.txs.len()
        )
    }
}

/// Block after execution, as handed to storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlockDetail {
    pub block: Block,
    pub prev_state_hash: Hash,
}

/// Result of a successful execution. Executor may leave out transactions it couldn't include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedBlock {
    pub detail: BlockDetail,
    pub dropped: Vec<Transaction>,
}
