use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::block::types::block::{Block, BlockDetail, ExecutedBlock};
use crate::chain::{ChainError, ChainParameter, LocalChain, Result};
use crate::storage::ParachainDatabase;
use crate::utilities::hash::Hash;

/// Storage backed local chain.
///
/// Parachain doesn't check transactions, execution passes all of them through and only
/// derives the new state hash. Commit verifies that the block extends a stored block.
pub struct LocalNode<D: ParachainDatabase + ?Sized> {
    database: Arc<D>,
    mining: AtomicBool,
    parameter: ChainParameter,
}

impl<D: ParachainDatabase + ?Sized> LocalNode<D> {
    pub fn new(database: Arc<D>, mining: bool) -> Self {
        Self {
            database,
            mining: AtomicBool::new(mining),
            parameter: ChainParameter::default(),
        }
    }

    pub fn set_mining(&self, mining: bool) {
        self.mining.store(mining, Ordering::Relaxed);
    }

    fn next_state_hash(prev_state_hash: &Hash, block: &Block) -> Hash {
        if block.is_empty() {
            return *prev_state_hash;
        }
        let mut bytes = prev_state_hash.as_bytes().to_vec();
        bytes.extend_from_slice(block.tx_hash.as_bytes());
        Hash::digest(&bytes)
    }
}

impl<D: ParachainDatabase + ?Sized> LocalChain for LocalNode<D> {
    fn tx_height(&self, hash: &Hash) -> Result<u64> {
        self.database
            .get_tx_height(hash)?
            .ok_or(ChainError::TxNotFound(*hash))
    }

    fn block_at(&self, height: u64) -> Result<Block> {
        self.database
            .get_block_by_height(height)?
            .ok_or(ChainError::BlockNotFound(height))
    }

    fn last_block(&self) -> Result<Option<Block>> {
        Ok(self.database.get_last_block()?)
    }

    fn execute_block(&self, prev_state_hash: &Hash, mut block: Block) -> Result<ExecutedBlock> {
        block.state_hash = Self::next_state_hash(prev_state_hash, &block);
        log::trace!("Executed block: {block}");
        Ok(ExecutedBlock {
            detail: BlockDetail {
                block,
                prev_state_hash: *prev_state_hash,
            },
            dropped: vec![],
        })
    }

    fn commit_block(&self, detail: &BlockDetail) -> Result<()> {
        let block = &detail.block;
        if block.height == 0 {
            if self.database.get_last_block()?.is_some() {
                return Err(ChainError::Rejected("Genesis block already exists".into()));
            }
        } else {
            let parent = self
                .database
                .get_block_by_height(block.height - 1)?
                .ok_or_else(|| {
                    ChainError::Rejected(format!("No parent at height {}", block.height - 1))
                })?;
            if parent.hash() != block.parent_hash {
                return Err(ChainError::Rejected(format!(
                    "Parent mismatch at height {}: {} != {}",
                    block.height - 1,
                    parent.hash(),
                    block.parent_hash
                )));
            }
        }
        self.database.store_block(detail)?;
        log::debug!("Committed block: {block}");
        Ok(())
    }

    fn set_head(&self, block: &Block) -> Result<()> {
        self.database.set_last_block(block)?;
        Ok(())
    }

    fn is_mining_ready(&self) -> bool {
        self.mining.load(Ordering::Relaxed)
    }

    fn chain_parameter(&self, _height: u64) -> ChainParameter {
        self.parameter
    }
}
