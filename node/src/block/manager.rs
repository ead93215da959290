use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;

use crate::block::types::block::Block;
use crate::block::types::transaction::Transaction;
use crate::chain::{ChainError, LocalChain};
use crate::core::context::SyncContext;
use crate::utilities::hash::Hash;
use crate::utilities::time::BlockTime;

pub(crate) type Result<T> = std::result::Result<T, BlockManagerError>;

#[derive(Error, Debug)]
pub enum BlockManagerError {
    #[error("Block execution failed: {0}")]
    Execution(String),
    #[error("Local chain error: {0}")]
    Chain(#[from] ChainError),
    #[error("Failed to persist blocked sequence: {0}")]
    Watermark(anyhow::Error),
}

/// Owns the local head and the block write pipeline.
///
/// Both the producer and the reconciler build blocks through it. The head lock is held for the
/// whole build of a block, so two blocks are never built on top of different bases at the same time.
pub struct BlockManager<C: LocalChain + ?Sized> {
    chain: Arc<C>,
    context: Arc<SyncContext>,
    head: Mutex<Block>,
}

impl<C: LocalChain + ?Sized> BlockManager<C> {
    pub fn new(chain: Arc<C>, context: Arc<SyncContext>, head: Block) -> Self {
        log::info!("Block manager starts from head: {head}");
        Self {
            chain,
            context,
            head: Mutex::new(head),
        }
    }

    pub fn current_block(&self) -> Block {
        self.head.lock().clone()
    }

    pub(crate) fn lock_head(&self) -> MutexGuard<'_, Block> {
        self.head.lock()
    }

    pub fn chain(&self) -> &Arc<C> {
        &self.chain
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.context
    }

    /// Builds a block with `txs` on top of `parent` and writes it.
    pub(crate) fn create_block(
        &self,
        head: &mut Block,
        parent: &Block,
        txs: Vec<Transaction>,
    ) -> Result<Block> {
        let parameter = self.chain.chain_parameter(parent.height + 1);
        let block_time = BlockTime::next_after(parent.block_time);
        let candidate = Block::new_child(parent, txs, parameter.difficulty, block_time);
        log::debug!(
            "Created block at height {} with {} txs",
            candidate.height,
            candidate.txs.len()
        );
        self.write_block(head, parent, candidate)
    }

    /// Empty block keeps the state of its parent and has zero tx root.
    pub(crate) fn create_empty_block(&self, head: &mut Block, parent: &Block) -> Result<Block> {
        let parameter = self.chain.chain_parameter(0);
        let block_time = BlockTime::next_after(parent.block_time);
        let mut candidate = Block::new_child(parent, vec![], parameter.difficulty, block_time);
        candidate.tx_hash = Hash::ZERO;
        candidate.state_hash = parent.state_hash;
        log::info!("Creating empty block at height {}", candidate.height);
        self.write_block(head, parent, candidate)
    }

    /// Makes `block` the local head without building anything on top of it.
    pub(crate) fn reset_head(&self, head: &mut Block, block: Block) -> Result<()> {
        self.chain.set_head(&block)?;
        log::info!("Local head reset to: {block}");
        *head = block;
        Ok(())
    }

    /// Execute, commit and settle a candidate block.
    ///
    /// Transactions the executor dropped leave the cache whether or not the block makes it.
    /// Only a committed block moves the head, removes its transactions from the cache and
    /// advances the blocked sequence.
    fn write_block(&self, head: &mut Block, parent: &Block, candidate: Block) -> Result<Block> {
        let cache = &self.context.cache;

        let executed = match self.chain.execute_block(&parent.state_hash, candidate) {
            Ok(executed) => executed,
            Err(ChainError::ExecutionFailed { reason, dropped }) => {
                if !dropped.is_empty() {
                    log::warn!("Executor dropped {} txs from failed block", dropped.len());
                    cache.remove_txs(&dropped);
                }
                return Err(BlockManagerError::Execution(reason));
            }
            Err(err) => return Err(err.into()),
        };

        let dropped_seq = if executed.dropped.is_empty() {
            None
        } else {
            log::warn!("Executor dropped {} txs", executed.dropped.len());
            cache.remove_txs(&executed.dropped)
        };

        self.chain.commit_block(&executed.detail)?;

        let block = executed.detail.block;
        *head = block.clone();
        log::info!("New local head: {block}");

        let included_seq = cache.remove_txs(&block.txs);
        if let Some(seq) = included_seq.max(dropped_seq) {
            self.context
                .watermark
                .set(seq)
                .map_err(BlockManagerError::Watermark)?;
        }
        self.advance_resume_seq()?;
        Ok(block)
    }

    /// Nothing below the current sequence or the lowest cached one is left to block.
    fn advance_resume_seq(&self) -> Result<()> {
        //Admissions after this read are tagged with this sequence or a later one
        let current = self.context.current_seq();
        let resume = match self.context.cache.lowest_seq() {
            Some(lowest) => lowest.min(current),
            None => current,
        };
        self.context
            .watermark
            .set_resume(resume)
            .map_err(BlockManagerError::Watermark)?;
        Ok(())
    }
}
