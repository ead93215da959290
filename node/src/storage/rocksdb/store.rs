use std::sync::Arc;

use rocksdb::{TransactionDB, WriteBatchWithTransaction};

use crate::block::types::block::{Block, BlockDetail};
use crate::storage::rocksdb::{
    block_hash_key, block_height_key, blocked_seq_key, last_block_key, resume_seq_key,
    tx_height_key,
};
use crate::utilities::encoding::encode;

pub struct DbStore {
    connection: Arc<TransactionDB>,
}

impl DbStore {
    pub fn new(db: Arc<TransactionDB>) -> DbStore {
        DbStore { connection: db }
    }

    /// Stores the block and makes it the last one.
    ///
    /// `replaced` are the stored blocks at the same height and above, their height and
    /// transaction pointers are removed first.
    pub(crate) fn store_block(&self, detail: &BlockDetail, replaced: &[Block]) -> anyhow::Result<()> {
        let block = &detail.block;
        log::debug!("Storing block: {block}");

        let hash = block.hash();
        let hash_str = hash.to_string();

        let mut batch = WriteBatchWithTransaction::<true>::default();
        Self::forget(&mut batch, replaced, block.height);

        //Blocks stay addressable by hash even after a fork replaced them
        let block_bytes = encode(block)?;
        batch.put(block_hash_key(&hash).as_bytes(), block_bytes);

        batch.put(block_height_key(&block.height).as_bytes(), hash_str.as_bytes());

        for tx in &block.txs {
            batch.put(
                tx_height_key(&tx.hash()).as_bytes(),
                block.height.to_string().as_bytes(),
            );
        }

        batch.put(last_block_key(), hash_str.as_bytes());

        self.connection.write(batch)?;
        Ok(())
    }

    pub(crate) fn set_last_block(&self, block: &Block, forgotten: &[Block]) -> anyhow::Result<()> {
        log::debug!("Setting last block: {block}");

        let mut batch = WriteBatchWithTransaction::<true>::default();
        Self::forget(&mut batch, forgotten, block.height + 1);
        batch.put(last_block_key(), block.hash().to_string().as_bytes());

        self.connection.write(batch)?;
        Ok(())
    }

    pub(crate) fn store_blocked_seq(&self, seq: i64) -> anyhow::Result<()> {
        self.connection
            .put(blocked_seq_key(), seq.to_string().as_bytes())?;
        Ok(())
    }

    pub(crate) fn store_resume_seq(&self, seq: i64) -> anyhow::Result<()> {
        self.connection
            .put(resume_seq_key(), seq.to_string().as_bytes())?;
        Ok(())
    }

    /// Removes transaction pointers of `blocks` and height pointers from `from_height` up.
    fn forget(batch: &mut WriteBatchWithTransaction<true>, blocks: &[Block], from_height: u64) {
        for block in blocks {
            log::trace!("Forgetting block at height {}", block.height);
            for tx in &block.txs {
                batch.delete(tx_height_key(&tx.hash()).as_bytes());
            }
            if block.height >= from_height {
                batch.delete(block_height_key(&block.height).as_bytes());
            }
        }
    }
}
