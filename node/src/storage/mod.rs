use crate::block::types::block::{Block, BlockDetail};
use crate::block::watermark::SequenceStore;
use crate::utilities::hash::Hash;

pub mod rocksdb;

/// Storage of committed parachain blocks and of the driver progress.
pub trait ParachainDatabase: SequenceStore {
    fn get_block_by_hash(&self, hash: &Hash) -> anyhow::Result<Option<Block>>;

    fn get_block_by_height(&self, height: u64) -> anyhow::Result<Option<Block>>;

    fn get_last_block(&self) -> anyhow::Result<Option<Block>>;

    fn get_tx_height(&self, hash: &Hash) -> anyhow::Result<Option<u64>>;

    /// Stores the block as the new last block.
    /// Blocks at its height and above are replaced.
    fn store_block(&self, detail: &BlockDetail) -> anyhow::Result<()>;

    /// Makes an already stored block the last one, blocks above it are forgotten.
    fn set_last_block(&self, block: &Block) -> anyhow::Result<()>;
}
