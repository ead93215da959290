use std::sync::Arc;

use log::info;
use rocksdb::{TransactionDB, TransactionDBOptions};

use crate::block::types::block::{Block, BlockDetail};
use crate::block::watermark::SequenceStore;
use crate::config::DatabaseConfiguration;
use crate::storage::rocksdb::query::DbQuery;
use crate::storage::rocksdb::store::DbStore;
use crate::storage::ParachainDatabase;
use crate::utilities::hash::Hash;

pub(crate) mod query;
pub(crate) mod store;

pub struct RocksDbStorage {
    pub(crate) db_store: DbStore,
    pub(crate) db_query: DbQuery,
}

const PREFIX_LAST_BLOCK_KEY: &str = "last_block";
const PREFIX_BLOCK_HASH: &str = "block_hash";
const PREFIX_BLOCK_HEIGHT: &str = "block_height";
const PREFIX_TX_HEIGHT: &str = "tx_height";
const PREFIX_BLOCKED_SEQ_KEY: &str = "blocked_seq";
const PREFIX_RESUME_SEQ_KEY: &str = "resume_seq";

impl RocksDbStorage {
    pub fn open(db_conf: DatabaseConfiguration) -> anyhow::Result<Self> {
        info!("Opening RocksDB database at {}", db_conf.rocksdb_path);

        let mut options = rocksdb::Options::default();
        options.create_if_missing(db_conf.create_if_not_exists);

        let db = TransactionDB::open(
            &options,
            &TransactionDBOptions::default(),
            db_conf.rocksdb_path.clone(),
        )?;
        let db = Arc::new(db);
        let db_store = DbStore::new(db.clone());
        let db_query = DbQuery::new(db);
        let storage = Self { db_store, db_query };

        info!("Opened RocksDB database at {}", db_conf.rocksdb_path);
        Ok(storage)
    }

    /// Stored blocks from `from_height` up to the current last block.
    fn blocks_from(&self, from_height: u64) -> anyhow::Result<Vec<Block>> {
        let last_height = match self.db_query.get_last_block()? {
            Some(last) => last.height,
            None => return Ok(vec![]),
        };
        let mut blocks = vec![];
        for height in from_height..=last_height {
            if let Some(block) = self.db_query.get_block_by_height(height)? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }
}

impl SequenceStore for RocksDbStorage {
    fn load_blocked_seq(&self) -> anyhow::Result<Option<i64>> {
        self.db_query.get_blocked_seq()
    }

    fn store_blocked_seq(&self, seq: i64) -> anyhow::Result<()> {
        self.db_store.store_blocked_seq(seq)
    }

    fn load_resume_seq(&self) -> anyhow::Result<Option<i64>> {
        self.db_query.get_resume_seq()
    }

    fn store_resume_seq(&self, seq: i64) -> anyhow::Result<()> {
        self.db_store.store_resume_seq(seq)
    }
}

impl ParachainDatabase for RocksDbStorage {
    fn get_block_by_hash(&self, hash: &Hash) -> anyhow::Result<Option<Block>> {
        self.db_query.get_block_by_hash(hash)
    }

    fn get_block_by_height(&self, height: u64) -> anyhow::Result<Option<Block>> {
        self.db_query.get_block_by_height(height)
    }

    fn get_last_block(&self) -> anyhow::Result<Option<Block>> {
        self.db_query.get_last_block()
    }

    fn get_tx_height(&self, hash: &Hash) -> anyhow::Result<Option<u64>> {
        self.db_query.get_tx_height(hash)
    }

    fn store_block(&self, detail: &BlockDetail) -> anyhow::Result<()> {
        let replaced = self.blocks_from(detail.block.height)?;
        self.db_store.store_block(detail, &replaced)
    }

    fn set_last_block(&self, block: &Block) -> anyhow::Result<()> {
        let hash = block.hash();
        match self.db_query.get_block_by_height(block.height)? {
            Some(stored) if stored.hash() == hash => {}
            _ => anyhow::bail!("Block {hash} is not stored at height {}", block.height),
        }
        let forgotten = self.blocks_from(block.height + 1)?;
        self.db_store.set_last_block(block, &forgotten)
    }
}

fn block_hash_key(hash: &Hash) -> String {
    format!("{PREFIX_BLOCK_HASH}:{hash}")
}

fn block_height_key(height: &u64) -> String {
    format!("{PREFIX_BLOCK_HEIGHT}:{height}")
}

fn tx_height_key(hash: &Hash) -> String {
    format!("{PREFIX_TX_HEIGHT}:{hash}")
}

fn last_block_key() -> String {
    PREFIX_LAST_BLOCK_KEY.to_string()
}

fn blocked_seq_key() -> String {
    PREFIX_BLOCKED_SEQ_KEY.to_string()
}

fn resume_seq_key() -> String {
    PREFIX_RESUME_SEQ_KEY.to_string()
}
