use std::sync::Arc;

use log::trace;
use rocksdb::TransactionDB;

use crate::block::types::block::Block;
use crate::storage::rocksdb::{
    block_hash_key, block_height_key, blocked_seq_key, last_block_key, resume_seq_key,
    tx_height_key,
};
use crate::utilities::encoding::decode;
use crate::utilities::hash::Hash;

pub struct DbQuery {
    database: Arc<TransactionDB>,
}

impl DbQuery {
    pub fn new(db: Arc<TransactionDB>) -> DbQuery {
        DbQuery { database: db }
    }

    pub(crate) fn get_block_by_hash(&self, hash: &Hash) -> anyhow::Result<Option<Block>> {
        trace!("Getting block by hash: {hash}");

        let block = if let Some(block) = self.database.get(block_hash_key(hash))? {
            let block = decode::<Block>(&block)?;
            trace!("Found block: {block}");
            Some(block)
        } else {
            trace!("Didn't find block");
            None
        };
        Ok(block)
    }

    pub(crate) fn get_last_block(&self) -> anyhow::Result<Option<Block>> {
        trace!("Getting last block");

        if let Some(hash) = self.database.get(last_block_key())? {
            let hash = String::from_utf8(hash)?.parse::<Hash>()?;
            self.get_block_by_hash(&hash)
        } else {
            trace!("Unable to get last block");
            Ok(None)
        }
    }

    pub(crate) fn get_block_by_height(&self, height: u64) -> anyhow::Result<Option<Block>> {
        trace!("Getting block by height: {height}");

        if let Some(hash) = self.database.get(block_height_key(&height))? {
            let hash = String::from_utf8(hash)?.parse::<Hash>()?;
            self.get_block_by_hash(&hash)
        } else {
            trace!("Didn't find block");
            Ok(None)
        }
    }

    pub(crate) fn get_tx_height(&self, hash: &Hash) -> anyhow::Result<Option<u64>> {
        trace!("Getting height of transaction: {hash}");

        match self.database.get(tx_height_key(hash))? {
            Some(height) => Ok(Some(String::from_utf8(height)?.parse::<u64>()?)),
            None => Ok(None),
        }
    }

    pub(crate) fn get_blocked_seq(&self) -> anyhow::Result<Option<i64>> {
        self.get_seq(blocked_seq_key())
    }

    pub(crate) fn get_resume_seq(&self) -> anyhow::Result<Option<i64>> {
        self.get_seq(resume_seq_key())
    }

    fn get_seq(&self, key: String) -> anyhow::Result<Option<i64>> {
        match self.database.get(key)? {
            Some(seq) => Ok(Some(String::from_utf8(seq)?.parse::<i64>()?)),
            None => Ok(None),
        }
    }
}
