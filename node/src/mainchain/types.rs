use serde::{Deserialize, Serialize};

use crate::block::types::transaction::Transaction;
use crate::sequence::types::Operation;
use crate::utilities::hash::Hash;

/// Main chain block as far as the parachain cares about it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MainBlock {
    pub height: i64,
    #[serde(default)]
    pub txs: Vec<Transaction>,
}

impl MainBlock {
    pub fn new(height: i64, txs: Vec<Transaction>) -> Self {
        Self { height, txs }
    }

    /// Transactions addressed to `execer`, in block order.
    pub fn txs_for_executor(&self, execer: &str) -> Vec<Transaction> {
        self.txs
            .iter()
            .filter(|tx| tx.is_for_executor(execer))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct BlockSequenceItem {
    pub(crate) hash: Hash,
    #[serde(rename = "type")]
    pub(crate) operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) sequence: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub(crate) struct BlockSequences {
    #[serde(default)]
    pub(crate) items: Vec<BlockSequenceItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct BlockDetailItem {
    pub(crate) block: MainBlock,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub(crate) struct BlockDetails {
    #[serde(default)]
    pub(crate) items: Vec<Option<BlockDetailItem>>,
}
