use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::utilities::encoding::hex_bytes;
use crate::utilities::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Transaction {
    ///Name of the executor which processes this transaction
    pub execer: String,
    ///Executor specific payload, opaque for consensus
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub nonce: u64,
}

impl Transaction {
    pub fn new<E: Into<String>>(execer: E, payload: Vec<u8>, nonce: u64) -> Self {
        Self {
            execer: execer.into(),
            payload,
            nonce,
        }
    }

    /// Content hash, the identity of a transaction.
    pub fn hash(&self) -> Hash {
        let execer = self.execer.as_bytes();
        let mut bytes = Vec::with_capacity(8 + execer.len() + 8 + self.payload.len());
        bytes.extend_from_slice(&(execer.len() as u64).to_be_bytes());
        bytes.extend_from_slice(execer);
        bytes.extend_from_slice(&self.nonce.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        Hash::digest(&bytes)
    }

    pub fn is_for_executor(&self, execer: &str) -> bool {
        self.execer == execer
    }
}

impl Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.execer, self.hash())
    }
}
