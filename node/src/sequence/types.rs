use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::utilities::hash::Hash;

pub const ADD_OPERATION: i64 = 1;
pub const DEL_OPERATION: i64 = 2;

/// Kind of a main chain sequence event. Carried over the wire as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Operation {
    /// Block was appended to the main chain
    Add,
    /// Block was reverted from the main chain
    Del,
    Unknown(i64),
}

impl From<i64> for Operation {
    fn from(code: i64) -> Self {
        match code {
            ADD_OPERATION => Operation::Add,
            DEL_OPERATION => Operation::Del,
            other => Operation::Unknown(other),
        }
    }
}

impl From<Operation> for i64 {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Add => ADD_OPERATION,
            Operation::Del => DEL_OPERATION,
            Operation::Unknown(code) => code,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Add => write!(f, "Add"),
            Operation::Del => write!(f, "Del"),
            Operation::Unknown(code) => write!(f, "Unknown({code})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEntry {
    pub seq: i64,
    pub operation: Operation,
    pub block_hash: Hash,
}

impl SequenceEntry {
    pub fn new(seq: i64, operation: Operation, block_hash: Hash) -> Self {
        Self {
            seq,
            operation,
            block_hash,
        }
    }
}

impl Display for SequenceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "seq: {}, op: {}, block: {}", self.seq, self.operation, self.block_hash)
    }
}
