//! Access to the main chain sequence log and blocks.
use async_trait::async_trait;
use thiserror::Error;

use crate::mainchain::types::MainBlock;
use crate::sequence::types::SequenceEntry;
use crate::utilities::hash::Hash;

pub mod http;
pub mod types;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected response: {status} {body}")]
    UnexpectedResponse {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Response of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[async_trait]
pub trait MainChainClient: Send + Sync {
    /// Sequence number of the latest main chain event.
    async fn highest_sequence(&self) -> Result<i64>;

    /// Events `start..=end`, in sequence order.
    async fn sequence_window(&self, start: i64, end: i64) -> Result<Vec<SequenceEntry>>;

    /// Blocks in the order of `hashes`. `None` for a hash the main chain couldn't resolve.
    async fn blocks_by_hashes(&self, hashes: &[Hash]) -> Result<Vec<Option<MainBlock>>>;
}
