use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::MainChainConfiguration;
use crate::mainchain::types::{BlockDetails, BlockSequences, MainBlock};
use crate::mainchain::{MainChainClient, Result, TransportError};
use crate::sequence::types::SequenceEntry;
use crate::utilities::hash::Hash;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 client of a main chain node.
pub struct MainChainHttpClient {
    client: reqwest::Client,
    url: String,
    max_payload_bytes: usize,
    request_id: AtomicU64,
}

impl MainChainHttpClient {
    pub fn new(config: &MainChainConfiguration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_sec))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            max_payload_bytes: config.max_payload_bytes,
            request_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        log::trace!("Main chain request: {method} {}", request.params);

        let response = self.client.post(&self.url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::UnexpectedResponse {
                status: response.status(),
                body: response.text().await?,
            });
        }
        if let Some(size) = response.content_length() {
            check_payload_size(size as usize, self.max_payload_bytes)?;
        }
        let body = read_body(response, self.max_payload_bytes).await?;
        parse_response(&body, self.max_payload_bytes)
    }
}

/// Reads the body chunk by chunk, gives up as soon as it grows over `limit`.
async fn read_body(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        check_payload_size(body.len() + chunk.len(), limit)?;
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn check_payload_size(size: usize, limit: usize) -> Result<()> {
    if size > limit {
        return Err(TransportError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

fn parse_response<T: DeserializeOwned>(body: &[u8], limit: usize) -> Result<T> {
    check_payload_size(body.len(), limit)?;
    let response: RpcResponse<T> = serde_json::from_slice(body)?;
    if let Some(error) = response.error {
        return Err(TransportError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    match response.result {
        Some(result) => Ok(result),
        None => Err(TransportError::Rpc {
            code: 0,
            message: "Response has neither result nor error".to_string(),
        }),
    }
}

/// Entries which don't carry their own sequence number are numbered from `start`.
fn to_sequence_entries(start: i64, sequences: BlockSequences) -> Vec<SequenceEntry> {
    sequences
        .items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let seq = item.sequence.unwrap_or(start + i as i64);
            SequenceEntry::new(seq, item.operation, item.hash)
        })
        .collect()
}

#[async_trait]
impl MainChainClient for MainChainHttpClient {
    async fn highest_sequence(&self) -> Result<i64> {
        self.call("GetLastBlockSequence", json!({})).await
    }

    async fn sequence_window(&self, start: i64, end: i64) -> Result<Vec<SequenceEntry>> {
        let params = json!({"start": start, "end": end, "isDetail": true});
        let sequences: BlockSequences = self.call("GetBlockSequences", params).await?;
        Ok(to_sequence_entries(start, sequences))
    }

    async fn blocks_by_hashes(&self, hashes: &[Hash]) -> Result<Vec<Option<MainBlock>>> {
        let params = json!({ "hashes": hashes });
        let details: BlockDetails = self.call("GetBlockByHashes", params).await?;
        Ok(details
            .items
            .into_iter()
            .map(|item| item.map(|detail| detail.block))
            .collect())
    }
}
