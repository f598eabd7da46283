use std::time::Duration;

use alloy_primitives::{Address, B256};
use backon::{ExponentialBuilder, Retryable};
use daoscan_common::{ChainId, MULTICALL3_ADDRESS};
use error_stack::{Report, Result, ResultExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::{
    reader::{BlockHeader, CallRequest, CallResult, ChainReader, LogFilter, RawLog},
    reads, ChainReaderError,
};

#[derive(Debug, Clone)]
pub struct JsonRpcChainReaderOptions {
    /// Request timeout, applied around all retries.
    pub timeout: Duration,
    /// Exponential backoff options.
    pub exponential_backoff: ExponentialBuilder,
}

impl Default for JsonRpcChainReaderOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            exponential_backoff: ExponentialBuilder::default(),
        }
    }
}

/// JSON-RPC backed [`ChainReader`], bound to one chain endpoint.
#[derive(Clone)]
pub struct JsonRpcChainReader {
    client: reqwest::Client,
    url: Url,
    chain_id: ChainId,
    options: JsonRpcChainReaderOptions,
}

#[derive(Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'a str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    number: String,
    timestamp: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: String,
    topics: Vec<String>,
    data: String,
    block_number: String,
    transaction_hash: String,
    log_index: String,
}

impl JsonRpcChainReader {
    pub fn new(
        url: Url,
        chain_id: ChainId,
        options: JsonRpcChainReaderOptions,
    ) -> Result<Self, ChainReaderError> {
        let client = reqwest::Client::builder()
            .build()
            .change_context(ChainReaderError::Configuration)
            .attach_printable("failed to build http client")?;

        Ok(Self {
            client,
            url,
            chain_id,
            options,
        })
    }

    async fn send<P, R>(&self, method: &str, params: &P) -> Result<R, ChainReaderError>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .change_context(ChainReaderError::Request)
            .attach_printable_lazy(|| format!("method: {method}"))?;

        let response: JsonRpcResponse<R> = response
            .json()
            .await
            .change_context(ChainReaderError::Decode)
            .attach_printable_lazy(|| format!("method: {method}"))?;

        if let Some(error) = response.error {
            return Err(Report::new(ChainReaderError::Request))
                .attach_printable(format!("rpc error {}: {}", error.code, error.message));
        }

        // A null result means the entity does not exist, e.g. a block
        // past the chain head.
        response
            .result
            .ok_or_else(|| Report::new(ChainReaderError::NotFound))
    }

    async fn request<P, R>(&self, method: &str, params: &P) -> Result<R, ChainReaderError>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = (|| async { self.send(method, params).await })
            .retry(self.options.exponential_backoff)
            .when(|err: &Report<ChainReaderError>| {
                matches!(err.current_context(), ChainReaderError::Request)
            });

        let Ok(response) = tokio::time::timeout(self.options.timeout, request).await else {
            return Err(Report::new(ChainReaderError::Timeout))
                .attach_printable_lazy(|| format!("method: {method}"));
        };

        response
    }

    async fn eth_call(
        &self,
        to: Address,
        data: &[u8],
        at_block: Option<u64>,
    ) -> Result<Vec<u8>, ChainReaderError> {
        let params = serde_json::json!([
            { "to": format!("{to:#x}"), "data": format!("0x{}", hex::encode(data)) },
            block_tag(at_block),
        ]);
        let response: String = self.request("eth_call", &params).await?;
        parse_hex_bytes(&response)
    }
}

#[async_trait::async_trait]
impl ChainReader for JsonRpcChainReader {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn multicall(
        &self,
        calls: Vec<CallRequest>,
        at_block: Option<u64>,
    ) -> Result<Vec<CallResult>, ChainReaderError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let data = reads::encode_aggregate3(&calls);
        let response = self.eth_call(MULTICALL3_ADDRESS, &data, at_block).await?;
        let results = reads::decode_aggregate3(&response)?;

        if results.len() != calls.len() {
            return Err(Report::new(ChainReaderError::Decode))
                .attach_printable("multicall returned an unexpected number of results");
        }

        Ok(results)
    }

    async fn get_block(&self, number: Option<u64>) -> Result<BlockHeader, ChainReaderError> {
        let params = serde_json::json!([block_tag(number), false]);
        let block: RpcBlock = self.request("eth_getBlockByNumber", &params).await?;
        Ok(BlockHeader {
            number: parse_quantity(&block.number)?,
            timestamp: parse_quantity(&block.timestamp)?,
        })
    }

    async fn get_storage_at(
        &self,
        address: Address,
        slot: B256,
    ) -> Result<B256, ChainReaderError> {
        let params = serde_json::json!([
            format!("{address:#x}"),
            format!("{slot:#x}"),
            "latest",
        ]);
        let response: String = self.request("eth_getStorageAt", &params).await?;
        response
            .parse::<B256>()
            .change_context(ChainReaderError::Decode)
            .attach_printable("invalid storage word")
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, ChainReaderError> {
        let topics = filter
            .topics
            .iter()
            .map(|topic| match topic {
                Some(topic) => serde_json::json!(format!("{topic:#x}")),
                None => serde_json::Value::Null,
            })
            .collect::<Vec<_>>();

        let mut query = serde_json::json!({
            "fromBlock": quantity(filter.from_block),
            "toBlock": quantity(filter.to_block),
            "topics": topics,
        });
        if let Some(address) = filter.address {
            query["address"] = serde_json::json!(format!("{address:#x}"));
        }

        let logs: Vec<RpcLog> = self.request("eth_getLogs", &serde_json::json!([query])).await?;

        logs.into_iter()
            .map(|log| {
                Ok(RawLog {
                    address: log
                        .address
                        .parse::<Address>()
                        .change_context(ChainReaderError::Decode)?,
                    topics: log
                        .topics
                        .iter()
                        .map(|topic| topic.parse::<B256>().change_context(ChainReaderError::Decode))
                        .collect::<Result<Vec<_>, _>>()?,
                    data: parse_hex_bytes(&log.data)?,
                    block_number: parse_quantity(&log.block_number)?,
                    transaction_hash: log
                        .transaction_hash
                        .parse::<B256>()
                        .change_context(ChainReaderError::Decode)?,
                    log_index: parse_quantity(&log.log_index)?,
                })
            })
            .collect()
    }
}

fn block_tag(number: Option<u64>) -> serde_json::Value {
    match number {
        Some(number) => serde_json::json!(quantity(number)),
        None => serde_json::json!("latest"),
    }
}

fn quantity(value: u64) -> String {
    format!("0x{value:x}")
}

fn parse_quantity(text: &str) -> Result<u64, ChainReaderError> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u64::from_str_radix(digits, 16)
        .change_context(ChainReaderError::Decode)
        .attach_printable_lazy(|| format!("invalid quantity: {text}"))
}

fn parse_hex_bytes(text: &str) -> Result<Vec<u8>, ChainReaderError> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(digits)
        .change_context(ChainReaderError::Decode)
        .attach_printable("invalid hex payload")
}
