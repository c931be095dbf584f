use crate::data_sync::block_clock::BlockHeightProvider;
use crate::error::FetchError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Parse a JSON-RPC hex quantity such as `0x1a2b3c`.
pub fn parse_hex_quantity(value: &str) -> Result<u64, FetchError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|e| FetchError::InvalidResponse(format!("Invalid hex quantity {}: {}", value, e)))
}

/// Reads the chain head through `eth_blockNumber` over HTTP.
#[derive(Debug, Clone)]
pub struct JsonRpcBlockProvider {
    http_client: reqwest::Client,
    rpc_url: String,
}

impl JsonRpcBlockProvider {
    pub fn new(rpc_url: String, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { http_client, rpc_url })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, FetchError> {
        let request_body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self.http_client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;

        let response_json: Value = response.json().await?;
        extract_result(response_json)
    }
}

fn extract_result(mut response_json: Value) -> Result<Value, FetchError> {
    if let Some(error) = response_json.get("error") {
        return Err(FetchError::Rpc(error.to_string()));
    }

    response_json
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| FetchError::InvalidResponse("Missing result in RPC response".to_string()))
}

#[async_trait]
impl BlockHeightProvider for JsonRpcBlockProvider {
    async fn block_number(&self) -> Result<u64, FetchError> {
        let result = self.call("eth_blockNumber", serde_json::json!([])).await?;
        let quantity = result
            .as_str()
            .ok_or_else(|| FetchError::InvalidResponse(format!("Unexpected block number: {}", result)))?;

        let block_number = parse_hex_quantity(quantity)?;
        debug!("eth_blockNumber returned {}", block_number);
        Ok(block_number)
    }
}
