use std::fmt::Debug;

use anyhow::Context;
use ethers::providers::{Http, HttpClientError, JsonRpcClient, Provider};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Duration;

use crate::config::AppConfig;
use crate::models::key::{AccountAddress, Key, TxHash};

/// Failure of a single JSON-RPC call. Callers decide what to do with it;
/// the client never retries.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RpcError::Timeout
        } else if e.is_decode() {
            RpcError::Malformed(e.to_string())
        } else {
            RpcError::Transport(e.to_string())
        }
    }
}

impl From<HttpClientError> for RpcError {
    fn from(e: HttpClientError) -> Self {
        match e {
            HttpClientError::ReqwestError(e) => e.into(),
            HttpClientError::JsonRpcError(e) => RpcError::Node {
                code: e.code,
                message: e.message,
            },
            // non-JSON bodies (an HTTP 500 page, a proxy error) land here too
            HttpClientError::SerdeJson { err, text } => {
                RpcError::Malformed(format!("{}: {:.120}", err, text))
            }
        }
    }
}

pub struct RpcClient {
    provider: Provider<Http>,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let url = reqwest::Url::parse(url).context("parsing RPC_URL")?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building rpc http client")?;

        Ok(Self {
            provider: Provider::new(Http::new_with_client(url, http)),
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let url = config.require_rpc_url()?;
        Self::new(url, config.rpc_timeout)
    }

    fn transport(&self) -> &Http {
        self.provider.as_ref()
    }

    /// One request/response round trip through the provider's transport.
    /// A `null` result deserializes as `None` when `R` is an `Option`.
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R, RpcError>
    where
        P: Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        Ok(self.transport().request(method, params).await?)
    }

    /// `eth_getTransactionReceipt`; `None` when the node does not know the hash.
    ///
    /// The receipt stays raw JSON so the gas fields reach the normalizer as
    /// hex strings.
    pub async fn get_transaction_receipt(&self, hash: &TxHash) -> Result<Option<Value>, RpcError> {
        let receipt: Option<Value> = self
            .call("eth_getTransactionReceipt", [hash.wire()])
            .await?;

        match receipt {
            Some(Value::Null) | None => Ok(None),
            Some(v @ Value::Object(_)) => Ok(Some(v)),
            Some(other) => Err(RpcError::Malformed(format!("receipt is not an object: {}", other))),
        }
    }

    /// `eth_getCode` at the latest block.
    pub async fn get_code(&self, address: &AccountAddress) -> Result<Option<String>, RpcError> {
        self.call("eth_getCode", (address.wire(), "latest")).await
    }
}
