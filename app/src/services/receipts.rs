use serde::Deserialize;
use serde_json::Value;

use crate::helper::rpc::{RpcClient, RpcError};
use crate::models::key::TxHash;
use crate::models::outcome::{Outcome, TxOutcome};
use crate::services::normalize::hex_to_int;

// only the gas fields of a receipt are read
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptGas {
    gas_used: Option<String>,
    effective_gas_price: Option<String>,
}

pub fn receipt_outcome(key: TxHash, receipt: Value) -> Result<TxOutcome, RpcError> {
    let gas: ReceiptGas = serde_json::from_value(receipt)
        .map_err(|e| RpcError::Malformed(format!("receipt for {}: {}", key, e)))?;

    Ok(TxOutcome {
        key,
        gas_used: hex_to_int(gas.gas_used.as_deref()),
        gas_price: hex_to_int(gas.effective_gas_price.as_deref()),
    })
}

/// Fetch + normalize for one transaction. An unknown hash is a zero row.
pub async fn fetch_receipt_outcome(client: &RpcClient, key: TxHash) -> Result<TxOutcome, RpcError> {
    match client.get_transaction_receipt(&key).await? {
        Some(receipt) => receipt_outcome(key, receipt),
        None => {
            log::debug!("[RECEIPTS] no receipt for {}", key);
            Ok(TxOutcome::fallback(key))
        }
    }
}
