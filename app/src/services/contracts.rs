use crate::helper::rpc::{RpcClient, RpcError};
use crate::models::key::AccountAddress;
use crate::models::outcome::AddressOutcome;
use crate::services::normalize::is_contract_code;

/// Fetch + classify one address from its bytecode at the latest block.
pub async fn fetch_address_outcome(
    client: &RpcClient,
    key: AccountAddress,
) -> Result<AddressOutcome, RpcError> {
    let code = client.get_code(&key).await?;

    Ok(AddressOutcome {
        key,
        is_contract: Some(is_contract_code(code.as_deref())),
    })
}
