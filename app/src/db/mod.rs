pub mod init;
pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::key::AccountAddress;
use crate::models::label::FlowSourceSummary;
use crate::models::outcome::{AddressOutcome, TxOutcome};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Durable side of the pipeline. Every write is conflict-safe and
/// idempotent so concurrent or repeated runs converge.
#[async_trait]
pub trait LabelStore: Send + Sync {
    /// Addresses referenced by the swap relation but not yet in
    /// `address_labels`.
    async fn unregistered_senders(&self, table: &str, limit: i64) -> Result<Vec<AccountAddress>>;

    /// Inserts each address with an unknown classification. Existing rows
    /// are left untouched. Returns the number of rows actually inserted.
    async fn register_addresses(&self, addresses: &[AccountAddress]) -> Result<u64>;

    /// Unclassified addresses in key order, strictly after `after`.
    async fn unlabeled_addresses(
        &self,
        after: Option<&AccountAddress>,
        limit: i64,
    ) -> Result<Vec<AccountAddress>>;

    /// Returns whether a row changed. Undetermined outcomes are not written.
    async fn upsert_contract_flag(&self, outcome: &AddressOutcome) -> Result<bool>;

    /// Returns whether a row changed.
    async fn upsert_receipt(&self, outcome: &TxOutcome) -> Result<bool>;

    /// Writes the zero row of a failed fetch only when the hash has no row
    /// yet, so a stored receipt is never clobbered by a transient failure.
    async fn insert_receipt_if_absent(&self, outcome: &TxOutcome) -> Result<bool>;

    async fn label_summary(&self) -> Result<Vec<FlowSourceSummary>>;
}
