use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::db::LabelStore;
use crate::models::key::{AccountAddress, TxHash};
use crate::models::label::{FlowSourceSummary, DEFAULT_FLOW_SOURCE};
use crate::models::outcome::{AddressOutcome, TxOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRow {
    pub flow_source: String,
    pub is_contract: Option<bool>,
    /// Bumped on every write that changes the row.
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptRow {
    pub gas_used: u128,
    pub gas_price: u128,
    pub revision: u64,
}

#[derive(Debug, Default)]
struct Tables {
    labels: BTreeMap<AccountAddress, LabelRow>,
    receipts: BTreeMap<TxHash, ReceiptRow>,
    // relation name -> referenced senders
    senders: HashMap<String, Vec<AccountAddress>>,
    revision: u64,
}

/// In-process store with the same conflict and ordering rules as
/// `PgStore`. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Simulates the upstream producer appending rows to a relation.
    pub fn add_senders(&self, table: &str, senders: &[AccountAddress]) -> Result<()> {
        self.lock()?
            .senders
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(senders);
        Ok(())
    }

    pub fn insert_label(&self, address: AccountAddress, flow_source: &str, is_contract: Option<bool>) -> Result<()> {
        let mut tables = self.lock()?;
        tables.revision += 1;
        let revision = tables.revision;
        tables.labels.insert(
            address,
            LabelRow {
                flow_source: flow_source.to_string(),
                is_contract,
                revision,
            },
        );
        Ok(())
    }

    pub fn labels(&self) -> Result<BTreeMap<AccountAddress, LabelRow>> {
        Ok(self.lock()?.labels.clone())
    }

    pub fn receipts(&self) -> Result<BTreeMap<TxHash, ReceiptRow>> {
        Ok(self.lock()?.receipts.clone())
    }
}

#[async_trait]
impl LabelStore for MemoryStore {
    async fn unregistered_senders(&self, table: &str, limit: i64) -> Result<Vec<AccountAddress>> {
        let tables = self.lock()?;
        let senders = tables
            .senders
            .get(table)
            .ok_or_else(|| anyhow!("relation \"{}\" does not exist", table))?;

        let mut missing: Vec<AccountAddress> = Vec::new();
        for sender in senders {
            if !tables.labels.contains_key(sender) && !missing.contains(sender) {
                missing.push(*sender);
            }
            if missing.len() as i64 >= limit {
                break;
            }
        }
        Ok(missing)
    }

    async fn register_addresses(&self, addresses: &[AccountAddress]) -> Result<u64> {
        let mut tables = self.lock()?;
        let mut inserted = 0;

        for address in addresses {
            if tables.labels.contains_key(address) {
                continue;
            }
            tables.revision += 1;
            let revision = tables.revision;
            tables.labels.insert(
                *address,
                LabelRow {
                    flow_source: DEFAULT_FLOW_SOURCE.to_string(),
                    is_contract: None,
                    revision,
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn unlabeled_addresses(
        &self,
        after: Option<&AccountAddress>,
        limit: i64,
    ) -> Result<Vec<AccountAddress>> {
        let tables = self.lock()?;
        Ok(tables
            .labels
            .iter()
            .filter(|(address, row)| row.is_contract.is_none() && after.map_or(true, |a| *address > a))
            .map(|(address, _)| *address)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn upsert_contract_flag(&self, outcome: &AddressOutcome) -> Result<bool> {
        let Some(is_contract) = outcome.is_contract else {
            return Ok(false);
        };

        let mut tables = self.lock()?;
        let next = tables.revision + 1;
        let row = tables.labels.entry(outcome.key).or_insert_with(|| LabelRow {
            flow_source: DEFAULT_FLOW_SOURCE.to_string(),
            is_contract: None,
            revision: 0,
        });

        if row.is_contract == Some(is_contract) {
            return Ok(false);
        }
        row.is_contract = Some(is_contract);
        row.revision = next;
        tables.revision = next;
        Ok(true)
    }

    async fn upsert_receipt(&self, outcome: &TxOutcome) -> Result<bool> {
        let mut tables = self.lock()?;
        let next = tables.revision + 1;

        let unchanged = tables
            .receipts
            .get(&outcome.key)
            .is_some_and(|row| row.gas_used == outcome.gas_used && row.gas_price == outcome.gas_price);
        if unchanged {
            return Ok(false);
        }

        tables.receipts.insert(
            outcome.key,
            ReceiptRow {
                gas_used: outcome.gas_used,
                gas_price: outcome.gas_price,
                revision: next,
            },
        );
        tables.revision = next;
        Ok(true)
    }

    async fn insert_receipt_if_absent(&self, outcome: &TxOutcome) -> Result<bool> {
        let mut tables = self.lock()?;
        if tables.receipts.contains_key(&outcome.key) {
            return Ok(false);
        }

        tables.revision += 1;
        let revision = tables.revision;
        tables.receipts.insert(
            outcome.key,
            ReceiptRow {
                gas_used: outcome.gas_used,
                gas_price: outcome.gas_price,
                revision,
            },
        );
        Ok(true)
    }

    async fn label_summary(&self) -> Result<Vec<FlowSourceSummary>> {
        let tables = self.lock()?;
        let mut by_source: BTreeMap<&str, FlowSourceSummary> = BTreeMap::new();

        for row in tables.labels.values() {
            let Some(is_contract) = row.is_contract else {
                continue;
            };
            let entry = by_source
                .entry(row.flow_source.as_str())
                .or_insert_with(|| FlowSourceSummary {
                    flow_source: row.flow_source.clone(),
                    total: 0,
                    contracts: 0,
                    eoas: 0,
                });
            entry.total += 1;
            if is_contract {
                entry.contracts += 1;
            } else {
                entry.eoas += 1;
            }
        }

        let mut summary: Vec<FlowSourceSummary> = by_source.into_values().collect();
        summary.sort_by(|a, b| b.total.cmp(&a.total));
        Ok(summary)
    }
}
