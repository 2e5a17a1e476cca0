use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};

use crate::db::init::init_label_tables;
use crate::db::LabelStore;
use crate::models::key::{AccountAddress, Key};
use crate::models::label::{FlowSourceSummary, DEFAULT_FLOW_SOURCE};
use crate::models::outcome::{AddressOutcome, TxOutcome};

// Keys live as BYTEA; the canonical hex form crosses the wire via
// encode()/decode() so a key is never stored in two cases.

const REGISTER_ADDRESS: &str = "
    INSERT INTO address_labels (address, flow_source)
    VALUES (decode($1, 'hex'), $2)
    ON CONFLICT (address) DO NOTHING";

const UNLABELED_ADDRESSES: &str = "
    SELECT encode(address, 'hex')
    FROM address_labels
    WHERE is_contract IS NULL
      AND ($1::TEXT IS NULL OR address > decode($1::TEXT, 'hex'))
    ORDER BY address
    LIMIT $2";

const UPSERT_CONTRACT_FLAG: &str = "
    INSERT INTO address_labels (address, flow_source, is_contract, updated_at)
    VALUES (decode($1, 'hex'), $2, $3, NOW())
    ON CONFLICT (address) DO UPDATE
    SET is_contract = EXCLUDED.is_contract, updated_at = NOW()
    WHERE address_labels.is_contract IS DISTINCT FROM EXCLUDED.is_contract";

const UPSERT_RECEIPT: &str = "
    INSERT INTO tx_receipts (tx_hash, gas_used, gas_price, updated_at)
    VALUES (decode($1, 'hex'), $2::TEXT::NUMERIC, $3::TEXT::NUMERIC, NOW())
    ON CONFLICT (tx_hash) DO UPDATE
    SET gas_used = EXCLUDED.gas_used, gas_price = EXCLUDED.gas_price, updated_at = NOW()
    WHERE (tx_receipts.gas_used, tx_receipts.gas_price)
          IS DISTINCT FROM (EXCLUDED.gas_used, EXCLUDED.gas_price)";

const INSERT_RECEIPT_IF_ABSENT: &str = "
    INSERT INTO tx_receipts (tx_hash, gas_used, gas_price, updated_at)
    VALUES (decode($1, 'hex'), $2::TEXT::NUMERIC, $3::TEXT::NUMERIC, NOW())
    ON CONFLICT (tx_hash) DO NOTHING";

const LABEL_SUMMARY: &str = "
    SELECT flow_source,
           COUNT(*) AS total,
           COUNT(*) FILTER (WHERE is_contract) AS contracts,
           COUNT(*) FILTER (WHERE NOT is_contract) AS eoas
    FROM address_labels
    WHERE is_contract IS NOT NULL
    GROUP BY flow_source
    ORDER BY total DESC";

/// Single-owner PostgreSQL connection. Each statement commits on its own.
pub struct PgStore {
    client: Client,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .context("connecting to DATABASE_URL")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::error!("Connection error: {}", e);
            }
        });

        init_label_tables(&client)
            .await
            .context("initialising label tables")?;

        Ok(Self { client })
    }

    async fn write_receipt(&self, sql: &str, outcome: &TxOutcome) -> Result<bool> {
        let changed = self
            .client
            .execute(
                sql,
                &[
                    &outcome.key.canonical(),
                    &outcome.gas_used.to_string(),
                    &outcome.gas_price.to_string(),
                ],
            )
            .await
            .with_context(|| format!("writing receipt for {}", outcome.key))?;

        Ok(changed > 0)
    }
}

fn parse_addresses(hexes: Vec<String>) -> Vec<AccountAddress> {
    hexes
        .into_iter()
        .filter_map(|hex| match AccountAddress::parse(&hex) {
            Ok(address) => Some(address),
            Err(e) => {
                log::warn!("ignoring stored address: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl LabelStore for PgStore {
    async fn unregistered_senders(&self, table: &str, limit: i64) -> Result<Vec<AccountAddress>> {
        // `table` is a validated identifier from AppConfig
        let sql = format!(
            "SELECT DISTINCT encode(r.sender, 'hex')
             FROM {} r
             WHERE r.sender IS NOT NULL
               AND NOT EXISTS (
                   SELECT 1 FROM address_labels al WHERE al.address = r.sender
               )
             LIMIT $1",
            table
        );

        let rows = self
            .client
            .query(sql.as_str(), &[&limit])
            .await
            .with_context(|| format!("querying unregistered senders from {}", table))?;

        Ok(parse_addresses(rows.iter().map(|row| row.get(0)).collect()))
    }

    async fn register_addresses(&self, addresses: &[AccountAddress]) -> Result<u64> {
        let stmt = self.client.prepare(REGISTER_ADDRESS).await?;
        let mut inserted = 0;

        for address in addresses {
            inserted += self
                .client
                .execute(&stmt, &[&address.canonical(), &DEFAULT_FLOW_SOURCE])
                .await
                .with_context(|| format!("registering {}", address))?;
        }
        Ok(inserted)
    }

    async fn unlabeled_addresses(
        &self,
        after: Option<&AccountAddress>,
        limit: i64,
    ) -> Result<Vec<AccountAddress>> {
        let cursor = after.map(|a| a.canonical());
        let rows = self
            .client
            .query(UNLABELED_ADDRESSES, &[&cursor, &limit])
            .await
            .context("querying unlabeled addresses")?;

        Ok(parse_addresses(rows.iter().map(|row| row.get(0)).collect()))
    }

    async fn upsert_contract_flag(&self, outcome: &AddressOutcome) -> Result<bool> {
        let Some(is_contract) = outcome.is_contract else {
            return Ok(false);
        };

        let changed = self
            .client
            .execute(
                UPSERT_CONTRACT_FLAG,
                &[&outcome.key.canonical(), &DEFAULT_FLOW_SOURCE, &is_contract],
            )
            .await
            .with_context(|| format!("updating contract flag for {}", outcome.key))?;

        Ok(changed > 0)
    }

    async fn upsert_receipt(&self, outcome: &TxOutcome) -> Result<bool> {
        self.write_receipt(UPSERT_RECEIPT, outcome).await
    }

    async fn insert_receipt_if_absent(&self, outcome: &TxOutcome) -> Result<bool> {
        self.write_receipt(INSERT_RECEIPT_IF_ABSENT, outcome).await
    }

    async fn label_summary(&self) -> Result<Vec<FlowSourceSummary>> {
        let rows = self
            .client
            .query(LABEL_SUMMARY, &[])
            .await
            .context("querying label summary")?;

        Ok(rows
            .iter()
            .map(|row| FlowSourceSummary {
                flow_source: row.get(0),
                total: row.get(1),
                contracts: row.get(2),
                eoas: row.get(3),
            })
            .collect())
    }
}

// These run against a live server: DATABASE_URL=... cargo test -- --ignored
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::key::TxHash;
    use crate::models::outcome::Outcome;
    use std::time::{SystemTime, UNIX_EPOCH};

    async fn store() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        Some(PgStore::connect(&url).await.unwrap())
    }

    // keys under a per-test prefix so runs against a shared database do not collide
    fn seed() -> u128 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos()
    }

    fn addr(seed: u128, n: u8) -> AccountAddress {
        AccountAddress::parse(&format!("{:032x}{:08x}", seed, n)).unwrap()
    }

    fn hash(seed: u128, n: u8) -> TxHash {
        TxHash::parse(&format!("{:032x}{:032x}", seed, n)).unwrap()
    }

    async fn stored_gas(store: &PgStore, key: &TxHash) -> (String, String) {
        let row = store
            .client
            .query_one(
                "SELECT gas_used::TEXT, gas_price::TEXT FROM tx_receipts WHERE tx_hash = decode($1, 'hex')",
                &[&key.canonical()],
            )
            .await
            .unwrap();
        (row.get(0), row.get(1))
    }

    #[tokio::test]
    #[ignore]
    async fn registration_inserts_each_sender_once() {
        let Some(store) = store().await else { return };
        let s = seed();

        store
            .client
            .batch_execute("CREATE TEMP TABLE pending_swaps (sender BYTEA)")
            .await
            .unwrap();
        for n in [1, 2, 1, 3] {
            store
                .client
                .execute(
                    "INSERT INTO pending_swaps VALUES (decode($1, 'hex'))",
                    &[&addr(s, n).canonical()],
                )
                .await
                .unwrap();
        }

        let mut missing = store.unregistered_senders("pending_swaps", 10).await.unwrap();
        missing.sort();
        assert_eq!(missing, vec![addr(s, 1), addr(s, 2), addr(s, 3)]);

        assert_eq!(store.register_addresses(&missing).await.unwrap(), 3);
        assert_eq!(store.register_addresses(&missing).await.unwrap(), 0);
        assert!(store.unregistered_senders("pending_swaps", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore]
    async fn guarded_upserts_only_report_real_changes() {
        let Some(store) = store().await else { return };
        let s = seed();
        let key = addr(s, 1);
        store.register_addresses(&[key]).await.unwrap();

        let flag = AddressOutcome { key, is_contract: Some(true) };
        assert!(store.upsert_contract_flag(&flag).await.unwrap());
        assert!(!store.upsert_contract_flag(&flag).await.unwrap());
        assert!(!store.upsert_contract_flag(&AddressOutcome::fallback(key)).await.unwrap());

        let tx = hash(s, 1);
        let good = TxOutcome { key: tx, gas_used: 21_000, gas_price: u128::MAX };
        assert!(store.upsert_receipt(&good).await.unwrap());
        assert!(!store.upsert_receipt(&good).await.unwrap());
        assert!(!store.insert_receipt_if_absent(&TxOutcome::fallback(tx)).await.unwrap());
        assert_eq!(
            stored_gas(&store, &tx).await,
            ("21000".to_string(), u128::MAX.to_string())
        );
    }

    #[tokio::test]
    #[ignore]
    async fn unlabeled_query_pages_strictly_after_cursor() {
        let Some(store) = store().await else { return };
        let s = seed();
        store
            .register_addresses(&[addr(s, 5), addr(s, 1), addr(s, 3)])
            .await
            .unwrap();

        let start = addr(s, 0);
        let first = store.unlabeled_addresses(Some(&start), 2).await.unwrap();
        assert_eq!(first, vec![addr(s, 1), addr(s, 3)]);

        let second = store.unlabeled_addresses(first.last(), 1).await.unwrap();
        assert_eq!(second, vec![addr(s, 5)]);
    }
}
