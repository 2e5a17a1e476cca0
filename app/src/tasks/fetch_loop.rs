use std::path::Path;

use anyhow::Result;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::time::sleep;

use crate::config::{AppConfig, ReceiptSink};
use crate::db::{LabelStore, PgStore};
use crate::helper::rpc::RpcClient;
use crate::models::key::{AccountAddress, TxHash};
use crate::models::outcome::{AddressOutcome, ContractSummary, ReceiptSummary, TxOutcome};
use crate::services::batch::{run_batches, BatchPlan};
use crate::services::contracts::fetch_address_outcome;
use crate::services::export::export_receipts;
use crate::services::receipts::fetch_receipt_outcome;
use crate::services::source::read_keys;
use crate::tasks::stage::{PipelineStage, StageTracker};

/// Where a receipts run persists its outcomes.
pub enum ReceiptTarget<'a> {
    Csv(&'a Path),
    Store(&'a dyn LabelStore),
}

fn rpc_client_or_fail(config: &AppConfig, stages: &mut StageTracker) -> Result<RpcClient> {
    match RpcClient::from_config(config) {
        Ok(client) => Ok(client),
        Err(e) => {
            stages.fail(&e)?;
            Err(e)
        }
    }
}

// ---------------- Receipts ----------------

pub async fn receipts_pipeline<R>(
    config: &AppConfig,
    reader: R,
    target: ReceiptTarget<'_>,
    stages: &mut StageTracker,
) -> Result<ReceiptSummary>
where
    R: AsyncBufRead + Unpin,
{
    let client = rpc_client_or_fail(config, stages)?;

    stages.advance(PipelineStage::Sourcing)?;
    let sourced = read_keys::<TxHash, _>(reader).await?;
    if sourced.keys.is_empty() {
        log::warn!("[RECEIPTS] No transaction hashes provided");
    }
    log::info!(
        "[RECEIPTS] Processing {} transaction hashes ({} rejected lines)...",
        sourced.keys.len(),
        sourced.rejected
    );

    stages.advance(PipelineStage::Enriching)?;
    let plan = BatchPlan::from_config(config, "RECEIPTS");
    let run = run_batches::<TxOutcome, _, _>(&sourced.keys, &plan, |key: TxHash| {
        fetch_receipt_outcome(&client, key)
    })
    .await;

    stages.advance(PipelineStage::Persisting)?;
    match target {
        ReceiptTarget::Csv(path) => export_receipts(path, &run.outcomes)?,
        ReceiptTarget::Store(store) => {
            let mut changed = 0;
            for outcome in &run.outcomes {
                // a failed fetch must not overwrite a receipt stored by an earlier run
                let written = if run.failed.contains(&outcome.key) {
                    store.insert_receipt_if_absent(outcome).await?
                } else {
                    store.upsert_receipt(outcome).await?
                };
                if written {
                    changed += 1;
                }
            }
            log::info!("[RECEIPTS] Upserted {} receipts ({} changed)", run.outcomes.len(), changed);
        }
    }

    stages.advance(PipelineStage::Reporting)?;
    let summary = ReceiptSummary::from_outcomes(&run.outcomes, run.failures);
    log::info!(
        "[RECEIPTS] Summary: {}/{} successful receipt fetches ({} zero rows, {} failed calls)",
        summary.successful,
        summary.processed,
        summary.zero_valued,
        summary.failures
    );

    stages.advance(PipelineStage::Done)?;
    Ok(summary)
}

pub async fn run_receipts_loop(config: AppConfig) -> Result<ReceiptSummary> {
    log::info!("===============================");
    log::info!("[RECEIPTS] Starting receipt fetch...");
    log::info!("===============================");

    let mut stages = StageTracker::new("RECEIPTS");

    if let Err(e) = config.require_rpc_url() {
        stages.fail(&e)?;
        return Err(e.into());
    }

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &config.receipts_input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await;
            match file {
                Ok(file) => Box::new(BufReader::new(file)),
                Err(e) => {
                    let e = anyhow::Error::new(e).context(format!("opening {}", path.display()));
                    stages.fail(&e)?;
                    return Err(e);
                }
            }
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let summary = match config.receipt_sink {
        ReceiptSink::Csv => {
            receipts_pipeline(
                &config,
                reader,
                ReceiptTarget::Csv(&config.receipts_output),
                &mut stages,
            )
            .await?
        }
        ReceiptSink::Postgres => {
            let store = connect_store(&config, &mut stages).await?;
            receipts_pipeline(&config, reader, ReceiptTarget::Store(&store), &mut stages).await?
        }
    };

    log::info!("[RECEIPTS] Finished successfully.");
    Ok(summary)
}

// ---------------- Contracts ----------------

async fn register_senders(store: &dyn LabelStore, table: &str, config: &AppConfig) -> Result<u64> {
    let mut registered = 0;

    for _ in 0..config.max_passes {
        let missing = store.unregistered_senders(table, config.register_limit).await?;
        if missing.is_empty() {
            break;
        }
        log::info!(
            "[CONTRACTS] Found {} new sender addresses in {}",
            missing.len(),
            table
        );

        let inserted = store.register_addresses(&missing).await?;
        registered += inserted;
        log::info!("[CONTRACTS] Inserted {} new addresses into address_labels", inserted);

        // someone else registered them first; the next query would repeat itself
        if inserted == 0 {
            break;
        }
    }

    Ok(registered)
}

pub async fn contracts_pipeline(
    config: &AppConfig,
    store: &dyn LabelStore,
    stages: &mut StageTracker,
) -> Result<ContractSummary> {
    let client = rpc_client_or_fail(config, stages)?;
    let plan = BatchPlan::from_config(config, "CONTRACTS");
    let mut summary = ContractSummary::default();

    stages.advance(PipelineStage::Sourcing)?;
    if let Some(table) = &config.sender_table {
        summary.registered = register_senders(store, table, config).await?;
    }

    // keyset cursor: addresses left undetermined are not sourced again this run
    let mut cursor: Option<AccountAddress> = None;

    loop {
        let candidates = if summary.passes >= config.max_passes {
            log::warn!(
                "[CONTRACTS] Stopping after {} passes (MAX_SOURCE_PASSES)",
                summary.passes
            );
            Vec::new()
        } else {
            store
                .unlabeled_addresses(cursor.as_ref(), config.source_limit)
                .await?
        };

        if candidates.is_empty() {
            stages.advance(PipelineStage::Reporting)?;
            break;
        }

        summary.passes += 1;
        cursor = candidates.last().copied();
        log::info!(
            "[CONTRACTS] Processing pass {} ({} addresses)...",
            summary.passes,
            candidates.len()
        );

        stages.advance(PipelineStage::Enriching)?;
        let run = run_batches::<AddressOutcome, _, _>(&candidates, &plan, |key: AccountAddress| {
            fetch_address_outcome(&client, key)
        })
        .await;

        stages.advance(PipelineStage::Persisting)?;
        for outcome in &run.outcomes {
            store.upsert_contract_flag(outcome).await?;
        }

        stages.advance(PipelineStage::Reporting)?;
        let mut pass = ContractSummary::default();
        pass.absorb(&run.outcomes);
        log::info!(
            "[CONTRACTS] Updated {} addresses: {} contracts, {} EOAs, {} undetermined",
            pass.processed,
            pass.contracts,
            pass.eoas,
            pass.undetermined
        );
        summary.absorb(&run.outcomes);

        // never pause right after a partial window
        if candidates.len() as i64 == config.source_limit && run.last_window_full {
            log::info!(
                "[CONTRACTS] Sleeping {:?} to respect rate limits...",
                config.batch_delay
            );
            sleep(config.batch_delay).await;
        }

        stages.advance(PipelineStage::Sourcing)?;
    }

    log::info!(
        "[CONTRACTS] Contract marking complete! Processed {} addresses total ({} contracts, {} EOAs, {} undetermined).",
        summary.processed,
        summary.contracts,
        summary.eoas,
        summary.undetermined
    );

    log::info!("[CONTRACTS] Address summary by flow source:");
    for row in store.label_summary().await? {
        log::info!(
            "[CONTRACTS]    {}: {} total ({} contracts, {} EOAs)",
            row.flow_source,
            row.total,
            row.contracts,
            row.eoas
        );
    }

    stages.advance(PipelineStage::Done)?;
    Ok(summary)
}

pub async fn run_contracts_loop(config: AppConfig) -> Result<ContractSummary> {
    log::info!("===============================");
    log::info!("[CONTRACTS] Starting contract marking...");
    log::info!("===============================");

    let mut stages = StageTracker::new("CONTRACTS");

    if let Err(e) = config.require_rpc_url() {
        stages.fail(&e)?;
        return Err(e.into());
    }
    let store = connect_store(&config, &mut stages).await?;

    let summary = contracts_pipeline(&config, &store, &mut stages).await?;

    log::info!("[CONTRACTS] Finished successfully.");
    Ok(summary)
}

async fn connect_store(config: &AppConfig, stages: &mut StageTracker) -> Result<PgStore> {
    let connected = match config.require_database_url() {
        Ok(url) => PgStore::connect(url).await,
        Err(e) => Err(e.into()),
    };

    match connected {
        Ok(store) => Ok(store),
        Err(e) => {
            stages.fail(&e)?;
            Err(e)
        }
    }
}
