use anyhow::Result;

use chain_enricher::config::{AppConfig, AppMode};
use chain_enricher::tasks::fetch_loop::{run_contracts_loop, run_receipts_loop};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;

    match config.mode {
        AppMode::Receipts => {
            run_receipts_loop(config).await?;
        }
        AppMode::Contracts => {
            run_contracts_loop(config).await?;
        }
    }

    Ok(())
}
