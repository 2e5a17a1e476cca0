use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::models::key::Key;
use crate::models::outcome::TxOutcome;

pub const RECEIPTS_HEADER: &str = "tx_hash,gas_used,gas_price";

/// Header first, then one row per outcome. The header is written even
/// when there are no rows.
pub fn write_receipts_csv<W: Write>(mut writer: W, outcomes: &[TxOutcome]) -> Result<()> {
    writeln!(writer, "{}", RECEIPTS_HEADER)?;
    for row in outcomes {
        writeln!(
            writer,
            "{},{},{}",
            row.key.canonical(),
            row.gas_used,
            row.gas_price
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_receipts(path: &Path, outcomes: &[TxOutcome]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating export file {}", path.display()))?;

    write_receipts_csv(BufWriter::new(file), outcomes)
        .with_context(|| format!("writing export file {}", path.display()))?;

    log::info!(
        "[RECEIPTS] Results written to {} ({} rows)",
        path.display(),
        outcomes.len()
    );
    Ok(())
}
