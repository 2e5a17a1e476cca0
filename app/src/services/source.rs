use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::models::key::Key;

#[derive(Debug)]
pub struct SourcedKeys<K> {
    pub keys: Vec<K>,
    /// Non-blank lines that did not parse as a key.
    pub rejected: usize,
}

/// Reads one key per line until the stream is exhausted. Blank lines are
/// skipped; unparseable or non-UTF-8 lines are logged and dropped before
/// enrichment.
pub async fn read_keys<K, R>(mut reader: R) -> Result<SourcedKeys<K>>
where
    K: Key,
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut keys = Vec::new();
    let mut rejected = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                log::warn!("skipping input line: not UTF-8 ({})", e);
                rejected += 1;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match K::parse(line) {
            Ok(key) => keys.push(key),
            Err(e) => {
                log::warn!("skipping input line: {}", e);
                rejected += 1;
            }
        }
    }

    Ok(SourcedKeys { keys, rejected })
}
