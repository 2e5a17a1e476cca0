use std::collections::HashSet;
use std::future::Future;

use tokio::time::{sleep, Duration};

use crate::config::AppConfig;
use crate::helper::rpc::RpcError;
use crate::models::outcome::Outcome;

#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub delay: Duration,
    pub progress_every: usize,
    /// Log prefix, e.g. `RECEIPTS`.
    pub label: &'static str,
}

impl BatchPlan {
    pub fn from_config(config: &AppConfig, label: &'static str) -> Self {
        Self {
            batch_size: config.batch_size,
            delay: config.batch_delay,
            progress_every: config.progress_every,
            label,
        }
    }
}

#[derive(Debug)]
pub struct BatchRun<O: Outcome> {
    /// One per input key, in input order.
    pub outcomes: Vec<O>,
    pub batches: usize,
    pub pauses: usize,
    pub failures: usize,
    /// Keys whose outcome is the fallback because the call failed.
    pub failed: HashSet<O::Key>,
    /// Whether the final window was full-sized.
    pub last_window_full: bool,
}

/// Enrich `keys` window by window, strictly in order.
///
/// A failed call never aborts its window: the key gets `O::fallback`.
/// Only full windows that are followed by another window are paced.
pub async fn run_batches<O, F, Fut>(keys: &[O::Key], plan: &BatchPlan, mut enrich: F) -> BatchRun<O>
where
    O: Outcome,
    F: FnMut(O::Key) -> Fut,
    Fut: Future<Output = Result<O, RpcError>>,
{
    let mut run = BatchRun {
        outcomes: Vec::with_capacity(keys.len()),
        batches: 0,
        pauses: 0,
        failures: 0,
        failed: HashSet::new(),
        last_window_full: false,
    };

    // a zero size would make chunks() panic; config validation rejects it anyway
    let size = plan.batch_size.max(1);
    let total = keys.len();
    let windows = total.div_ceil(size);

    for (index, window) in keys.chunks(size).enumerate() {
        log::info!(
            "[{}] Processing batch {}/{} ({} keys)...",
            plan.label,
            index + 1,
            windows,
            window.len()
        );

        for &key in window {
            let outcome = match enrich(key).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::warn!("[{}] {} failed: {}", plan.label, key, e);
                    run.failures += 1;
                    run.failed.insert(key);
                    O::fallback(key)
                }
            };
            run.outcomes.push(outcome);

            let done = run.outcomes.len();
            if plan.progress_every > 0 && done % plan.progress_every == 0 {
                log::info!("[{}]    fetched {}/{}", plan.label, done, total);
            }
        }
        run.batches += 1;
        run.last_window_full = window.len() == size;

        let is_last = index + 1 == windows;
        if run.last_window_full && !is_last {
            log::info!(
                "[{}] Sleeping {:?} to respect rate limits...",
                plan.label,
                plan.delay
            );
            sleep(plan.delay).await;
            run.pauses += 1;
        }
    }

    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::key::{AccountAddress, Key, TxHash};
    use crate::models::outcome::{AddressOutcome, TxOutcome};
    use std::cell::RefCell;
    use tokio::time::Instant;

    fn hashes(n: usize) -> Vec<TxHash> {
        (0..n)
            .map(|i| TxHash::parse(&format!("{:064x}", i + 1)).unwrap())
            .collect()
    }

    fn plan(batch_size: usize, delay_ms: u64) -> BatchPlan {
        BatchPlan {
            batch_size,
            delay: Duration::from_millis(delay_ms),
            progress_every: 10,
            label: "TEST",
        }
    }

    fn gas_for(key: TxHash) -> TxOutcome {
        TxOutcome {
            key,
            gas_used: key.0.to_low_u64_be() as u128 * 1_000,
            gas_price: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn paces_only_between_full_windows() {
        let keys = hashes(120);
        let started = Instant::now();

        let run = run_batches::<TxOutcome, _, _>(&keys, &plan(50, 500), |k: TxHash| async move { Ok(gas_for(k)) }).await;

        assert_eq!(run.outcomes.len(), 120);
        assert_eq!(run.batches, 3);
        assert_eq!(run.pauses, 2);
        assert!(!run.last_window_full);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn exact_multiple_has_no_trailing_pause() {
        let keys = hashes(100);
        let run = run_batches::<TxOutcome, _, _>(&keys, &plan(50, 500), |k: TxHash| async move { Ok(gas_for(k)) }).await;
        assert_eq!(run.batches, 2);
        assert_eq!(run.pauses, 1);
        assert!(run.last_window_full);
        assert!(run.failed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_makes_no_calls() {
        let calls = RefCell::new(0);
        let started = Instant::now();

        let run = run_batches::<TxOutcome, _, _>(&[], &plan(50, 500), |k: TxHash| {
            *calls.borrow_mut() += 1;
            async move { Ok(gas_for(k)) }
        })
        .await;

        assert!(run.outcomes.is_empty());
        assert_eq!(run.batches, 0);
        assert_eq!(run.pauses, 0);
        assert_eq!(*calls.borrow(), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_become_fallbacks_in_place() {
        let keys = hashes(7);
        let failing = [keys[1], keys[4]];

        let run = run_batches::<TxOutcome, _, _>(&keys, &plan(3, 10), |k: TxHash| async move {
            if failing.contains(&k) {
                Err(RpcError::Timeout)
            } else {
                Ok(gas_for(k))
            }
        })
        .await;

        assert_eq!(run.failures, 2);
        let expected: HashSet<TxHash> = failing.into_iter().collect();
        assert_eq!(run.failed, expected);
        let order: Vec<TxHash> = run.outcomes.iter().map(|o| o.key).collect();
        assert_eq!(order, keys);
        assert_eq!(run.outcomes[1], TxOutcome::fallback(keys[1]));
        assert_eq!(run.outcomes[4], TxOutcome::fallback(keys[4]));
        assert_eq!(run.outcomes[5], gas_for(keys[5]));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_enriched_sequentially_in_order() {
        let keys: Vec<AccountAddress> = (0..5)
            .map(|i| AccountAddress::parse(&format!("{:040x}", 100 - i)).unwrap())
            .collect();
        let seen = RefCell::new(Vec::new());

        let run = run_batches::<AddressOutcome, _, _>(&keys, &plan(2, 10), |k: AccountAddress| {
            seen.borrow_mut().push(k);
            async move {
                Ok(AddressOutcome {
                    key: k,
                    is_contract: Some(true),
                })
            }
        })
        .await;

        assert_eq!(*seen.borrow(), keys);
        assert_eq!(run.outcomes.len(), keys.len());
        assert_eq!(run.pauses, 2);
    }
}
