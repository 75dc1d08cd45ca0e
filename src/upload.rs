//! Chunked uploads with whole-batch retries and progress reporting.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::StorageConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl From<&StorageConfig> for RetryPolicy {
    fn from(config: &StorageConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// `op` must be safe to repeat: a failed batch is always re-sent in full.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts => {
                warn!(
                    "{} failed (attempt {}/{}): {:#}; retrying",
                    label, attempt, policy.max_attempts, e
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e.context(format!("{} failed after {} attempts", label, attempt))),
        }
    }
}

pub fn progress_bar(len: u64, label: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );
    pb.set_message(label.to_string());
    Ok(pb)
}

/// Write `records` in chunks of `batch_size`, retrying each chunk as a unit.
///
/// Returns the number of records written.
pub async fn upload_in_batches<T, F, Fut>(
    label: &str,
    records: &[T],
    batch_size: usize,
    policy: RetryPolicy,
    mut write: F,
) -> Result<usize>
where
    F: FnMut(&[T]) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let batch_size = batch_size.max(1);
    let pb = progress_bar(records.len() as u64, label)?;
    let mut written = 0;

    for (n, chunk) in records.chunks(batch_size).enumerate() {
        let batch_label = format!("{} batch {}", label, n + 1);
        with_retry(policy, &batch_label, || write(chunk)).await?;
        written += chunk.len();
        pb.inc(chunk.len() as u64);
    }

    pb.finish_with_message(format!("{} complete", label));
    info!("Uploaded {} {} records", written, label);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let value = with_retry(fast(), "flaky", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("transient");
            }
            Ok(7)
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(fast(), "broken", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("down")
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_batch_resent_whole() {
        let records: Vec<u32> = (0..10).collect();
        let sent = Mutex::new(Vec::new());
        let failed_once = AtomicU32::new(0);

        let written = upload_in_batches("numbers", &records, 4, fast(), |chunk| {
            let chunk = chunk.to_vec();
            let fail = chunk[0] == 4 && failed_once.fetch_add(1, Ordering::SeqCst) == 0;
            if !fail {
                sent.lock().unwrap().push(chunk);
            }
            async move {
                if fail {
                    anyhow::bail!("batch rejected");
                }
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(written, 10);
        let sent = sent.into_inner().unwrap();
        assert_eq!(sent, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);
    }
}
