use crate::metrics::{BATCH_SIZE, FLUSH_LATENCY_SECONDS, STORE_FAILURES_TOTAL};
use crate::model::Reading;
use crate::store::ReadingStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant};
use tracing::{debug, error, info, warn};

const MAX_RETRIES: u32 = 3;

pub async fn run_batcher(
    mut rx: mpsc::Receiver<Reading>,
    store: Arc<dyn ReadingStore>,
    max_batch: usize,
    max_wait_ms: u64,
) {
    info!(max_batch, max_wait_ms, "Starting reading batcher");

    let mut buffer: Vec<Reading> = Vec::with_capacity(max_batch);
    let mut ticker = interval(Duration::from_millis(max_wait_ms.max(1)));

    loop {
        tokio::select! {
            reading = rx.recv() => {
                match reading {
                    Some(r) => {
                        buffer.push(r);

                        if buffer.len() >= max_batch {
                            flush_batch(store.as_ref(), &mut buffer).await;
                        }
                    }
                    None => {
                        info!("Channel closed, flushing remaining batch");
                        flush_batch(store.as_ref(), &mut buffer).await;
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    flush_batch(store.as_ref(), &mut buffer).await;
                }
            }
        }
    }

    info!("Batcher stopped");
}

/// Writes the buffered readings, retrying transient store errors with
/// exponential backoff. The buffer is cleared whether or not the write lands.
async fn flush_batch(store: &dyn ReadingStore, buffer: &mut Vec<Reading>) {
    let batch_len = buffer.len();
    if batch_len == 0 {
        return;
    }

    debug!(batch_len, "Flushing reading batch");
    BATCH_SIZE.set(batch_len as f64);

    let start = Instant::now();
    let received_at = Utc::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match store.record_batch(buffer.as_slice(), received_at).await {
            Ok(appended) => {
                let elapsed = start.elapsed().as_secs_f64();
                FLUSH_LATENCY_SECONDS.observe(elapsed);
                if appended < batch_len {
                    warn!(
                        skipped = batch_len - appended,
                        "Dropped readings for unknown devices"
                    );
                }
                debug!(appended, attempt, elapsed, "Batch written");
                break;
            }
            Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                STORE_FAILURES_TOTAL.inc();
                let backoff_ms = 100 * 2_u64.pow(attempt - 1);
                warn!(
                    attempt,
                    max_attempts = MAX_RETRIES,
                    backoff_ms,
                    error = %e,
                    "Failed to write batch, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            Err(e) => {
                STORE_FAILURES_TOTAL.inc();
                error!(attempt, error = %e, dropped = batch_len, "Failed to write batch");
                break;
            }
        }
    }

    buffer.clear();
    BATCH_SIZE.set(0.0);
}
