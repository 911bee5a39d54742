//! Background price collection.
//!
//! One task polls the feed for every tracked symbol on a fixed interval and
//! appends decoded samples into the shared history. Per-symbol failures are
//! logged and skipped; a failure of the whole cycle backs off for a longer
//! interval instead of terminating the loop.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

use crate::feed::PriceFeedSource;
use crate::history::PriceHistory;
use crate::logging::{log_lifecycle, log_poll_skip, log_price_sample};

pub struct PriceCollector {
    feed: Arc<dyn PriceFeedSource>,
    history: Arc<PriceHistory>,
    symbols: Vec<String>,
    poll_interval: Duration,
    error_backoff: Duration,
    stop_timeout: Duration,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PriceCollector {
    pub fn new(
        feed: Arc<dyn PriceFeedSource>,
        history: Arc<PriceHistory>,
        symbols: Vec<String>,
        poll_interval: Duration,
        error_backoff: Duration,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            feed,
            history,
            symbols,
            poll_interval,
            error_backoff,
            stop_timeout,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the polling task. Rejects a second start while running.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(anyhow::anyhow!("collector already running"));
        }

        let feed = Arc::clone(&self.feed);
        let history = Arc::clone(&self.history);
        let symbols = self.symbols.clone();
        let poll_interval = self.poll_interval;
        let error_backoff = self.error_backoff;
        let running = Arc::clone(&self.running);

        let task = tokio::spawn(async move {
            log_lifecycle("collector_start", "price collection loop running");
            while running.load(Ordering::SeqCst) {
                let pause = match poll_cycle(feed.as_ref(), &history, &symbols).await {
                    Ok(_) => poll_interval,
                    Err(err) => {
                        log_poll_skip("*", &format!("poll cycle failed: {}", err));
                        error_backoff
                    }
                };
                interruptible_sleep(pause, &running).await;
            }
            log_lifecycle("collector_exit", "price collection loop exited");
        });

        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(task);
        }
        Ok(())
    }

    /// Signal the loop to exit and wait for it, bounded by the stop timeout.
    /// A task that fails to exit in time is reported, not aborted.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let task = self.handle.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            match timeout(self.stop_timeout, task).await {
                Ok(Ok(())) => log_lifecycle("collector_stop", "collector stopped cleanly"),
                Ok(Err(err)) => {
                    log_poll_skip("*", &format!("collector task join error: {}", err))
                }
                Err(_) => log_poll_skip(
                    "*",
                    &format!(
                        "collector did not exit within {:?}; continuing shutdown",
                        self.stop_timeout
                    ),
                ),
            }
        }
    }
}

/// Poll every tracked symbol once. Individual symbol failures are logged
/// and skipped so one bad feed cannot starve the rest of the cycle.
async fn poll_cycle(
    feed: &dyn PriceFeedSource,
    history: &PriceHistory,
    symbols: &[String],
) -> Result<usize> {
    let mut appended = 0;
    for symbol in symbols {
        match feed.latest_price(symbol).await {
            Ok(update) => {
                let sample = update.into_sample();
                if sample.price <= 0.0 {
                    log_poll_skip(symbol, "non-positive decoded price");
                    continue;
                }
                log_price_sample(symbol, sample.price, sample.confidence, sample.timestamp);
                history.append(sample);
                appended += 1;
            }
            Err(err) => log_poll_skip(symbol, &err.to_string()),
        }
    }
    Ok(appended)
}

/// Sleep in short slices so a stop signal interrupts promptly.
async fn interruptible_sleep(total: Duration, running: &AtomicBool) {
    let slice = Duration::from_millis(200);
    let mut remaining = total;
    while !remaining.is_zero() && running.load(Ordering::SeqCst) {
        let step = remaining.min(slice);
        sleep(step).await;
        remaining = remaining.saturating_sub(step);
    }
}
