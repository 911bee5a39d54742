//! Bounded per-symbol price history.
//!
//! The collector is the only writer; estimation calls are the readers. All
//! reads copy the relevant slice out under the lock, so a buffer that is
//! appending or evicting concurrently can never hand out a torn view.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::config::now_ts;

/// One observed price point. Immutable once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct PriceSample {
    pub symbol: String,
    pub price: f64,
    pub confidence: f64,
    /// Epoch seconds.
    pub timestamp: u64,
}

/// Per-symbol summary for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolOverview {
    pub symbol: String,
    pub count: usize,
    pub latest_price: Option<f64>,
    pub latest_timestamp: Option<u64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// Fixed-capacity FIFO history per symbol.
///
/// Capacity is enforced on append: once a series reaches `capacity`, the
/// oldest sample is evicted. Insertion order is chronological order.
pub struct PriceHistory {
    capacity: usize,
    series: Mutex<HashMap<String, VecDeque<PriceSample>>>,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&self, sample: PriceSample) {
        if let Ok(mut map) = self.series.lock() {
            let buf = map
                .entry(sample.symbol.clone())
                .or_insert_with(|| VecDeque::with_capacity(self.capacity));
            buf.push_back(sample);
            while buf.len() > self.capacity {
                buf.pop_front();
            }
        }
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.series
            .lock()
            .map(|map| map.get(symbol).map(|b| b.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, symbol: &str) -> bool {
        self.len(symbol) == 0
    }

    pub fn latest(&self, symbol: &str) -> Option<PriceSample> {
        self.series
            .lock()
            .ok()
            .and_then(|map| map.get(symbol).and_then(|b| b.back().cloned()))
    }

    /// Last `n` samples (or fewer), oldest first.
    pub fn recent(&self, symbol: &str, n: usize) -> Vec<PriceSample> {
        match self.series.lock() {
            Ok(map) => map
                .get(symbol)
                .map(|buf| {
                    let skip = buf.len().saturating_sub(n);
                    buf.iter().skip(skip).cloned().collect()
                })
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// All samples with `timestamp >= now - period_secs`, oldest first.
    pub fn window(&self, symbol: &str, period_secs: u64) -> Vec<PriceSample> {
        self.window_from(symbol, period_secs, now_ts())
    }

    /// Window relative to an explicit reference time.
    pub fn window_from(&self, symbol: &str, period_secs: u64, now: u64) -> Vec<PriceSample> {
        let cutoff = now.saturating_sub(period_secs);
        match self.series.lock() {
            Ok(map) => map
                .get(symbol)
                .map(|buf| {
                    buf.iter()
                        .filter(|s| s.timestamp >= cutoff)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Per-symbol counts and price ranges for health reporting.
    pub fn overview(&self) -> Vec<SymbolOverview> {
        match self.series.lock() {
            Ok(map) => {
                let mut out: Vec<SymbolOverview> = map
                    .iter()
                    .map(|(symbol, buf)| {
                        let mut min_price = None;
                        let mut max_price = None;
                        for s in buf.iter() {
                            min_price = Some(min_price.map_or(s.price, |m: f64| m.min(s.price)));
                            max_price = Some(max_price.map_or(s.price, |m: f64| m.max(s.price)));
                        }
                        SymbolOverview {
                            symbol: symbol.clone(),
                            count: buf.len(),
                            latest_price: buf.back().map(|s| s.price),
                            latest_timestamp: buf.back().map(|s| s.timestamp),
                            min_price,
                            max_price,
                        }
                    })
                    .collect();
                out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
                out
            }
            Err(_) => Vec::new(),
        }
    }
}
