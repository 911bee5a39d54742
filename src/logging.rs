//! Structured logging for the volatility pipeline.
//!
//! Every entry is a single JSON line carrying a run id, a monotonic
//! sequence number, a level, and a domain. Entries mirror to stdout and to
//! per-run JSONL files so a service run can be replayed and audited.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

/// Domain categories for filtering via LOG_DOMAINS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Feed,   // price polling, sample ingestion
    Vol,    // statistical volatility estimation
    Model,  // feature construction, inference
    Risk,   // lambda calculation, risk tiers
    System, // lifecycle, startup, shutdown
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Feed => "feed",
            Domain::Vol => "vol",
            Domain::Model => "model",
            Domain::Risk => "risk",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

struct RunContext {
    run_id: String,
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }
        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
            })
            .to_string(),
        );

        let events = File::create(run_dir.join("events.jsonl")).unwrap_or_else(|err| {
            eprintln!("[log] failed to create events log: {}", err);
            File::create("/tmp/zkrisk-events.jsonl").expect("events fallback")
        });
        let trace = File::create(run_dir.join("trace.jsonl")).unwrap_or_else(|err| {
            eprintln!("[log] failed to create trace log: {}", err);
            File::create("/tmp/zkrisk-trace.jsonl").expect("trace fallback")
        });

        RunContext {
            run_id,
            events: Mutex::new(BufWriter::new(events)),
            trace: Mutex::new(BufWriter::new(trace)),
        }
    })
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry.
pub fn log(level: Level, domain: Domain, event: &str, mut fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    let ctx = ensure_run_context();
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));
    let symbol = fields.remove("symbol");

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("domain".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    if let Some(symbol) = symbol {
        entry.insert("symbol".to_string(), symbol);
    }
    entry.insert("data".to_string(), Value::Object(fields));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    println!("{}", line);
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Domain-specific helpers
// =============================================================================

pub fn log_price_sample(symbol: &str, price: f64, confidence: f64, publish_time: u64) {
    log(
        Level::Debug,
        Domain::Feed,
        "price_sample",
        obj(&[
            ("symbol", v_str(symbol)),
            ("price", v_num(price)),
            ("confidence", v_num(confidence)),
            ("publish_time", json!(publish_time)),
        ]),
    );
}

pub fn log_poll_skip(symbol: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Feed,
        "poll_skip",
        obj(&[("symbol", v_str(symbol)), ("reason", v_str(reason))]),
    );
}

pub fn log_volatility(symbol: &str, kind: &str, value: f64, samples: usize) {
    log(
        Level::Debug,
        Domain::Vol,
        "volatility",
        obj(&[
            ("symbol", v_str(symbol)),
            ("kind", v_str(kind)),
            ("value", v_num(value)),
            ("samples", json!(samples)),
        ]),
    );
}

pub fn log_prediction(symbol: &str, volatility: f64, method: &str, confidence: &str) {
    log(
        Level::Info,
        Domain::Model,
        "prediction",
        obj(&[
            ("symbol", v_str(symbol)),
            ("volatility", v_num(volatility)),
            ("method", v_str(method)),
            ("confidence", v_str(confidence)),
        ]),
    );
}

pub fn log_lambda(symbol: &str, volatility: f64, lambda: f64, strategy: &str) {
    log(
        Level::Info,
        Domain::Risk,
        "lambda",
        obj(&[
            ("symbol", v_str(symbol)),
            ("volatility", v_num(volatility)),
            ("lambda", v_num(lambda)),
            ("strategy", v_str(strategy)),
        ]),
    );
}

pub fn log_lifecycle(event: &str, detail: &str) {
    log(
        Level::Info,
        Domain::System,
        event,
        obj(&[("msg", v_str(detail))]),
    );
}
