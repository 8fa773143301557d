//! Structured JSON-lines logging.
//!
//! Every record carries a run id, a sequence number, a level and a domain.
//! Records go to stderr; when `LOG_DIR` is set they are also appended to
//! `<LOG_DIR>/<run_id>/events.jsonl`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use crate::error::FetchFailure;
use crate::phase::{BandStats, Phase};

// =============================================================================
// Levels and domains
// =============================================================================

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
    pub fn parse(s: &str) -> Self {
        match s {
            "trace" => Level::Trace,
            "debug" => Level::Debug,
            "warn" => Level::Warn,
            "error" => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_LEVEL").as_deref().unwrap_or("info"))
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Fetch,   // Upstream requests and parse failures
    Cache,   // Hits, misses, expiries
    Phase,   // Classification results
    Zone,    // Zone joins and aggregation
    System,  // Startup, refresh loop, export
    Profile, // Timing
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fetch => "fetch",
            Domain::Cache => "cache",
            Domain::Phase => "phase",
            Domain::Zone => "zone",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        domain_enabled(std::env::var("LOG_DOMAINS").ok().as_deref(), *self)
    }
}

/// `None` or `"all"` enables everything; otherwise a comma-separated list.
fn domain_enabled(filter: Option<&str>, domain: Domain) -> bool {
    match filter {
        None | Some("all") => true,
        Some(list) => list.split(',').any(|d| d.trim() == domain.as_str()),
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let events = std::env::var("LOG_DIR").ok().and_then(|base| {
            let mut dir = PathBuf::from(base);
            dir.push(&run_id);
            if let Err(err) = create_dir_all(&dir) {
                eprintln!("[log] failed to create run dir: {}", err);
                return None;
            }
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("events.jsonl"))
                .map_err(|err| eprintln!("[log] failed to open events log: {}", err))
                .ok()
                .map(|f| Mutex::new(BufWriter::new(f)))
        });
        RunContext { run_id, events }
    })
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    for key in ["api_key", "X-CMC_PRO_API_KEY", "authorization"] {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), redacted.clone());
        }
    }
    fields
}

// =============================================================================
// Core
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    let line = build_record(level, domain, event, fields).to_string();

    let ctx = ensure_run_context();
    if let Some(events) = &ctx.events {
        if let Ok(mut w) = events.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
    eprintln!("{}", line);
}

fn build_record(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) -> Value {
    let ctx = ensure_run_context();
    let mut data = sanitize_fields(fields);
    let msg = data.remove("msg").unwrap_or(Value::String(String::new()));

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(data));
    Value::Object(entry)
}

// =============================================================================
// Domain helpers
// =============================================================================

pub fn log_fetch_failure(source: &str, err: &FetchFailure) {
    log(
        Level::Warn,
        Domain::Fetch,
        "fetch_failed",
        obj(&[
            ("source", v_str(source)),
            ("kind", v_str(err.kind())),
            ("msg", v_str(&err.to_string())),
        ]),
    );
}

pub fn log_cache(event: &str, key: &str) {
    log(Level::Debug, Domain::Cache, event, obj(&[("key", v_str(key))]));
}

pub fn log_phase(
    phase: Phase,
    btc_dominance_pct: Option<f64>,
    eth_btc_ratio: Option<f64>,
    bands: &BandStats,
) {
    log(
        Level::Info,
        Domain::Phase,
        "classified",
        obj(&[
            ("phase", v_str(phase.label())),
            ("btc_dominance_pct", v_opt(btc_dominance_pct)),
            ("eth_btc_ratio", v_opt(eth_btc_ratio)),
            ("avg_largecap_change", v_opt(bands.avg_largecap_change)),
            ("avg_altcoin_change", v_opt(bands.avg_altcoin_change)),
            ("altcoin_drop_rate", v_opt(bands.altcoin_drop_rate)),
        ]),
    );
}

pub fn log_zone_summary(source: &str, records: usize, zones: usize) {
    log(
        Level::Info,
        Domain::Zone,
        "aggregated",
        obj(&[
            ("source", v_str(source)),
            ("records", json!(records)),
            ("zones", json!(zones)),
        ]),
    );
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

pub fn v_opt(n: Option<f64>) -> Value {
    n.map(v_num).unwrap_or(Value::Null)
}

// =============================================================================
// Profiling scope
// =============================================================================

/// Emits a `profile` record with the elapsed time on drop.
pub struct ProfileScope {
    label: &'static str,
    started: Instant,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        log(
            Level::Debug,
            Domain::Profile,
            "profile",
            obj(&[("label", v_str(self.label)), ("elapsed_ms", v_num(elapsed_ms))]),
        );
    }
}
