//! Structured JSON-lines logging for dashboard sessions.
//!
//! Design goals:
//! 1. Multi-level granularity (TRACE → FATAL)
//! 2. Domain categories for filtering (store, transform, controller, ...)
//! 3. Periodic refresh counters for summarisation
//! 4. Audit trail of every persisted artifact generation (fingerprints)
//!
//! Records go to a per-run directory and are mirrored to stderr; stdout is
//! reserved for the session protocol.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
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
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Store,      // Artifact reads and writes
    Transform,  // -log10 matrix and flattening
    Threshold,  // Corrected significance threshold
    Controller, // Recompute/reuse decisions, refresh outcomes
    Panel,      // Panel registry
    System,     // Startup, shutdown
    Profile,    // Timing
    Audit,      // Persisted generation fingerprints
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Store => "store",
            Domain::Transform => "transform",
            Domain::Threshold => "threshold",
            Domain::Controller => "controller",
            Domain::Panel => "panel",
            Domain::System => "system",
            Domain::Profile => "profile",
            Domain::Audit => "audit",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

type Sink = Mutex<BufWriter<Box<dyn Write + Send>>>;

struct RunContext {
    run_id: String,
    events: Sink,
    trace: Sink,
    metrics: Sink,
}

fn open_sink(path: PathBuf) -> Sink {
    let inner: Box<dyn Write + Send> = match File::create(&path) {
        Ok(file) => Box::new(file),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            Box::new(io::sink())
        }
    };
    Mutex::new(BufWriter::new(inner))
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
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        RunContext {
            events: open_sink(run_dir.join("events.jsonl")),
            trace: open_sink(run_dir.join("trace.jsonl")),
            metrics: open_sink(run_dir.join("metrics.jsonl")),
            run_id,
        }
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["panel", "seq", "artifact", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Sink, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq_no".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    if event.starts_with("metrics.") {
        write_line(&ctx.metrics, &line);
    }
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    eprintln!("{}", line);
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_refresh(panel: u32, seq: u64, trigger: &str, decision: &str, points: usize, threshold: f64) {
    log(
        Level::Info,
        Domain::Controller,
        "refresh",
        obj(&[
            ("panel", json!(panel)),
            ("seq", json!(seq)),
            ("trigger", v_str(trigger)),
            ("decision", v_str(decision)),
            ("points", json!(points)),
            ("threshold", v_num(threshold)),
        ]),
    );
}

pub fn log_guard(panel: u32, seq: u64, reason: &str) {
    log(
        Level::Debug,
        Domain::Controller,
        "guard",
        obj(&[
            ("panel", json!(panel)),
            ("seq", json!(seq)),
            ("reason", v_str(reason)),
        ]),
    );
}

pub fn log_refresh_failure(panel: u32, seq: u64, kind: &str, msg: &str) {
    log(
        Level::Warn,
        Domain::Controller,
        "refresh_failed",
        obj(&[
            ("panel", json!(panel)),
            ("seq", json!(seq)),
            ("kind", v_str(kind)),
            ("msg", v_str(msg)),
        ]),
    );
}

pub fn log_cache_decision(panel: u32, decision: &str, generation: u64, reason: &str) {
    log(
        Level::Debug,
        Domain::Controller,
        "cache_decision",
        obj(&[
            ("panel", json!(panel)),
            ("decision", v_str(decision)),
            ("generation", json!(generation)),
            ("reason", v_str(reason)),
        ]),
    );
}

pub fn log_transform(panel: u32, base_rows: usize, columns: usize, kept: usize) {
    log(
        Level::Debug,
        Domain::Transform,
        "transform",
        obj(&[
            ("panel", json!(panel)),
            ("base_rows", json!(base_rows)),
            ("columns", json!(columns)),
            ("kept", json!(kept)),
        ]),
    );
}

pub fn log_threshold(panel: u32, raw_p: f64, comparisons: usize, value: f64) {
    log(
        Level::Debug,
        Domain::Threshold,
        "threshold",
        obj(&[
            ("panel", json!(panel)),
            ("raw_p", v_num(raw_p)),
            ("comparisons", json!(comparisons)),
            ("value", v_num(value)),
        ]),
    );
}

/// Audit entry for a persisted artifact generation
pub fn log_artifact_write(artifact: &str, generation: u64, fingerprint: &str, rows: usize) {
    log(
        Level::Info,
        Domain::Audit,
        "artifact_write",
        obj(&[
            ("artifact", v_str(artifact)),
            ("generation", json!(generation)),
            ("fingerprint", v_str(fingerprint)),
            ("rows", json!(rows)),
        ]),
    );
}

pub fn log_panel_added(panel: u32, kind: &str) {
    log(
        Level::Info,
        Domain::Panel,
        "panel_added",
        obj(&[("panel", json!(panel)), ("kind", v_str(kind))]),
    );
}

pub fn log_session_start(backend: &str, tolerance: f64) {
    log(
        Level::Info,
        Domain::System,
        "session_start",
        obj(&[("backend", v_str(backend)), ("symmetry_tolerance", v_num(tolerance))]),
    );
}

/// Session summary on shutdown
pub fn log_session_summary(duration_secs: u64, commands: u64, panels: usize) {
    let (recomputes, reuses, reloads, guards, failures) = aggregator_totals();
    log(
        Level::Info,
        Domain::System,
        "session_summary",
        obj(&[
            ("duration_secs", json!(duration_secs)),
            ("commands", json!(commands)),
            ("panels", json!(panels)),
            ("recomputes", json!(recomputes)),
            ("reuses", json!(reuses)),
            ("reloads", json!(reloads)),
            ("guards", json!(guards)),
            ("failures", json!(failures)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

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
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Option<Map<String, Value>>,
    started: Instant,
    enabled: bool,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            context: None,
            started: Instant::now(),
            enabled: Self::should_sample(),
        }
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        let enabled = Self::should_sample();
        Self {
            label,
            context: if enabled { Some(obj(fields)) } else { None },
            started: Instant::now(),
            enabled,
        }
    }

    fn should_sample() -> bool {
        std::env::var("PROFILE_SAMPLE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .map(|p| {
                if p >= 1.0 {
                    true
                } else if p <= 0.0 {
                    false
                } else {
                    let seq = PROFILE_SEQ.fetch_add(1, Ordering::SeqCst);
                    let bucket = (seq % 10_000) as f64 / 10_000.0;
                    bucket < p
                }
            })
            .unwrap_or(true)
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = self.context.take().unwrap_or_default();
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Refresh counters for periodic summaries
// =============================================================================

static AGGREGATOR: OnceLock<Mutex<RefreshAggregator>> = OnceLock::new();

fn get_aggregator() -> &'static Mutex<RefreshAggregator> {
    AGGREGATOR.get_or_init(|| Mutex::new(RefreshAggregator::new()))
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    recomputes: u64,
    reuses: u64,
    reloads: u64,
    guards: u64,
    failures: u64,
}

struct RefreshAggregator {
    window: Counts,
    total: Counts,
    last_flush: Instant,
    flush_interval_secs: u64,
}

impl RefreshAggregator {
    fn new() -> Self {
        Self {
            window: Counts::default(),
            total: Counts::default(),
            last_flush: Instant::now(),
            flush_interval_secs: std::env::var("LOG_FLUSH_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        }
    }

    fn increment(&mut self, event: &str) {
        for c in [&mut self.window, &mut self.total] {
            match event {
                "recompute" => c.recomputes += 1,
                "reuse" => c.reuses += 1,
                "reload" => c.reloads += 1,
                "guard" => c.guards += 1,
                "failure" => c.failures += 1,
                _ => {}
            }
        }
    }

    fn maybe_flush(&mut self) -> Option<Counts> {
        if self.last_flush.elapsed().as_secs() >= self.flush_interval_secs {
            let result = self.window;
            self.window = Counts::default();
            self.last_flush = Instant::now();
            Some(result)
        } else {
            None
        }
    }
}

/// Call periodically to emit aggregated refresh counts
pub fn tick_aggregator() {
    if let Ok(mut agg) = get_aggregator().lock() {
        if let Some(c) = agg.maybe_flush() {
            log(
                Level::Info,
                Domain::System,
                "metrics.refresh_counts",
                obj(&[
                    ("recomputes", json!(c.recomputes)),
                    ("reuses", json!(c.reuses)),
                    ("reloads", json!(c.reloads)),
                    ("guards", json!(c.guards)),
                    ("failures", json!(c.failures)),
                ]),
            );
        }
    }
}

/// Increment a refresh counter ("recompute", "reuse", "reload", "guard", "failure")
pub fn agg_increment(event: &str) {
    if let Ok(mut agg) = get_aggregator().lock() {
        agg.increment(event);
    }
}

fn aggregator_totals() -> (u64, u64, u64, u64, u64) {
    match get_aggregator().lock() {
        Ok(agg) => {
            let t = agg.total;
            (t.recomputes, t.reuses, t.reloads, t.guards, t.failures)
        }
        Err(_) => (0, 0, 0, 0, 0),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_split_fields_promotes_routing_keys() {
        let (top, data) = split_fields(obj(&[
            ("panel", json!(2)),
            ("artifact", v_str("logs.2")),
            ("rows", json!(5)),
        ]));
        assert_eq!(top.get("panel").unwrap(), 2);
        assert_eq!(top.get("artifact").unwrap(), "logs.2");
        assert_eq!(data.get("rows").unwrap(), 5);
        assert!(data.get("panel").is_none());
    }

    #[test]
    fn test_aggregator_counts_window_and_total() {
        let mut agg = RefreshAggregator::new();
        agg.flush_interval_secs = 0;
        agg.increment("recompute");
        agg.increment("reuse");
        agg.increment("reuse");
        agg.increment("unknown");
        let window = agg.maybe_flush().unwrap();
        assert_eq!(window.recomputes, 1);
        assert_eq!(window.reuses, 2);
        assert_eq!(agg.window.reuses, 0);
        assert_eq!(agg.total.reuses, 2);
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }
}
