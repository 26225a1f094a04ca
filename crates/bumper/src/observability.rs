//! Logging setup.
//!
//! Two sinks are installed:
//! - a JSONL file (one object per event, span fields included) for later
//!   inspection
//! - a compact human-readable stream on stderr, so warnings such as skipped
//!   annotations reach the operator
//!
//! Nothing here writes to stdout; it carries command output only.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::Event;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "BUMPER_LOG_PATH";
const ENV_LOG_DIR: &str = "BUMPER_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where and how to log.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// Name used for the log file.
    pub service: String,
    /// Directory for JSONL log files from configuration.
    pub log_dir: Option<PathBuf>,
    /// Whether stderr output may use ANSI colors.
    pub ansi: bool,
}

impl ObservabilityConfig {
    /// Logging config for this binary.
    pub fn new(log_dir: Option<PathBuf>, ansi: bool) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
            ansi,
        }
    }
}

/// Keeps the background log writer alive. Hold it until exit.
pub struct ObservabilityGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    file_filter: EnvFilter,
    stderr_level: LevelFilter,
) -> Result<ObservabilityGuard> {
    let (file_writer, file_guard) = match open_log_file(&cfg.service, cfg.log_dir.as_deref()) {
        Ok(appender) => tracing_appender::non_blocking(appender),
        Err(err) => {
            eprintln!("warning: {err}; JSON logs go to stderr");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    let file_layer = JsonLines::new(file_writer).with_filter(file_filter);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg.ansi)
        .with_target(false)
        .without_time()
        .compact()
        .with_filter(stderr_level);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    tracing::debug!(service = %cfg.service, "logging initialized");
    Ok(ObservabilityGuard {
        _file_guard: file_guard,
    })
}

/// Filter for the JSONL file.
///
/// `-q` wins, then `-v`/`-vv`, then `RUST_LOG`, then the configured level.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
        }
        (false, 1) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    }
}

/// Level shown on stderr: warnings by default.
pub const fn stderr_level(quiet: bool, verbose: u8) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    }
}

// ----------------------------------------------------------------------------
// JSONL layer
// ----------------------------------------------------------------------------

struct JsonLines<W> {
    writer: W,
}

impl<W> JsonLines<W> {
    const fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[derive(Clone, Debug, Default)]
struct SpanFields(Map<String, Value>);

impl<S, W> Layer<S> for JsonLines<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldCollector::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(SpanFields(fields.0));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldCollector::default();
        values.record(&mut fields);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(existing) => existing.0.extend(fields.0),
            None => extensions.insert(SpanFields(fields.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        let mut line = Map::new();
        line.insert("timestamp".into(), Value::String(rfc3339_now()));
        line.insert(
            "level".into(),
            Value::String(meta.level().as_str().to_ascii_lowercase()),
        );
        line.insert("target".into(), Value::String(meta.target().to_string()));

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    line.extend(fields.0.clone());
                }
            }
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        line.extend(fields.0);

        let mut writer = self.writer.make_writer();
        if serde_json::to_writer(&mut writer, &Value::Object(line)).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

#[derive(Default)]
struct FieldCollector(Map<String, Value>);

impl FieldCollector {
    fn put(&mut self, field: &tracing::field::Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl tracing::field::Visit for FieldCollector {
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(number));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
fn rfc3339_now() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(now.as_secs(), now.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    let rem = secs % 86_400;
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60,
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date (Hinnant's algorithm).
const fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe as i64 + era * 400 + if month <= 2 { 1 } else { 0 };
    (year as i32, month, day)
}

// ----------------------------------------------------------------------------
// Log file resolution
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogFile {
    dir: PathBuf,
    name: String,
}

fn open_log_file(
    service: &str,
    config_dir: Option<&Path>,
) -> Result<tracing_appender::rolling::RollingFileAppender> {
    let file = resolve_log_file(
        service,
        std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
        std::env::var_os(ENV_LOG_DIR).map(PathBuf::from),
        config_dir.map(Path::to_path_buf),
    )
    .map_err(anyhow::Error::msg)?;
    Ok(tracing_appender::rolling::daily(&file.dir, &file.name))
}

/// Pick the log file: explicit path, then env dir, then configured dir,
/// then the platform data dir, then the current directory.
fn resolve_log_file(
    service: &str,
    path_override: Option<PathBuf>,
    dir_override: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Result<LogFile, String> {
    if let Some(path) = path_override {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("{ENV_LOG_PATH} must end in a UTF-8 file name"))?
            .to_string();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        return writable(LogFile { dir, name });
    }

    let name = format!("{service}{LOG_FILE_SUFFIX}");
    if let Some(dir) = dir_override.or(config_dir) {
        return writable(LogFile { dir, name });
    }

    let mut candidates = Vec::new();
    if let Some(dirs) = directories::ProjectDirs::from("", "", service) {
        candidates.push(dirs.data_local_dir().join("logs"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }

    candidates
        .into_iter()
        .find_map(|dir| {
            writable(LogFile {
                dir,
                name: name.clone(),
            })
            .ok()
        })
        .ok_or_else(|| "no writable log directory found".to_string())
}

fn writable(file: LogFile) -> Result<LogFile, String> {
    std::fs::create_dir_all(&file.dir)
        .map_err(|e| format!("cannot create log directory {}: {e}", file.dir.display()))?;
    let path = file.dir.join(&file.name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("cannot open log file {}: {e}", path.display()))?;
    Ok(file)
}
