//! Process-wide `tracing` setup.
//!
//! Events go to a daily rolling file and, optionally, to stderr, in either
//! human-readable or JSON form. [`init_logging`] installs the subscriber at
//! most once per process; later calls return the path chosen by the first.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::Context;
use chrono::Utc;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

const LOG_DIR_ENV: &str = "SHOPTRACE_LOG_DIR";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Output encoding for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format: {other}"),
        }
    }
}

impl LogFormat {
    fn file_layer(self, writer: NonBlocking) -> BoxedLayer {
        match self {
            LogFormat::Text => Box::new(fmt::layer().with_writer(writer).with_ansi(false)),
            LogFormat::Json => Box::new(fmt::layer().json().with_writer(writer)),
        }
    }

    fn stderr_layer(self) -> BoxedLayer {
        match self {
            LogFormat::Text => Box::new(fmt::layer().with_writer(std::io::stderr)),
            LogFormat::Json => Box::new(fmt::layer().json().with_writer(std::io::stderr)),
        }
    }
}

/// Configuration passed to [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Component name; the log file is `<app_name>.log.<date>`.
    pub app_name: &'static str,
    /// Explicit log directory. Falls back to `SHOPTRACE_LOG_DIR`, then
    /// `~/.local/share/<app_name>`.
    pub log_dir: Option<PathBuf>,
    /// Mirror events to stderr.
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "shoptrace",
            log_dir: None,
            emit_stderr: false,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
        }
    }
}

impl LogConfig {
    fn file_name(&self) -> String {
        format!("{}.log", self.app_name)
    }

    fn directory(&self) -> PathBuf {
        match (&self.log_dir, std::env::var_os(LOG_DIR_ENV)) {
            (Some(dir), _) => expand_home(dir),
            (None, Some(env_dir)) => expand_home(Path::new(&env_dir)),
            (None, None) => home_dir()
                .map(|home| home.join(".local/share").join(self.app_name))
                .unwrap_or_else(|| PathBuf::from(".").join(self.app_name)),
        }
    }
}

/// Install the global subscriber and return today's log file path.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = LOG_PATH.get() {
        return Ok(path.clone());
    }

    let dir = config.directory();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let file_name = config.file_name();
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&dir, &file_name));
    let _ = LOG_GUARD.set(guard);

    let mut layers = vec![config.format.file_layer(writer)];
    if config.emit_stderr {
        layers.push(config.format.stderr_layer());
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let path = daily_log_path(&dir, &file_name);
    Ok(LOG_PATH.get_or_init(|| path).clone())
}

/// The daily roller appends the UTC date to the base file name.
fn daily_log_path(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(format!("{file_name}.{}", Utc::now().format("%Y-%m-%d")))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
