//! Loader for shoptrace configuration with YAML + environment overlays.
//!
//! Sources are merged in the order they are attached; `SHOPTRACE__`-prefixed
//! environment variables always win (`SHOPTRACE__INTERACTION__SETTLE_DELAY_MS=250`
//! maps to `interaction.settle_delay_ms`). String values may reference other
//! environment variables as `${VAR}`; expansion is applied after merging.
//! Every section is optional and falls back to the defaults below.
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "SHOPTRACE";

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TraceConfig {
    #[serde(default, deserialize_with = "lenient_version")]
    pub version: Option<String>,
    #[serde(default)]
    pub webdriver: WebDriverSettings,
    #[serde(default)]
    pub interaction: InteractionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Where and how the WebDriver session is opened.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebDriverSettings {
    pub url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9515".into(),
            headless: true,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// Timing knobs for synthetic pointer interaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    /// Pause after opening or closing a dropdown.
    pub settle_delay_ms: u64,
    /// Milliseconds of pointer travel per pixel of `width + height`.
    pub travel_factor: f64,
    /// Release delay as a multiple of the press delay.
    pub dwell_ratio: f64,
    /// Upper bound on ancestors climbed when locating a popup container.
    pub max_ancestor_depth: usize,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            travel_factor: 2.0,
            dwell_ratio: 1.2,
            max_ancestor_depth: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormatSetting,
    pub emit_stderr: bool,
    pub filter: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormatSetting::Text,
            emit_stderr: false,
            filter: "info".into(),
            dir: None,
        }
    }
}

/// YAML allows `version: 1` and `version: "1"`; both end up as a string.
fn lenient_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Repeatedly expand `$VAR`/`${VAR}` until the string stops changing or the
/// depth cap is hit. Unknown variables are kept verbatim.
fn expand_str(raw: &str) -> String {
    let mut current = raw.to_string();
    for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
        let Ok(next) = shellexpand::env(&current) else {
            break;
        };
        if next == current {
            break;
        }
        current = next.into_owned();
    }
    current
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) if s.contains('$') => *s = expand_str(s),
        Value::Array(items) => items.iter_mut().for_each(expand_env_in_value),
        Value::Object(map) => map.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Per-user config location, e.g. `~/.config/shoptrace/shoptrace.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("shoptrace").join("shoptrace.yaml"))
}

#[derive(Debug, Clone)]
enum Source {
    File { path: PathBuf, required: bool },
    Yaml(String),
}

/// Collects YAML sources in priority order; environment overrides are
/// applied last, when [`TraceConfigLoader::load`] runs.
#[derive(Debug, Clone, Default)]
pub struct TraceConfigLoader {
    sources: Vec<Source>,
}

impl TraceConfigLoader {
    /// No sources yet: loading now yields defaults plus `SHOPTRACE__` overrides.
    ///
    /// ```
    /// use shoptrace_config::TraceConfigLoader;
    ///
    /// let config = TraceConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.interaction.settle_delay_ms, 500);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// A file that must exist; format follows the extension.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.push_file(path.as_ref(), true)
    }

    /// A file that is skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.push_file(path.as_ref(), false)
    }

    /// Inline YAML, layered like a file.
    ///
    /// ```
    /// use shoptrace_config::{LogFormatSetting, TraceConfigLoader};
    ///
    /// let cfg = TraceConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// webdriver:
    ///   url: "http://127.0.0.1:4444"
    /// logging:
    ///   format: json
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.webdriver.url, "http://127.0.0.1:4444");
    /// assert!(cfg.webdriver.headless);
    /// assert_eq!(cfg.logging.format, LogFormatSetting::Json);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.sources.push(Source::Yaml(yaml.to_string()));
        self
    }

    fn push_file(mut self, path: &Path, required: bool) -> Self {
        self.sources.push(Source::File {
            path: path.to_path_buf(),
            required,
        });
        self
    }

    /// Merge every source, apply env overrides, expand `${VAR}` references
    /// and deserialize.
    pub fn load(self) -> Result<TraceConfig, ConfigError> {
        let builder = self
            .sources
            .into_iter()
            .fold(Config::builder(), |builder, source| match source {
                Source::File { path, required } => {
                    builder.add_source(File::from(path.as_path()).required(required))
                }
                Source::Yaml(yaml) => builder.add_source(File::from_str(&yaml, FileFormat::Yaml)),
            });
        let merged = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut raw: Value = merged.try_deserialize()?;
        expand_env_in_value(&mut raw);
        serde_json::from_value(raw).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("SHOP_HOST", Some("grid.local"), || {
            let mut v = json!("http://${SHOP_HOST}:4444");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("http://grid.local:4444"));
        });
    }

    #[test]
    fn expands_nested_sections_only_in_strings() {
        temp_env::with_vars(
            [("GRID_HOST", Some("selenium")), ("LOG_ROOT", Some("/var/log"))],
            || {
                let mut v = json!({
                    "webdriver": { "url": "http://$GRID_HOST:4444", "headless": true },
                    "logging": { "dir": "${LOG_ROOT}/shoptrace" },
                    "args": ["--proxy=${GRID_HOST}", 1280, null],
                });
                expand_env_in_value(&mut v);
                assert_eq!(v["webdriver"]["url"], "http://selenium:4444");
                assert_eq!(v["webdriver"]["headless"], true);
                assert_eq!(v["logging"]["dir"], "/var/log/shoptrace");
                assert_eq!(v["args"], json!(["--proxy=selenium", 1280, null]));
            },
        );
    }

    #[test]
    fn expansion_depth_is_capped() {
        temp_env::with_vars(
            [("PING", Some("${PONG}")), ("PONG", Some("${PING}"))],
            || {
                let mut v = json!("grid=${PING}");
                expand_env_in_value(&mut v);
                let s = v.as_str().unwrap();
                assert!(s.starts_with("grid=${"));
            },
        );
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST}"));
    }

    #[test]
    #[serial]
    fn empty_sources_yield_defaults() {
        let cfg = TraceConfigLoader::new().load().unwrap();
        assert_eq!(cfg.version, None);
        assert_eq!(cfg.webdriver, WebDriverSettings::default());
        assert_eq!(cfg.interaction, InteractionSettings::default());
        assert_eq!(cfg.logging, LoggingSettings::default());
    }

    #[test]
    #[serial]
    fn numeric_version_is_stringified() {
        let cfg = TraceConfigLoader::new()
            .with_yaml_str("version: 2")
            .load()
            .unwrap();
        assert_eq!(cfg.version.as_deref(), Some("2"));
    }

    #[test]
    #[serial]
    fn env_overrides_yaml() {
        temp_env::with_vars(
            [
                ("SHOPTRACE__INTERACTION__SETTLE_DELAY_MS", Some("250")),
                ("SHOPTRACE__WEBDRIVER__HEADLESS", Some("false")),
            ],
            || {
                let cfg = TraceConfigLoader::new()
                    .with_yaml_str("interaction:\n  settle_delay_ms: 800\n")
                    .load()
                    .unwrap();
                assert_eq!(cfg.interaction.settle_delay_ms, 250);
                assert!(!cfg.webdriver.headless);
                assert_eq!(cfg.interaction.dwell_ratio, 1.2);
            },
        );
    }

    #[test]
    #[serial]
    fn missing_optional_file_is_ignored() {
        let cfg = TraceConfigLoader::new()
            .with_optional_file("/definitely/not/here/shoptrace.yaml")
            .load()
            .unwrap();
        assert_eq!(cfg.webdriver.url, "http://localhost:9515");
    }
}
