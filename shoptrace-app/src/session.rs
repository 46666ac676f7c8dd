use anyhow::Result;
use serde::Serialize;
use serde_json::{Value, json};
use shoptrace_common::observability::{LogConfig, LogFormat};
use shoptrace_config::{InteractionSettings, LogFormatSetting, LoggingSettings, TraceConfig, WebDriverSettings};
use shoptrace_drivers::trace_browser::driver::{DriverSettings, TraceDriver};
use shoptrace_drivers::trace_browser::page::WebDriverPage;
use shoptrace_drivers::{BehavioralEngine, InteractionHelpers, InteractionTiming, Rect, Renderer};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::Command;

pub fn log_config(cfg: &LoggingSettings) -> LogConfig {
    LogConfig {
        app_name: "shoptrace",
        log_dir: cfg.dir.clone(),
        emit_stderr: cfg.emit_stderr,
        format: match cfg.format {
            LogFormatSetting::Text => LogFormat::Text,
            LogFormatSetting::Json => LogFormat::Json,
        },
        default_filter: cfg.filter.clone(),
    }
}

pub fn driver_settings(cfg: &WebDriverSettings) -> DriverSettings {
    DriverSettings {
        webdriver_url: cfg.url.clone(),
        headless: cfg.headless,
        window_width: cfg.window_width,
        window_height: cfg.window_height,
    }
}

pub fn interaction_timing(cfg: &InteractionSettings) -> InteractionTiming {
    InteractionTiming {
        settle_delay: Duration::from_millis(cfg.settle_delay_ms),
        travel_factor: cfg.travel_factor,
        dwell_ratio: cfg.dwell_ratio,
        max_ancestor_depth: cfg.max_ancestor_depth,
    }
}

/// One gathered clickable, as printed by `clickables`.
#[derive(Debug, Serialize)]
pub struct Clickable {
    pub tag: String,
    pub rect: Rect,
    pub text: String,
}

/// Run a command against any renderer and return its JSON result.
pub async fn execute<R: Renderer>(helpers: &InteractionHelpers<R>, command: &Command) -> Result<Value> {
    let value = match command {
        Command::ComboValues { rect } => {
            serde_json::to_value(helpers.extract_combo_values((*rect).into()).await?)?
        }
        Command::SelectCombo { rect, text } => {
            let selected = helpers.select_combobox_value((*rect).into(), text).await?;
            json!({ "text": text, "selected": selected })
        }
        Command::Clickables => {
            let renderer = helpers.renderer();
            let mut out = Vec::new();
            for element in helpers.gather_click_elements(None, None).await? {
                out.push(Clickable {
                    tag: renderer.tag_name(&element).await?.to_ascii_lowercase(),
                    rect: renderer.bounding_rect(&element).await?,
                    text: renderer.text_content(&element).await?.trim().to_string(),
                });
            }
            serde_json::to_value(out)?
        }
        Command::Controls => serde_json::to_value(helpers.extract_controls().await?)?,
    };
    Ok(value)
}

/// A browser session bound to one page.
pub struct Session {
    driver: TraceDriver,
    helpers: InteractionHelpers<WebDriverPage>,
}

impl Session {
    /// Connect, open `url`, and tie scheduled clicks to `shutdown`.
    pub async fn open(cfg: &TraceConfig, url: &str, shutdown: &CancellationToken) -> Result<Self> {
        let engine = BehavioralEngine::with_parent(interaction_timing(&cfg.interaction), shutdown);
        let driver = TraceDriver::connect(&driver_settings(&cfg.webdriver), engine.clone()).await?;
        let page = match driver.goto(url).await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = driver.close().await {
                    warn!(error = %close_err, "failed to close session after navigation error");
                }
                return Err(e.into());
            }
        };
        info!(%url, "session opened");

        Ok(Self {
            driver,
            helpers: InteractionHelpers::with_engine(Arc::new(page), engine),
        })
    }

    pub async fn run(&self, command: &Command) -> Result<Value> {
        execute(&self.helpers, command).await
    }

    pub async fn close(self) -> Result<()> {
        self.helpers.cancel_pending();
        self.driver.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::RectArgs;
    use shoptrace_drivers::trace_browser::memory::{MemoryPage, NodeSpec};

    fn rect_args(r: Rect) -> RectArgs {
        RectArgs {
            left: r.left,
            top: r.top,
            width: r.width,
            height: r.height,
        }
    }

    #[test]
    fn config_maps_onto_driver_types() {
        let cfg = TraceConfig::default();
        let timing = interaction_timing(&cfg.interaction);
        assert_eq!(timing, InteractionTiming::default());

        let settings = driver_settings(&cfg.webdriver);
        assert_eq!(settings, DriverSettings::default());

        let logging = log_config(&LoggingSettings {
            format: LogFormatSetting::Json,
            filter: "debug".into(),
            ..LoggingSettings::default()
        });
        assert_eq!(logging.format, LogFormat::Json);
        assert_eq!(logging.default_filter, "debug");
        assert_eq!(logging.app_name, "shoptrace");
    }

    #[tokio::test(start_paused = true)]
    async fn commands_render_json() {
        let page = Arc::new(MemoryPage::default());
        let body = page.append(page.root(), NodeSpec::element("body").rect(0.0, 0.0, 1280.0, 800.0));
        let rect = Rect::new(10.0, 10.0, 120.0, 24.0);
        page.append_select(body, rect, &[("1", "One"), ("2", "Two")]);
        page.append(
            body,
            NodeSpec::element("button").onclick().rect(10.0, 50.0, 80.0, 24.0).text(" Buy "),
        );
        let helpers = InteractionHelpers::new(page, InteractionTiming::default());

        let values = execute(&helpers, &Command::ComboValues { rect: rect_args(rect) })
            .await
            .unwrap();
        assert_eq!(values, json!(["One", "Two"]));

        let selected = execute(
            &helpers,
            &Command::SelectCombo {
                rect: rect_args(rect),
                text: "Two".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(selected, json!({ "text": "Two", "selected": true }));

        let clickables = execute(&helpers, &Command::Clickables).await.unwrap();
        assert_eq!(clickables[0]["tag"], "button");
        assert_eq!(clickables[0]["text"], "Buy");
        assert_eq!(clickables[0]["rect"]["left"], 10.0);

        let controls = execute(&helpers, &Command::Controls).await.unwrap();
        let kinds: Vec<_> = controls
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["kind"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, vec!["select", "button"]);
    }
}
