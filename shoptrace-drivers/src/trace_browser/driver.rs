use crate::trace_browser::{behavioral::BehavioralEngine, page::WebDriverPage};
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use shoptrace_common::Result;
use std::collections::HashMap;
use tracing::info;
use webdriver::capabilities::Capabilities;

/// Where and how to start the browser session.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: true,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

impl DriverSettings {
    /// Chrome command-line switches for these settings.
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--window-size={},{}", self.window_width, self.window_height),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
        ];
        if self.headless {
            args.push("--headless".to_string());
            args.push("--disable-gpu".to_string());
        }
        args
    }

    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::new();
        let mut chrome_opts = HashMap::new();
        chrome_opts.insert("args".to_string(), json!(self.chrome_args()));
        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));
        caps
    }
}

/// Thin wrapper around a `fantoccini` WebDriver client.
pub struct TraceDriver {
    pub client: Client,
    pub behavioral_engine: BehavioralEngine,
}

impl TraceDriver {
    /// Connect to a running WebDriver service (Chromedriver by default).
    pub async fn connect(settings: &DriverSettings, behavioral_engine: BehavioralEngine) -> Result<Self> {
        let client = ClientBuilder::native()
            .capabilities(settings.capabilities())
            .connect(&settings.webdriver_url)
            .await
            .map_err(anyhow::Error::from)?;
        info!(
            target: "browser.driver",
            url = %settings.webdriver_url,
            headless = settings.headless,
            "webdriver session started"
        );

        Ok(Self {
            client,
            behavioral_engine,
        })
    }

    /// Navigate to `url` and return the page.
    pub async fn goto(&self, url: &str) -> Result<WebDriverPage> {
        let page = WebDriverPage::new(self.client.clone(), self.behavioral_engine.clone());
        page.goto(url).await?;
        Ok(page)
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await.map_err(anyhow::Error::from)?;
        info!(target: "browser.driver", "webdriver session closed");
        Ok(())
    }
}
