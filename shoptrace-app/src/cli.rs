use clap::{Args, Parser, Subcommand};
use shoptrace_config::TraceConfig;
use shoptrace_drivers::Rect;
use std::path::PathBuf;

/// Drive combo boxes and enumerate interactive elements on a live page.
#[derive(Debug, Parser)]
#[command(name = "shoptrace", version)]
pub struct Cli {
    /// YAML config file; defaults to the per-user config when present.
    #[arg(long, env = "SHOPTRACE_CONFIG")]
    pub config: Option<PathBuf>,

    /// WebDriver endpoint, overriding `webdriver.url`.
    #[arg(long)]
    pub webdriver: Option<String>,

    /// Force a headless browser regardless of config.
    #[arg(long)]
    pub headless: bool,

    /// Page to open before running the command.
    pub url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Args)]
pub struct RectArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub left: f64,
    #[arg(long, allow_negative_numbers = true)]
    pub top: f64,
    #[arg(long)]
    pub width: f64,
    #[arg(long)]
    pub height: f64,
}

impl From<RectArgs> for Rect {
    fn from(r: RectArgs) -> Self {
        Rect::new(r.left, r.top, r.width, r.height)
    }
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Print the option labels of the combo box at the rectangle.
    ComboValues {
        #[command(flatten)]
        rect: RectArgs,
    },
    /// Select the option labelled exactly `--text`.
    SelectCombo {
        #[command(flatten)]
        rect: RectArgs,
        #[arg(long)]
        text: String,
    },
    /// List elements with click handlers or a pointer cursor.
    Clickables,
    /// List every visible control.
    Controls,
}

impl Cli {
    /// Command-line flags win over file and environment settings.
    pub fn apply_overrides(&self, cfg: &mut TraceConfig) {
        if let Some(url) = &self.webdriver {
            cfg.webdriver.url = url.clone();
        }
        if self.headless {
            cfg.webdriver.headless = true;
        }
    }
}
