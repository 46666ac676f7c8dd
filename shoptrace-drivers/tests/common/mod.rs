#![allow(dead_code)]

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use shoptrace_common::observability::{LogConfig, LogFormat};
use shoptrace_drivers::trace_browser::memory::{MemoryPage, NodeId, NodeSpec};
use shoptrace_drivers::{InteractionHelpers, InteractionTiming};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "shoptrace-tests",
            log_dir: Some(std::env::temp_dir().join("shoptrace-tests")),
            emit_stderr: true,
            format: if std::env::var("SHOPTRACE_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug".to_string(),
        };

        shoptrace_common::observability::init_logging(config).unwrap_or_default()
    });
}

pub fn helpers(page: &Arc<MemoryPage>) -> InteractionHelpers<MemoryPage> {
    InteractionHelpers::new(Arc::clone(page), InteractionTiming::default())
}

pub fn body(page: &MemoryPage) -> NodeId {
    page.append(
        page.root(),
        NodeSpec::element("body").rect(0.0, 0.0, 1280.0, 800.0),
    )
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
