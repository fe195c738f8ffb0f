//! Logging system demonstration
//!
//! Run with:
//! ```bash
//! cargo run --example logging_demo
//! cargo run --example logging_demo -- json
//! cargo run --example logging_demo -- compact "core_sync=trace"
//! ```

use bridge_traits::time::{ConsoleLogger, LogLevel};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::env;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some(_) => LogFormat::Pretty,
        None => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Debug)
        .with_logger_sink(Arc::new(ConsoleLogger::default()));
    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    if let Err(err) = init_logging(config) {
        eprintln!("Failed to initialize logging: {}", err);
        return;
    }

    info!(format = ?format, "Logging initialized");
    simulate_sync("/music/tabs").await;
}

#[instrument]
async fn simulate_sync(root: &str) {
    info!(root, "Starting sync");
    for (index, file) in ["Wonderwall.gp5", "Creep.pdf", "notes.docx"].iter().enumerate() {
        if file.ends_with(".docx") {
            debug!(file, "Unsupported extension, ignoring");
            continue;
        }
        info!(file, count = index + 1, "Processed file");
    }
    warn!(tab_id = "demo", error = "offline", "Cover fetch failed");
    info!(added = 2, skipped = 0, "Sync finished");
}
