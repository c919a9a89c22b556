//! callring - incoming call popup for the Recar desktop shell
//!
//! The injected client script streams dispatcher events and store snapshots
//! to this process over stdin. When the local user starts being rung, a
//! call popup is shown; answering or declining is reported back on stdout.

mod app;
mod bridge;
mod config;
mod error;
mod model;
mod popup;
mod protocol;
mod ring;
mod stores;

use anyhow::Result;
use log::{info, LevelFilter};
use std::sync::Arc;

use crate::app::Application;
use crate::config::{Config, PopupBackend};

fn main() -> Result<()> {
    // Initialize logging; stdout carries the host protocol, so logs go to stderr
    env_logger::builder()
        .filter_level(LevelFilter::Trace)
        .format_timestamp_millis()
        .parse_default_env()
        .init();
    let level_from_env = std::env::var_os("RUST_LOG").is_some();
    if !level_from_env {
        log::set_max_level(LevelFilter::Info);
    }

    info!("Starting callring v{}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--reset-config") {
        info!("--reset-config flag detected, removing config file");
        Config::reset_at(&Config::config_path())?;
    }

    // Load configuration
    let config = Arc::new(Config::load_or_default()?);
    if !level_from_env {
        log::set_max_level(config.general.level_filter());
    }
    info!("Configuration loaded successfully");

    let mut app = Application::new(config);
    if args.iter().any(|a| a == "--headless") {
        app = app.with_backend(PopupBackend::Headless);
    }
    app.run()?;

    info!("callring shutting down gracefully");
    Ok(())
}
