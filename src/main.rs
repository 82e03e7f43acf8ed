//! auscult: terminal-based clinical auscultation recorder.

mod app;
mod capture;
mod chart;
mod commands;
mod config;
mod logging;
mod playback;
mod pressure;
mod records;
mod session;
mod setup;
mod ui;

use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        tracing::error!("Fatal error: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
