mod backend_bridge;
mod controller;
mod ui;

use std::path::PathBuf;

use clap::Parser;
use client_core::{BackendKind, LaunchOptions};
use eframe::egui;
use tracing_subscriber::EnvFilter;

use crate::{
    backend_bridge::{commands::BackendCommand, runtime},
    controller::events::UiEvent,
    ui::CrmApp,
};

#[derive(Parser, Debug)]
#[command(name = "crm-gui", about = "Desktop window for the shared customer list")]
struct Args {
    /// `memory` or `firebase`.
    #[arg(long, default_value = "memory")]
    backend: BackendKind,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Session database URL or path, overriding the settings.
    #[arg(long)]
    session_db: Option<String>,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();
    let launch = LaunchOptions {
        backend: args.backend,
        config_path: args.config,
        session_db: args.session_db,
    };

    let (cmd_tx, cmd_rx) = tokio::sync::mpsc::channel::<BackendCommand>(64);
    let (ui_tx, ui_rx) = crossbeam_channel::bounded::<UiEvent>(256);
    let worker = runtime::launch(launch, cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Simple CRM")
            .with_inner_size([720.0, 560.0])
            .with_min_inner_size([420.0, 420.0]),
        ..Default::default()
    };
    let result = eframe::run_native(
        "Simple CRM",
        options,
        Box::new(|_cc| Ok(Box::new(CrmApp::new(cmd_tx, ui_rx)))),
    );

    // The app (and its command sender) is gone once run_native returns, so
    // the worker shuts the controller down and exits.
    if worker.join().is_err() {
        tracing::error!("backend worker panicked");
    }
    result
}
