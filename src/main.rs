use std::fs::{self, File};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod codec;
mod controller;
mod domain;
mod inputter;
mod model;
mod render;
mod schema;
mod table;
mod transfer;
mod ui;
mod visibility;

use controller::Controller;
use domain::{DeckConfig, DeckError};
use model::{Model, Status, expand_path};
use ui::TableUI;
use visibility::{FileStore, KeyValueStore, MemoryStore};

/// A tui based table viewer with CSV import and export.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV file to load at startup
    file: Option<String>,

    /// File backing the persisted ui state (column visibility)
    #[arg(long)]
    state_file: Option<String>,

    /// Keep ui state in memory only, nothing is persisted
    #[arg(long, conflicts_with = "state_file")]
    ephemeral: bool,

    /// Directory receiving table-data.csv on export
    #[arg(long, default_value = ".")]
    export_dir: String,

    /// Log file, filtered with RUST_LOG (default: info)
    #[arg(long)]
    log_file: Option<String>,

    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run() -> Result<(), DeckError> {
    let args = Args::parse();
    let config = build_config(&args)?;
    init_logging(&config)?;
    info!("Starting datadeck with {config:?}");

    let store: Box<dyn KeyValueStore> = if args.ephemeral {
        Box::new(MemoryStore::new())
    } else {
        Box::new(FileStore::new(&config.store_path))
    };
    let mut model = Model::init(&config, store);
    if let Some(file) = args.file.as_deref() {
        model.import(expand_path(file)?);
    }

    let controller = Controller::new(&config);
    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &controller);
    ratatui::restore();

    info!("Quitting datadeck");
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    controller: &Controller,
) -> Result<(), DeckError> {
    let mut ui = TableUI::new();
    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<DeckConfig, DeckError> {
    let mut config = DeckConfig::default()
        .with_event_poll_time(args.poll_ms)
        .with_export_dir(expand_path(&args.export_dir)?);
    if let Some(path) = args.state_file.as_deref() {
        config = config.with_store_path(expand_path(path)?);
    }
    if let Some(path) = args.log_file.as_deref() {
        config = config.with_log_file(expand_path(path)?);
    }
    Ok(config)
}

// The terminal belongs to the ui, so all logs go to a file.
fn init_logging(config: &DeckConfig) -> Result<(), DeckError> {
    if let Some(dir) = config.log_file.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let file = File::create(&config.log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}
