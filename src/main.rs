use std::fs::File;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Parser;
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{DisableFocusChange, EnableFocusChange};
use ratatui::crossterm::execute;
use tracing::{error, info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod dashboard;
mod domain;
mod export;
mod filter;
mod inputter;
mod model;
mod record;
mod render;
mod scheduler;
mod schema;
mod settings;
mod source;
mod table;
mod toast;
mod ui;

use controller::Controller;
use dashboard::TabId;
use domain::{DEFAULT_DATE_FORMAT, DashConfig, DashError, Message};
use model::{Model, Status};
use source::{JsonDirSource, Loader, OfflineSource, RecordSource};
use ui::DashboardUI;

/// Admin dashboard for the spatial showroom platform.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory holding `<resource>.json` files (e.g. `api/admin/users.json`).
    /// Without it the dashboard shows sample data.
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Where `e` writes export snapshots
    #[arg(short, long, default_value = ".")]
    export_dir: String,

    #[arg(long, default_value = "showroom-admin.log")]
    log_file: String,

    /// Seconds between automatic refreshes of the active tab (0 disables, at most 3600)
    #[arg(short, long, default_value_t = 30)]
    refresh: u64,

    /// Event poll time in ms
    #[arg(long, default_value_t = 100)]
    poll: u64,

    /// strftime format for date columns
    #[arg(long, default_value = DEFAULT_DATE_FORMAT)]
    date_format: String,

    #[arg(short, long, value_enum, default_value_t = TabId::Overview)]
    tab: TabId,

    /// Seconds a notification stays on screen (at most 600)
    #[arg(long, default_value_t = 4)]
    toast_secs: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = expand(&args.log_file).and_then(|path| init_logging(&path)) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand(path: &str) -> Result<PathBuf, DashError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| DashError::Config(e.to_string()))
}

fn init_logging(path: &Path) -> Result<(), DashError> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| DashError::Config(e.to_string()))
}

fn run(args: Args) -> Result<(), DashError> {
    info!("Starting showroom-admin with {args:?}");

    let data_dir = args.data_dir.as_deref().map(expand).transpose()?;
    let cfg = DashConfig::default()
        .event_poll_time(args.poll)
        .data_dir(data_dir)
        .export_dir(expand(&args.export_dir)?)
        .date_format(args.date_format)
        .refresh_interval(Duration::from_secs(args.refresh))
        .toast_duration(Duration::from_secs(args.toast_secs))
        .initial_tab(args.tab);

    let source: Arc<dyn RecordSource> = match &cfg.data_dir {
        Some(dir) => Arc::new(JsonDirSource::new(dir.clone())),
        None => {
            warn!("No data dir given, running offline");
            Arc::new(OfflineSource)
        }
    };
    let loader = Loader::new(source);

    // Validates the config before the terminal is touched.
    let mut model = Model::init(&cfg)?;
    let mut ui = DashboardUI::new();
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    if let Err(e) = execute!(stdout(), EnableFocusChange) {
        ratatui::restore();
        return Err(e.into());
    }

    let result = event_loop(&mut terminal, &mut model, &mut ui, &controller, &loader);

    model.shutdown();
    if let Err(e) = execute!(stdout(), DisableFocusChange) {
        warn!("Can not disable focus reporting: {e}");
    }
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &mut DashboardUI,
    controller: &Controller,
    loader: &Loader,
) -> Result<(), DashError> {
    let size = terminal.size()?;
    model.update(Some(Message::Resize(size.width as usize, size.height as usize)))?;

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;

        for result in loader.drain() {
            model.update(Some(Message::Loaded(result)))?;
        }
        model.tick(Instant::now());
        for request in model.take_loads() {
            loader.request(request);
        }
    }
    info!("Bye");
    Ok(())
}
