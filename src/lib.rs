pub mod cancel;
pub mod cli;
pub mod coerce;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod filter;
pub mod header;
pub mod io_utils;
pub mod mapping;
pub mod process;
pub mod remote;
pub mod retry;
pub mod sync;
pub mod table;
pub mod upload;
pub mod worker;

use std::{env, sync::Arc, sync::OnceLock, time::Duration};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cancel::CancelToken,
    cli::{Cli, Commands, InputArgs, ModeArgs, RemoteArgs},
    config::Settings,
    events::{EventSink, SyncEvent},
    io_utils::ReadOptions,
    process::ProcessOptions,
    remote::{SmartsheetClient, extract_sheet_id},
    retry::RetryPolicy,
    table::PreviewLayout,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("stock_sync", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&settings_path)
        .with_context(|| format!("Loading settings from {settings_path:?}"))?;
    debug!("Settings loaded from {settings_path:?}");

    let result = match &cli.command {
        Commands::Analyze(args) => handle_analyze(args, &mut settings),
        Commands::Preview(args) => handle_preview(args, &mut settings),
        Commands::Connect(args) => handle_connect(args, &mut settings),
        Commands::Upload(args) => upload::execute(args, &mut settings),
    };

    if let Err(err) = settings.save(&settings_path) {
        warn!("Could not save settings: {err}");
    }
    result
}

fn handle_analyze(args: &cli::AnalyzeArgs, settings: &mut Settings) -> Result<()> {
    let read = read_options(&args.input)?;
    settings.remember_input(&args.input.input);
    info!(
        "Analyzing '{}' with delimiter '{}'",
        args.input.input.display(),
        printable_delimiter(io_utils::resolve_input_delimiter(&args.input.input, read.delimiter))
    );
    let input = args.input.input.clone();
    let analysis = run_in_worker("analyze", move |sink, _cancel| {
        process::analyze(&input, &read, &sink)
    })?
    .with_context(|| format!("Analyzing {:?}", args.input.input))?;

    println!("Rows: {}", analysis.rows);
    println!("Columns: {}", analysis.columns);
    println!(
        "Header rows: {}",
        if analysis.dual_header { "dual" } else { "single" }
    );
    if analysis.indicators.is_empty() {
        println!("Inventory columns: none detected");
    } else {
        println!("Inventory columns: {}", analysis.indicators.join(", "));
    }
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs, settings: &mut Settings) -> Result<()> {
    let options = process_options(&args.input, &args.modes, settings)?;
    settings.remember_input(&args.input.input);
    let input = args.input.input.clone();
    let table = run_in_worker("preview", move |sink, _cancel| {
        process::process_file(&input, &options, &sink)
    })?
    .with_context(|| format!("Processing {:?}", args.input.input))?;

    if table.is_empty() {
        warn!("No data to preview");
    }
    let layout = PreviewLayout {
        rows: args.rows,
        max_columns: args.max_columns,
        ..PreviewLayout::default()
    };
    print!("{}", table::render_preview(&table, &layout));
    Ok(())
}

fn handle_connect(args: &cli::ConnectArgs, settings: &mut Settings) -> Result<()> {
    let client = connect_client(&args.remote, settings)?;
    let sheet_id = client.sheet_id().to_string();
    info!("Connecting to sheet ID: {sheet_id}");
    let remote: Arc<dyn remote::RemoteTable> = Arc::new(client);
    let retry = RetryPolicy::default();
    let schema = run_in_worker("connect", move |sink, cancel| {
        sync::fetch_schema(remote.as_ref(), &retry, &sink, &cancel)
    })?
    .with_context(|| format!("Connecting to sheet {sheet_id}"))?;

    println!("Sheet: {}", schema.sheet_name);
    println!("Columns: {}", schema.columns.len());
    println!("Column titles: {}", schema.titles().join(", "));
    println!("Current rows: {}", schema.total_row_count);
    Ok(())
}

/// Runs `task` on a worker thread and drains its events until it finishes.
/// Log events are already mirrored into the process log by the sink, so
/// only stage progress is reported here.
pub(crate) fn run_in_worker<T, F>(name: &str, task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(EventSink, CancelToken) -> T + Send + 'static,
{
    let handle = worker::spawn_task(name, task)
        .with_context(|| format!("Starting {name} worker"))?;
    for event in handle.events.iter() {
        report_progress(&event);
    }
    handle
        .join()
        .map_err(|_| anyhow!("{name} worker panicked"))
}

pub(crate) fn report_progress(event: &SyncEvent) {
    if let SyncEvent::Progress { status, percent } = event {
        info!("[{percent:>5.1}%] {status}");
    }
}

pub(crate) fn read_options(input: &InputArgs) -> Result<ReadOptions> {
    Ok(ReadOptions {
        delimiter: input.delimiter,
        encoding: io_utils::resolve_encoding(input.input_encoding.as_deref())?,
    })
}

/// Resolves the processing toggles from flags, falling back to (and
/// updating) the stored settings.
pub(crate) fn process_options(
    input: &InputArgs,
    modes: &ModeArgs,
    settings: &mut Settings,
) -> Result<ProcessOptions> {
    if let Some(verbatim) = modes.verbatim() {
        settings.verbatim_copy = verbatim;
    }
    if let Some(mapping) = modes.mapping() {
        settings.column_mapping = mapping;
    }
    Ok(ProcessOptions {
        verbatim: settings.verbatim_copy,
        column_mapping: settings.column_mapping,
        read: read_options(input)?,
    })
}

pub(crate) fn connect_client(
    args: &RemoteArgs,
    settings: &mut Settings,
) -> Result<SmartsheetClient> {
    let token = args
        .token
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| settings.api_token.clone())
        .ok_or_else(|| {
            anyhow!("An API access token is required (use --token or SMARTSHEET_ACCESS_TOKEN)")
        })?;
    let sheet = args
        .sheet
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| settings.sheet_url.clone())
        .ok_or_else(|| anyhow!("A sheet URL or id is required (use --sheet)"))?;
    let sheet_id = extract_sheet_id(&sheet)
        .ok_or_else(|| anyhow!("Could not extract a sheet id from '{sheet}'"))?;

    settings.sheet_url = Some(sheet);
    if args.remember_token {
        settings.api_token = Some(token.trim().to_string());
    }
    SmartsheetClient::new(token.trim(), sheet_id, args.api_base.as_deref())
        .context("Creating API client")
}

pub(crate) fn retry_policy(max_retries: u32, retry_delay_secs: u64) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::from_secs(retry_delay_secs))
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
