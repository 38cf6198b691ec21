use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

use nigeria_geodata::async_grid3::{AsyncGrid3, WorkerRuntime};
use nigeria_geodata::boundary::StateBoundaries;
use nigeria_geodata::config::ConfigLoader;
use nigeria_geodata::domain::{
    DataSource, FilterArgs, OutputFormat, ServiceSummary, ensure_single_filter, parse_coordinates,
};
use nigeria_geodata::error::GeodataError;
use nigeria_geodata::grid3::{DefaultGrid3, FilterOutput};
use nigeria_geodata::http::ReqwestGateway;
use nigeria_geodata::metadata::LayerMetadata;
use nigeria_geodata::output::{
    JsonOutput, LogSink, OutputMode, ProgressEvent, ProgressSink, TextOutput,
};
use nigeria_geodata::preview::{GeoJsonPreview, PreviewHandle, write_geojson};
use nigeria_geodata::tui::{ProgressSinkKind, Tui};

type DefaultAsyncGrid3 =
    AsyncGrid3<ReqwestGateway, StateBoundaries<ReqwestGateway>, GeoJsonPreview>;

#[derive(Parser)]
#[command(name = "ngeo")]
#[command(about = "Discover and spatially filter Nigerian geospatial datasets")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Query the GRID3 catalog")]
    Grid3(SourceArgs),
    #[command(about = "Query the GRID3 catalog on a background worker pool")]
    AsyncGrid3(SourceArgs),
    #[command(about = "List supported data sources")]
    Sources,
}

#[derive(Args)]
struct SourceArgs {
    #[command(subcommand)]
    command: SourceCommand,
}

#[derive(Subcommand)]
enum SourceCommand {
    #[command(about = "List every Nigerian dataset in the catalog")]
    ListData(TableArgs),
    #[command(about = "Search dataset names (case-insensitive substring)")]
    Search(SearchArgs),
    #[command(about = "Show layer metadata for a dataset")]
    Info(InfoArgs),
    #[command(about = "Fetch the features of a dataset that intersect a region")]
    Filter(FilterCommandArgs),
}

#[derive(Args, Clone, Copy)]
struct TableArgs {
    #[arg(long, overrides_with = "no_table")]
    table: bool,

    #[arg(long, overrides_with = "table")]
    no_table: bool,
}

impl TableArgs {
    fn enabled(self) -> bool {
        self.table || !self.no_table
    }
}

#[derive(Args)]
struct SearchArgs {
    #[arg(long, short)]
    query: String,

    #[command(flatten)]
    table: TableArgs,
}

#[derive(Args)]
struct InfoArgs {
    #[arg(long = "data-name")]
    data_name: String,

    #[command(flatten)]
    table: TableArgs,
}

#[derive(Args)]
struct FilterCommandArgs {
    #[arg(long = "data-name")]
    data_name: String,

    #[arg(long)]
    state: Option<String>,

    #[arg(long, value_name = "MIN_X,MIN_Y,MAX_X,MAX_Y", allow_hyphen_values = true)]
    bbox: Option<String>,

    #[arg(long = "aoi-geometry", value_name = "GEOJSON|FILE")]
    aoi_geometry: Option<String>,

    #[arg(long, conflicts_with = "output")]
    preview: bool,

    #[arg(long)]
    output: Option<Utf8PathBuf>,

    #[command(flatten)]
    table: TableArgs,
}

#[derive(Clone)]
enum Engine {
    Blocking(Arc<DefaultGrid3>),
    Async {
        grid3: DefaultAsyncGrid3,
        runtime: Handle,
    },
}

impl Engine {
    fn list_data(&self) -> Result<Vec<ServiceSummary>, GeodataError> {
        match self {
            Engine::Blocking(grid3) => grid3.list_data(),
            Engine::Async { grid3, runtime } => runtime.block_on(grid3.list_data()),
        }
    }

    fn search(&self, query: &str) -> Result<Vec<ServiceSummary>, GeodataError> {
        match self {
            Engine::Blocking(grid3) => grid3.search(query),
            Engine::Async { grid3, runtime } => runtime.block_on(grid3.search(query)),
        }
    }

    fn info(&self, name: &str) -> Result<LayerMetadata, GeodataError> {
        match self {
            Engine::Blocking(grid3) => grid3.info(name),
            Engine::Async { grid3, runtime } => runtime.block_on(grid3.info(name)),
        }
    }

    fn filter(
        &self,
        name: &str,
        args: FilterArgs,
        format: OutputFormat,
    ) -> Result<FilterOutput, GeodataError> {
        match self {
            Engine::Blocking(grid3) => grid3.filter(name, args, format),
            Engine::Async { grid3, runtime } => runtime.block_on(grid3.filter(name, args, format)),
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<GeodataError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GeodataError) -> u8 {
    match error {
        GeodataError::ConfigRead(_) | GeodataError::ConfigParse(_) => 2,
        error if error.is_user_error() => 2,
        error if error.is_transport_error() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("nigeria_geodata=debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Sources => {
            let sources = DataSource::list_sources();
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_sources(&sources),
                OutputMode::Interactive => TextOutput::print_sources(&sources),
            }
            .into_diagnostic()
        }
        Commands::Grid3(args) => {
            let config = ConfigLoader::resolve(cli.config.as_deref())?;
            let grid3 = Arc::new(DefaultGrid3::from_config(&config)?);
            run_source_command(args.command, Engine::Blocking(grid3), output_mode)
        }
        Commands::AsyncGrid3(args) => {
            let config = ConfigLoader::resolve(cli.config.as_deref())?;
            let grid3 = DefaultGrid3::from_config(&config)?;
            let runtime = WorkerRuntime::new()?;
            let engine = Engine::Async {
                grid3: AsyncGrid3::new(grid3),
                runtime: runtime.handle(),
            };
            run_source_command(args.command, engine, output_mode)
        }
    }
}

fn run_source_command(
    command: SourceCommand,
    engine: Engine,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match command {
        SourceCommand::ListData(table) => run_list(engine, output_mode, table),
        SourceCommand::Search(args) => run_search(args, engine, output_mode),
        SourceCommand::Info(args) => run_info(args, engine, output_mode),
        SourceCommand::Filter(args) => run_filter(args, engine, output_mode),
    }
}

fn execute<F, R>(
    kind: ProgressSinkKind,
    output_mode: OutputMode,
    table: TableArgs,
    job: F,
) -> miette::Result<R>
where
    F: FnOnce(&dyn ProgressSink) -> Result<R, GeodataError> + Send + 'static,
    R: Send + 'static,
{
    match output_mode {
        OutputMode::NonInteractive => Ok(job(&JsonOutput)?),
        OutputMode::Interactive if table.enabled() => Tui::new(kind).run(job),
        OutputMode::Interactive => Ok(job(&LogSink)?),
    }
}

fn run_list(engine: Engine, output_mode: OutputMode, table: TableArgs) -> miette::Result<()> {
    let services = execute(ProgressSinkKind::List, output_mode, table, move |sink| {
        sink.event(ProgressEvent::phase("Resolve", "loading GRID3 catalog"));
        engine.list_data()
    })?;
    show_services("GRID3 datasets", &services, output_mode, table)
}

fn run_search(args: SearchArgs, engine: Engine, output_mode: OutputMode) -> miette::Result<()> {
    let query = args.query.clone();
    let services = execute(ProgressSinkKind::Search, output_mode, args.table, move |sink| {
        sink.event(ProgressEvent::phase("Resolve", format!("searching for '{query}'")));
        engine.search(&query)
    })?;
    let title = format!("Results for '{}'", args.query);
    show_services(&title, &services, output_mode, args.table)
}

fn show_services(
    title: &str,
    services: &[ServiceSummary],
    output_mode: OutputMode,
    table: TableArgs,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_services(services).into_diagnostic(),
        OutputMode::Interactive if table.enabled() => Tui::new(ProgressSinkKind::List)
            .show_services(title, services),
        OutputMode::Interactive => TextOutput::print_services(services).into_diagnostic(),
    }
}

fn run_info(args: InfoArgs, engine: Engine, output_mode: OutputMode) -> miette::Result<()> {
    let name = args.data_name.clone();
    let metadata = execute(ProgressSinkKind::Info, output_mode, args.table, move |sink| {
        sink.event(ProgressEvent::phase("Resolve", format!("reading metadata for {name}")));
        let started = Instant::now();
        let metadata = engine.info(&name)?;
        sink.event(ProgressEvent {
            message: format!("resolved {} features", metadata.total_feature_count),
            elapsed: Some(started.elapsed()),
        });
        Ok(metadata)
    })?;

    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_info(&metadata).into_diagnostic(),
        OutputMode::Interactive if args.table.enabled() => {
            Tui::new(ProgressSinkKind::Info).show_info(&metadata)
        }
        OutputMode::Interactive => TextOutput::print_info(&metadata).into_diagnostic(),
    }
}

fn run_filter(
    args: FilterCommandArgs,
    engine: Engine,
    output_mode: OutputMode,
) -> miette::Result<()> {
    ensure_single_filter(
        args.state.is_some(),
        args.bbox.is_some(),
        args.aoi_geometry.is_some(),
    )?;
    let filter_args = FilterArgs {
        region: args.state.clone(),
        bbox: args.bbox.as_deref().map(parse_coordinates).transpose()?,
        aoi_geometry: args.aoi_geometry.as_deref().map(parse_aoi).transpose()?,
    };
    let format = if args.preview {
        OutputFormat::Preview
    } else {
        OutputFormat::Collection
    };

    let name = args.data_name.clone();
    let output = execute(ProgressSinkKind::Filter, output_mode, args.table, move |sink| {
        sink.event(ProgressEvent::phase("Query", format!("filtering {name}")));
        let started = Instant::now();
        let output = engine.filter(&name, filter_args, format)?;
        sink.event(ProgressEvent {
            message: "phase=Done; filter complete".to_string(),
            elapsed: Some(started.elapsed()),
        });
        Ok(output)
    })?;

    if let (Some(path), FilterOutput::Collection(collection)) = (&args.output, &output) {
        write_geojson(path, collection)?;
        let handle = PreviewHandle {
            path: path.clone(),
            feature_count: collection.len(),
            crs: collection.crs.clone(),
        };
        return match output_mode {
            OutputMode::NonInteractive => {
                JsonOutput::print_filter(&FilterOutput::Preview(handle)).into_diagnostic()
            }
            OutputMode::Interactive => {
                println!("wrote {} features to {}", handle.feature_count, handle.path);
                Ok(())
            }
        };
    }

    match (output_mode, &output) {
        (OutputMode::NonInteractive, output) => JsonOutput::print_filter(output).into_diagnostic(),
        (OutputMode::Interactive, FilterOutput::Preview(handle)) => {
            println!(
                "preview of {} features ({}) written to {}",
                handle.feature_count, handle.crs, handle.path
            );
            Ok(())
        }
        (OutputMode::Interactive, FilterOutput::Collection(collection)) => {
            if args.table.enabled() {
                Tui::new(ProgressSinkKind::Filter).show_collection(collection)
            } else {
                TextOutput::print_collection(collection).into_diagnostic()
            }
        }
    }
}

fn parse_aoi(value: &str) -> Result<Value, GeodataError> {
    let text = if value.trim_start().starts_with('{') {
        value.to_string()
    } else {
        fs::read_to_string(value)
            .map_err(|err| GeodataError::Filesystem(format!("read {value}: {err}")))?
    };
    serde_json::from_str(&text).map_err(|err| GeodataError::InvalidGeometry(err.to_string()))
}
