//! Fleetform CLI entrypoint.
//!
//! This is the main entrypoint for the fleetform command-line tool.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use fleetform::cli::{Cli, Commands, OutputFormatter};
use fleetform::config::{ConfigValidator, EngineSettings, ModuleRegistry, SettingsParser};
use fleetform::engine::Engine;
use fleetform::error::{FleetformError, Result, StateError};
use fleetform::resource::{Attributes, ResourceId};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let settings = load_settings(cli.settings.as_deref(), cli.modules)?;

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(&settings, warnings, &formatter),
        Commands::Modules => cmd_modules(&settings, &formatter),
        Commands::Plan { detailed } => cmd_plan(settings, detailed, &formatter).await,
        Commands::Show => cmd_show(settings, &formatter).await,
        Commands::Refresh {
            file,
            expected_version,
        } => cmd_refresh(settings, &file, expected_version, &formatter).await,
        Commands::Watch { interval } => cmd_watch(settings, interval, &formatter).await,
    }
}

/// Loads settings, the `.env` file, and environment overrides.
fn load_settings(settings_path: Option<&Path>, modules: Option<PathBuf>) -> Result<EngineSettings> {
    let base = settings_path
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let parser = SettingsParser::new().with_base_path(&base);
    parser.load_dotenv()?;

    let mut settings = parser.load_with_env(settings_path)?;
    if let Some(modules) = modules {
        debug!("Overriding modules_dir from command line");
        settings.modules_dir = modules;
    }
    Ok(settings)
}

/// Writes command output to stdout.
fn emit(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", text.trim_end())?;
    Ok(())
}

/// Validate the module tree.
fn cmd_validate(settings: &EngineSettings, show_warnings: bool, formatter: &OutputFormatter) -> Result<()> {
    info!("Validating modules: {}", settings.modules_dir.display());

    let graph = ModuleRegistry::new().load(&settings.modules_dir)?;
    let warnings = ConfigValidator::new().warnings(&graph);

    emit(&formatter.format_validation(&graph, &warnings, show_warnings))
}

/// List modules.
fn cmd_modules(settings: &EngineSettings, formatter: &OutputFormatter) -> Result<()> {
    let modules = ModuleRegistry::new().list_modules(&settings.modules_dir)?;
    emit(&formatter.format_modules(&modules))
}

/// Show the plan.
async fn cmd_plan(settings: EngineSettings, detailed: bool, formatter: &OutputFormatter) -> Result<()> {
    let engine = Engine::from_settings(settings).await?;
    engine.reload().await?;

    let plan = engine.get_plan().await;
    emit(&formatter.format_plan(&plan, detailed))
}

/// Show the recorded state.
async fn cmd_show(settings: EngineSettings, formatter: &OutputFormatter) -> Result<()> {
    let engine = Engine::from_settings(settings).await?;
    emit(&formatter.format_state(&engine.get_state()))
}

/// Replace the recorded state from a JSON file.
async fn cmd_refresh(
    settings: EngineSettings,
    file: &Path,
    expected_version: Option<u64>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let content = tokio::fs::read_to_string(file).await?;
    let resources: BTreeMap<ResourceId, Attributes> = serde_json::from_str(&content).map_err(|e| {
        FleetformError::State(StateError::serialization(format!(
            "Invalid observed state in {}: {e}",
            file.display()
        )))
    })?;

    let engine = Engine::from_settings(settings).await?;
    if let Err(e) = engine.reload().await {
        warn!("Modules could not be loaded, plan will be computed against an empty graph: {e}");
    }

    let expected = expected_version.unwrap_or_else(|| engine.get_state().version);
    let summary = engine.refresh_state(resources, expected).await?;

    emit(&formatter.format_state_summary(&summary))?;
    emit(&formatter.format_plan(&*engine.get_plan().await, false))
}

/// Watch modules and print events until interrupted.
async fn cmd_watch(settings: EngineSettings, interval: Option<u64>, formatter: &OutputFormatter) -> Result<()> {
    let interval = Duration::from_secs(interval.unwrap_or(settings.reload_interval_secs).max(1));
    let engine = Arc::new(Engine::from_settings(settings).await?);
    let mut events = engine.subscribe();

    let handle = engine.spawn_reload_loop(interval);
    eprintln!("Watching {} (Ctrl+C to stop)", engine.settings().modules_dir.display());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => emit(&formatter.format_event(&event))?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}
