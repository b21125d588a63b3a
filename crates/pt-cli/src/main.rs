//! CLI entry point for the project tracker.
//!
//! Loads a solution manifest through the deferred loader, the same way an
//! IDE host would, and prints the resulting project graph.
//!
//! # Usage
//!
//! ```bash
//! projtrack [OPTIONS] <COMMAND>
//!
//! # Load and print the project graph
//! projtrack load --manifest solution.json
//!
//! # Load a specific build configuration as JSON
//! projtrack load --manifest solution.json --configuration Release --platform x64 --format json
//!
//! # Load, then close the solution and verify nothing is left behind
//! projtrack load --manifest solution.json --close
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, WrapErr};
use pt_core::{Config, Language, ProjectId, ProjectReference};
use pt_loader::{DeferredLoadOrchestrator, LoadSummary, ManifestProvider};
use pt_tracker::{ProjectTracker, StatsSnapshot, TracingHost, WorkspaceHost};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Tracks the projects of a solution and reconciles references between them.
#[derive(Parser)]
#[command(name = "projtrack", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON).
    #[arg(short, long, global = true, env = "PROJTRACK_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Load a solution manifest and print the project graph.
    Load {
        /// Solution manifest (JSON).
        #[arg(short, long, env = "PROJTRACK_MANIFEST")]
        manifest: Utf8PathBuf,

        /// Build configuration (overrides the configuration file).
        #[arg(long)]
        configuration: Option<String>,

        /// Build platform (overrides the configuration file).
        #[arg(long)]
        platform: Option<String>,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,

        /// Close the solution after loading and verify the registry empties.
        #[arg(long)]
        close: bool,
    },
}

/// Report output format.
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text.
    Text,
    /// JSON format.
    Json,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},tokio=warn,rayon=warn"))
    });

    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the configuration file and CLI overrides.
///
/// # Errors
///
/// Returns an error if the configuration file cannot be read or a value
/// fails validation.
fn build_config(
    path: Option<&Utf8Path>,
    configuration: Option<&str>,
    platform: Option<&str>,
) -> color_eyre::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_json_file(path)
            .wrap_err_with(|| format!("Failed to load configuration from {path}"))?,
        None => Config::default(),
    };

    if let Some(configuration) = configuration {
        configuration.clone_into(&mut config.load.configuration);
    }
    if let Some(platform) = platform {
        platform.clone_into(&mut config.load.platform);
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// REPORT TYPES
// =============================================================================

/// Outcome of `projtrack load`.
#[derive(Debug, Serialize)]
struct LoadReport {
    solution: Utf8PathBuf,
    summary: LoadSummary,
    /// Projects in dependency order.
    projects: Vec<ProjectView>,
    stats: StatsSnapshot,
    closed: bool,
}

#[derive(Debug, Serialize)]
struct ProjectView {
    id: ProjectId,
    name: String,
    language: Language,
    file: Option<Utf8PathBuf>,
    output: Option<Utf8PathBuf>,
    references: Vec<ProjectReference>,
}

impl LoadReport {
    fn name_of(&self, id: ProjectId) -> Option<&str> {
        self.projects
            .iter()
            .find(|project| project.id == id)
            .map(|project| project.name.as_str())
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Runs a deferred load of `manifest`, optionally closing the solution after.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read, the load fails, or the
/// solution does not close cleanly.
async fn load_solution(
    config: Config,
    manifest: &Utf8Path,
    close: bool,
) -> color_eyre::Result<LoadReport> {
    let provider = ManifestProvider::from_file(manifest).await?;
    let solution = provider.manifest().solution.clone();
    let working_folder = provider.manifest().working_folder.clone();

    let mut tracker = ProjectTracker::new(config.tracker);
    let host: Arc<dyn WorkspaceHost> = Arc::new(TracingHost::new("projtrack"));
    tracker.register_host(Arc::clone(&host))?;
    tracker.mark_host_ready(&host)?;
    tracker.open_solution(solution.clone(), working_folder);

    info!(manifest = %manifest, solution = %solution, "Loading solution");
    let mut loader = DeferredLoadOrchestrator::new(provider, config.load);
    let summary = loader.load(&mut tracker).await?;

    let registry = tracker.registry();
    let projects = registry
        .dependency_order(&registry.ids(), |_| true)
        .into_iter()
        .filter_map(|id| registry.get(id))
        .map(|project| ProjectView {
            id: project.id,
            name: project.display_name.clone(),
            language: project.language,
            file: project.file_path.clone(),
            output: project.bin_output_path.clone(),
            references: project.references.to_vec(),
        })
        .collect();

    if close {
        tracker.before_close_solution();
        tracker
            .after_close_solution()
            .wrap_err("Solution did not close cleanly")?;
        if !tracker.registry().is_empty() {
            return Err(eyre!(
                "{} projects still registered after close",
                tracker.registry().len()
            ));
        }
        info!(solution = %solution, "Solution closed");
    }

    Ok(LoadReport {
        solution,
        summary,
        projects,
        stats: tracker.stats(),
        closed: close,
    })
}

/// Loads a manifest and writes the report.
///
/// # Errors
///
/// Returns an error if loading or writing fails.
async fn run_load(
    config: Config,
    manifest: &Utf8Path,
    format: OutputFormat,
    output: Option<&Utf8Path>,
    close: bool,
) -> color_eyre::Result<()> {
    let report = load_solution(config, manifest, close).await?;

    let content = match format {
        OutputFormat::Text => render_text(&report),
        OutputFormat::Json => render_json(&report)?,
    };

    if let Some(output_path) = output {
        std::fs::write(output_path.as_std_path(), &content)?;
        info!(path = %output_path, "Report written");
    } else {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        write!(handle, "{content}")?;
    }

    Ok(())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Renders the project graph and statistics as text.
fn render_text(report: &LoadReport) -> String {
    use std::fmt::Write;

    let mut output = String::new();
    let summary = &report.summary;

    let _ = writeln!(output, "Solution: {}", report.solution);
    let _ = writeln!(output, "Configuration: {}", summary.configuration);
    let _ = writeln!(output, "Descriptors: {}", summary.descriptors);
    let _ = writeln!(output);
    let _ = writeln!(output, "Projects ({}):", report.projects.len());
    for project in &report.projects {
        let _ = writeln!(
            output,
            "  {} {} ({})",
            project.id, project.name, project.language
        );
        if let Some(file) = &project.file {
            let _ = writeln!(output, "    file:   {file}");
        }
        if let Some(path) = &project.output {
            let _ = writeln!(output, "    output: {path}");
        }
        for reference in &project.references {
            match reference {
                ProjectReference::Project {
                    project: id,
                    converted_from,
                } => {
                    let name = report.name_of(*id).unwrap_or("?");
                    match converted_from {
                        Some(binary) => {
                            let _ = writeln!(output, "    -> {id} {name} (via {})", binary.path);
                        }
                        None => {
                            let _ = writeln!(output, "    -> {id} {name}");
                        }
                    }
                }
                ProjectReference::Metadata(binary) => {
                    let _ = writeln!(output, "    binary {}", binary.path);
                }
            }
        }
    }

    if !summary.dangling.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Dangling references ({}):", summary.dangling.len());
        for dangling in &summary.dangling {
            let _ = writeln!(output, "  {} -> {}", dangling.from, dangling.to);
        }
    }

    if !summary.skipped.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Skipped ({}):", summary.skipped.len());
        for path in &summary.skipped {
            let _ = writeln!(output, "  {path}");
        }
    }

    let stats = &report.stats;
    let _ = writeln!(output);
    let _ = writeln!(output, "Statistics:");
    let _ = writeln!(output, "  added:         {}", stats.added);
    let _ = writeln!(output, "  removed:       {}", stats.removed);
    let _ = writeln!(output, "  promoted:      {}", stats.promoted);
    let _ = writeln!(output, "  demoted:       {}", stats.demoted);
    let _ = writeln!(output, "  notifications: {}", stats.notifications);
    let _ = writeln!(output, "  batches:       {}", stats.batches);
    if report.closed {
        let _ = writeln!(output, "  closed:        yes");
    }

    output
}

/// Renders the report as pretty-printed JSON.
fn render_json(report: &LoadReport) -> color_eyre::Result<String> {
    serde_json::to_string_pretty(report).map_err(|e| eyre!("Failed to serialize JSON: {}", e))
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
///
/// The tracker is foreground-only, so everything runs on one thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Route to appropriate command
    match &cli.command {
        Commands::Load {
            manifest,
            configuration,
            platform,
            format,
            output,
            close,
        } => {
            let config = build_config(
                cli.config.as_deref(),
                configuration.as_deref(),
                platform.as_deref(),
            )?;
            run_load(config, manifest, *format, output.as_deref(), *close).await
        }
    }
}
