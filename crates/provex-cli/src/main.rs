//! Provex command line
//!
//! Drives one verification run end to end:
//!
//! ```text
//! provex --prp MEMSAFETY file.c
//! provex --prp props.prp --timeout 900 --verifier cpachecker file.c
//! ```
//!
//! Exit status 0 means the pipeline ran to completion, whatever the verdict
//! (including `unknown` and `timeout`). A non-zero status is reserved for
//! configuration errors and fatal stage failures.

use anyhow::{Context, Result};
use clap::Parser;
use provex_backends::{create_backend, HealthStatus};
use provex_core::{PointsToMode, Property, RunConfig, ToolPaths};
use provex_pipeline::Controller;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "provex")]
#[command(about = "Verification pipeline for C programs")]
#[command(version)]
struct Cli {
    /// C source files making up the verified unit
    #[arg(required_unless_present = "version_check")]
    sources: Vec<PathBuf>,

    /// Property to check: a shortcut key, a CHECK(...) formula, or a path
    /// to a .prp file. Repeatable.
    #[arg(long = "prp")]
    properties: Vec<String>,

    /// Verification back end
    #[arg(long, default_value = "klee")]
    verifier: String,

    /// Global timeout in seconds, 0 for unbounded
    #[arg(long, default_value = "0")]
    timeout: u64,

    /// Points-to precision for the slicer
    #[arg(long, default_value = "fi")]
    pta: String,

    /// Re-run slicing on its own output up to N times
    #[arg(long, default_value = "1", value_name = "N")]
    repeat_slicing: u32,

    /// Slicing criterion handed to the slicer
    #[arg(long, default_value = "__assert_fail")]
    slicing_criterion: String,

    /// Skip the slicing stage
    #[arg(long)]
    no_slicing: bool,

    /// Abort the run if the slicer fails instead of falling back
    #[arg(long, conflicts_with = "no_slicing")]
    require_slicer: bool,

    /// Skip bitcode optimization before linking
    #[arg(long)]
    no_optimize: bool,

    /// Leave uninitialized memory as-is instead of making it symbolic
    #[arg(long)]
    no_symbolize: bool,

    /// Do not write a witness file
    #[arg(long)]
    no_witness: bool,

    /// Stop after the link stage without running the back end
    #[arg(long)]
    no_verification: bool,

    /// Retain the working directory after the run
    #[arg(long)]
    save_files: bool,

    /// Work in this directory instead of a fresh temporary one
    #[arg(long, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Where to write the witness
    #[arg(long, default_value = "witness.graphml")]
    witness_output: PathBuf,

    /// Directory holding monitor definitions for the instrumenter
    #[arg(long, default_value = "monitors")]
    monitor_dir: PathBuf,

    /// Override the slicer binary
    #[arg(long, value_name = "PATH")]
    slicer: Option<PathBuf>,

    /// Override the instrumenter binary
    #[arg(long, value_name = "PATH")]
    instrumenter: Option<PathBuf>,

    /// Override the linker binary
    #[arg(long, value_name = "PATH")]
    linker: Option<PathBuf>,

    /// Override the optimizer binary
    #[arg(long, value_name = "PATH")]
    optimizer: Option<PathBuf>,

    /// Override the symbolization pass driver binary
    #[arg(long, value_name = "PATH")]
    symbolizer: Option<PathBuf>,

    /// Override the back-end binary
    #[arg(long, value_name = "PATH")]
    verifier_path: Option<PathBuf>,

    /// Extra flag passed through to the slicer. Repeatable.
    #[arg(long = "slicer-arg", value_name = "FLAG")]
    slicer_args: Vec<String>,

    /// Extra flag passed through to the instrumenter. Repeatable.
    #[arg(long = "instrumenter-arg", value_name = "FLAG")]
    instrumenter_args: Vec<String>,

    /// Extra flag passed through to the symbolization pass driver,
    /// e.g. a plugin load. Repeatable.
    #[arg(long = "symbolizer-arg", value_name = "FLAG")]
    symbolizer_args: Vec<String>,

    /// Extra flag passed through to the back end. Repeatable.
    #[arg(long = "verifier-arg", value_name = "FLAG")]
    verifier_args: Vec<String>,

    /// Print the final outcome as JSON on stdout
    #[arg(long)]
    json_results: bool,

    /// Check the configured back end and exit
    #[arg(long)]
    version_check: bool,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

/// Resolve every `--prp` value: file paths are read and parsed as property
/// files, anything else is parsed inline.
fn load_properties(specs: &[String]) -> Result<Vec<Property>> {
    let mut properties = Vec::new();
    for spec in specs {
        let path = PathBuf::from(spec);
        let text = if path.is_file() {
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading property file {}", path.display()))?
        } else {
            spec.clone()
        };
        properties.extend(Property::parse_spec(&text)?);
    }
    Ok(properties)
}

fn build_config(cli: &Cli) -> Result<RunConfig> {
    let pta: PointsToMode = cli.pta.parse()?;
    Ok(RunConfig {
        sources: cli.sources.clone(),
        properties: load_properties(&cli.properties)?,
        backend: cli.verifier.clone(),
        timeout_secs: cli.timeout,
        repeat_slicing: cli.repeat_slicing,
        pta,
        slicing_criterion: cli.slicing_criterion.clone(),
        slicing_enabled: !cli.no_slicing,
        require_slicer: cli.require_slicer,
        optimization_enabled: !cli.no_optimize,
        symbolize_enabled: !cli.no_symbolize,
        witness_enabled: !cli.no_witness,
        verification_enabled: !cli.no_verification,
        save_files: cli.save_files,
        work_dir: cli.work_dir.clone(),
        witness_path: cli.witness_output.clone(),
        monitor_dir: cli.monitor_dir.clone(),
        slicer_args: cli.slicer_args.clone(),
        instrumenter_args: cli.instrumenter_args.clone(),
        symbolizer_args: cli.symbolizer_args.clone(),
        backend_args: cli.verifier_args.clone(),
        tools: ToolPaths {
            slicer: cli.slicer.clone(),
            instrumenter: cli.instrumenter.clone(),
            linker: cli.linker.clone(),
            optimizer: cli.optimizer.clone(),
            symbolizer: cli.symbolizer.clone(),
            backend: cli.verifier_path.clone(),
        },
    })
}

/// Check the configured back end and report whether its toolchain answers
async fn version_check(config: &RunConfig) -> Result<ExitCode> {
    let backend = create_backend(config)?;
    let status = backend.health_check().await;
    println!(
        "{}: expected version {}",
        backend.name(),
        backend.required_tool_version()
    );
    match status {
        HealthStatus::Healthy => {
            println!("status: healthy");
            Ok(ExitCode::SUCCESS)
        }
        HealthStatus::Degraded { reason } => {
            println!("status: degraded ({reason})");
            Ok(ExitCode::SUCCESS)
        }
        HealthStatus::Unavailable { reason } => {
            println!("status: unavailable ({reason})");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = build_config(&cli)?;
    if cli.version_check {
        return version_check(&config).await;
    }

    debug!(backend = %config.backend, sources = config.sources.len(), "starting run");
    let controller = Controller::new(config)?;
    let outcome = controller.run().await?;

    if cli.json_results {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("RESULT: {}", outcome.verdict);
        println!("elapsed: {:.2}s", outcome.elapsed.as_secs_f64());
        if let Some(path) = &outcome.witness_path {
            println!("witness: {}", path.display());
        }
        if let Some(dir) = &outcome.working_dir {
            println!("files: {}", dir.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("provex: error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
