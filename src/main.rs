use anyhow::{Context, Result};
use clap::Parser;
use consumer_perf::cli::{Cli, OutputFormat};
use consumer_perf::config::AnalysisConfig;
use consumer_perf::ingest::{self, RecordPolicy};
use consumer_perf::report::{AnalysisInputs, AnalysisReport};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
///
/// Warnings (e.g. skipped rows) are shown by default and `--debug` raises the
/// level to TRACE. A set `RUST_LOG` replaces both.
fn init_tracing(debug: bool) {
    let default_level = if debug {
        tracing::Level::TRACE
    } else {
        tracing::Level::WARN
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration and apply command line overrides
fn resolve_config(args: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };

    if let Some(max_workers) = args.max_workers {
        config.max_workers = max_workers;
    }
    if let Some(deployed_workers) = args.deployed_workers {
        config.deployed_workers = deployed_workers;
    }
    if let Some(unit) = args.step_unit {
        config.step_unit = unit;
    }
    if args.skip_malformed {
        config.record_policy = RecordPolicy::Skip;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

/// Read every input log named on the command line
fn load_inputs(args: &Cli, policy: RecordPolicy) -> Result<AnalysisInputs> {
    let mut inputs = AnalysisInputs::default();

    if let Some(path) = &args.durations {
        let loaded = ingest::load_durations(path, policy)
            .with_context(|| format!("Failed to load durations from {}", path.display()))?;
        inputs.skipped.durations = loaded.skipped;
        inputs.durations = Some(loaded.records);
    }
    if let Some(path) = &args.steps {
        let loaded = ingest::load_step_durations(path, policy)
            .with_context(|| format!("Failed to load step durations from {}", path.display()))?;
        inputs.skipped.steps = loaded.skipped;
        inputs.steps = Some(loaded.records);
    }
    if let Some(path) = &args.uploads {
        let loaded = ingest::load_upload_timestamps(path, policy)
            .with_context(|| format!("Failed to load upload timestamps from {}", path.display()))?;
        inputs.skipped.uploads = loaded.skipped;
        inputs.uploads = Some(loaded.records);
    }
    if let Some(path) = &args.memory {
        let loaded = ingest::load_memory(path, policy)
            .with_context(|| format!("Failed to load memory log from {}", path.display()))?;
        inputs.skipped.memory = loaded.skipped;
        inputs.memory = Some(loaded.records);
    }

    Ok(inputs)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    if !args.has_inputs() {
        anyhow::bail!(
            "No input logs given. Usage: consumer-perf --durations FILE --steps FILE \
             --uploads FILE --memory FILE"
        );
    }

    init_tracing(args.debug);

    let config = resolve_config(&args)?;
    let inputs = load_inputs(&args, config.record_policy)?;
    let report = AnalysisReport::build(&inputs, &config).context("Analysis failed")?;

    match args.format {
        OutputFormat::Text => print!("{}", report),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    Ok(())
}
