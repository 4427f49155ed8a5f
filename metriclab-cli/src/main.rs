//! MetricLab CLI: run, list, and validate commands.
//!
//! Commands:
//! - `run` resolves every selected metric and writes the report, the JSON
//!   document, and optionally a CSV
//! - `list` prints the registry with availability, units and counts
//! - `validate` builds the registry, prints its fingerprint, and checks the
//!   configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use metriclab_core::domain::{Availability, MetricDefinition, Timeframe};
use metriclab_core::registry::MetricRegistry;
use metriclab_runner::output::{emit, export_csv, render, write_file};
use metriclab_runner::{run_metrics, ApiKey, DataMode, RunConfig, RunProgress};

const LOG_TARGET: &str = "metriclab::cli";

#[derive(Parser)]
#[command(
    name = "metriclab",
    about = "MetricLab CLI: derivatives market metrics from CoinGlass",
    version
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, normalize and report the selected metric groups.
    Run {
        /// Groups to run (repeatable). Defaults to the config, then all.
        #[arg(long = "group", value_enum)]
        groups: Vec<GroupArg>,

        /// What to print.
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Write the primary output here instead of stdout (the report for
        /// `text`, the document for `json` and `both`).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also export a CSV to this path.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Provider API key (overrides COINGLASS_API_KEY).
        #[arg(long)]
        api_key: Option<String>,

        /// Data mode (overrides DATA_MODE).
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Worker threads; 1 runs sequentially.
        #[arg(long)]
        workers: Option<usize>,
    },

    /// List registered metrics.
    List {
        /// Restrict to these groups (repeatable).
        #[arg(long = "group", value_enum)]
        groups: Vec<GroupArg>,

        /// Print registry statistics as JSON instead of the table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Validate the registry and, if given, a configuration file.
    Validate {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GroupArg {
    Daily,
    Weekly,
    Monthly,
}

impl From<GroupArg> for Timeframe {
    fn from(g: GroupArg) -> Self {
        match g {
            GroupArg::Daily => Timeframe::Daily,
            GroupArg::Weekly => Timeframe::Weekly,
            GroupArg::Monthly => Timeframe::Monthly,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Full,
    Free,
    Replay,
}

impl From<ModeArg> for DataMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Full => DataMode::Full,
            ModeArg::Free => DataMode::Free,
            ModeArg::Replay => DataMode::Replay,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
    Both,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            groups,
            format,
            output,
            csv,
            config,
            api_key,
            mode,
            workers,
        } => {
            let overrides = RunOverrides {
                groups,
                api_key,
                mode,
                workers,
                output,
                csv,
                format,
            };
            run_cmd(config.as_deref(), overrides)
        }
        Commands::List { groups, json } => list_cmd(&groups, json),
        Commands::Validate { config } => validate_cmd(config.as_deref()),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(verbose > 1)
        .init();
}

// ─── run ────────────────────────────────────────────────────────────

struct RunOverrides {
    groups: Vec<GroupArg>,
    api_key: Option<String>,
    mode: Option<ModeArg>,
    workers: Option<usize>,
    output: Option<PathBuf>,
    csv: Option<PathBuf>,
    format: Format,
}

/// Layer CLI flags over the loaded configuration.
fn apply_overrides(config: &mut RunConfig, o: &RunOverrides) {
    if !o.groups.is_empty() {
        config.groups = o.groups.iter().map(|&g| g.into()).collect();
    }
    if let Some(key) = &o.api_key {
        config.api_key = Some(ApiKey::new(key.clone()));
    }
    if let Some(mode) = o.mode {
        config.data_mode = mode.into();
    }
    if let Some(workers) = o.workers {
        config.workers = workers;
    }
    if let Some(path) = &o.output {
        match o.format {
            Format::Text => config.output.report_path = Some(path.clone()),
            Format::Json | Format::Both => config.output.document_path = Some(path.clone()),
        }
    }
    if let Some(path) = &o.csv {
        config.output.csv_path = Some(path.clone());
    }
}

fn run_cmd(config_path: Option<&Path>, overrides: RunOverrides) -> Result<()> {
    let mut config = RunConfig::load(config_path)?;
    apply_overrides(&mut config, &overrides);
    config.validate()?;

    let registry = MetricRegistry::standard()?;
    let client = config.build_provider(config.rate_limiter())?;
    log::info!(
        target: LOG_TARGET,
        "mode {} via {}, registry {}",
        config.data_mode,
        client.name(),
        registry.fingerprint()
    );

    let progress = |p: &RunProgress| {
        log::info!(
            target: LOG_TARGET,
            "[{}/{}] {} {}",
            p.completed,
            p.total,
            p.metric_id,
            p.status
        );
    };
    let set = run_metrics(
        &registry,
        client.as_ref(),
        &config.run_options(),
        Some(&progress),
        None,
    )?;

    let rendered = render(&set)?;
    let out = &config.output;
    match overrides.format {
        Format::Text => emit(&rendered.report, out.report_path.as_deref())?,
        Format::Json => emit(&rendered.document, out.document_path.as_deref())?,
        Format::Both => {
            emit(&rendered.report, out.report_path.as_deref())?;
            emit(&rendered.document, out.document_path.as_deref())?;
        }
    }
    if let Some(path) = &out.csv_path {
        let csv = export_csv(&set)?;
        write_file(path, &csv)?;
        log::info!(target: LOG_TARGET, "CSV written to {}", path.display());
    }
    Ok(())
}

// ─── list / validate ────────────────────────────────────────────────

fn list_cmd(groups: &[GroupArg], json: bool) -> Result<()> {
    let registry = MetricRegistry::standard()?;

    if json {
        let stats = serde_json::to_string_pretty(&registry.stats())
            .context("failed to serialize registry stats")?;
        println!("{stats}");
        return Ok(());
    }

    let timeframes: Vec<Timeframe> = groups.iter().map(|&g| g.into()).collect();
    for def in registry.filter(&timeframes) {
        println!(
            "{:<40} {:<10} {:<14} {}",
            def.id,
            availability_label(&def),
            def.unit.as_str(),
            def.name
        );
    }

    let stats = registry.stats();
    println!();
    println!(
        "{} metrics: {} implemented, {} external, {} plan-gated, {} approximate",
        stats.total, stats.implemented, stats.external, stats.plan_gated, stats.approximate
    );
    Ok(())
}

fn availability_label(def: &MetricDefinition) -> String {
    match &def.availability {
        Availability::Implemented if def.approximation.is_some() => "approx".to_string(),
        Availability::Implemented => "live".to_string(),
        Availability::External { .. } => "external".to_string(),
        Availability::PlanGated { min_plan } => format!("{min_plan}+"),
    }
}

fn validate_cmd(config_path: Option<&Path>) -> Result<()> {
    let registry = MetricRegistry::standard()?;
    println!("Registry OK: {} metrics", registry.len());
    println!("Fingerprint: {}", registry.fingerprint());
    for (timeframe, gaps) in registry.numbering_gaps() {
        println!("  {timeframe}: numbering gaps at {gaps:?}");
    }

    if let Some(path) = config_path {
        let config = RunConfig::load(Some(path))?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        println!(
            "Config OK: mode {}, {} worker(s)",
            config.data_mode, config.workers
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "metriclab", "run", "--group", "weekly", "--mode", "free", "--workers", "3",
            "--format", "json", "--output", "out/doc.json",
        ]);
        let Commands::Run {
            groups,
            format,
            output,
            csv,
            api_key,
            mode,
            workers,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        let mut config = RunConfig::default();
        apply_overrides(
            &mut config,
            &RunOverrides {
                groups,
                api_key,
                mode,
                workers,
                output,
                csv,
                format,
            },
        );
        assert_eq!(config.groups, vec![Timeframe::Weekly]);
        assert_eq!(config.data_mode, DataMode::Free);
        assert_eq!(config.workers, 3);
        assert_eq!(config.output.document_path, Some(PathBuf::from("out/doc.json")));
        assert!(config.output.report_path.is_none());
    }

    #[test]
    fn verbose_is_counted() {
        let cli = Cli::parse_from(["metriclab", "-vv", "list"]);
        assert_eq!(cli.verbose, 2);
    }
}
