//! disclosure-guard - Privacy-model evaluation and enforcement core
//!
//! Command-line harness: describe a job configuration, evaluate the nodes of
//! a JSON snapshot against it, or derive model parameters.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use disclosure_guard::{
    derivation::{
        derive_dp_parameters, no_attack_k, poisson_estimate, zero_truncated_poisson_estimate,
        KMapEstimate,
    },
    snapshot::Snapshot,
    AnonymizationJob, JobConfig,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "disclosure-guard")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Privacy-model evaluation and enforcement for statistical disclosure control")]
struct Cli {
    /// Job configuration file path
    #[arg(short, long, env = "DISCLOSURE_GUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the configured criteria
    Describe,

    /// Evaluate every node of a snapshot
    Evaluate {
        /// JSON snapshot with table statistics and nodes
        #[arg(short, long)]
        snapshot: PathBuf,
    },

    /// Derive model parameters
    Derive {
        #[command(subcommand)]
        target: DeriveTarget,
    },
}

#[derive(Subcommand)]
enum DeriveTarget {
    /// (ε, δ)-differential privacy → (k, β)
    Dp {
        #[arg(long)]
        epsilon: f64,

        #[arg(long)]
        delta: f64,
    },

    /// Population cell size → sample class size
    KMap {
        #[arg(long)]
        k: usize,

        /// Sample size divided by population size
        #[arg(long)]
        sampling_fraction: f64,

        #[arg(long, value_enum, default_value = "poisson")]
        estimator: EstimatorArg,

        #[arg(long, default_value = "0.05")]
        significance: f64,
    },

    /// Adversary gain and cost → no-attack class size
    Game {
        #[arg(long)]
        gain: f64,

        #[arg(long)]
        cost: f64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EstimatorArg {
    Poisson,
    ZeroTruncatedPoisson,
}

#[derive(Serialize)]
struct CriterionSummary {
    name: &'static str,
    render: String,
    discipline: disclosure_guard::Discipline,
    requirements: disclosure_guard::Requirements,
    monotonic_with_generalization: bool,
    monotonic_with_suppression: bool,
    local_recoding: bool,
}

#[derive(Serialize)]
struct JobSummary {
    suppression_limit: f64,
    requirements: disclosure_guard::Requirements,
    monotonic_with_generalization: bool,
    monotonic_with_suppression: bool,
    criteria: Vec<CriterionSummary>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let json = cli.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("disclosure_guard={}", log_level).into()),
        )
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    match cli.command {
        Commands::Describe => describe(&load_config(cli.config)?)?,
        Commands::Evaluate { snapshot } => evaluate(&load_config(cli.config)?, snapshot).await?,
        Commands::Derive { target } => derive(target)?,
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<JobConfig> {
    let path = path.context("A job configuration is required (--config or DISCLOSURE_GUARD_CONFIG)")?;
    let config = JobConfig::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    Ok(config)
}

fn describe(config: &JobConfig) -> Result<()> {
    let job = AnonymizationJob::from_config(config)?;
    let summary = JobSummary {
        suppression_limit: config.suppression.limit,
        requirements: job.requirements(),
        monotonic_with_generalization: job.is_monotonic_with_generalization(),
        monotonic_with_suppression: job.is_monotonic_with_suppression(),
        criteria: job
            .models()
            .iter()
            .map(|model| CriterionSummary {
                name: model.name(),
                render: model.render(),
                discipline: model.discipline(),
                requirements: model.requirements(),
                monotonic_with_generalization: model.is_monotonic_with_generalization(),
                monotonic_with_suppression: model.is_monotonic_with_suppression(),
                local_recoding: model.is_local_recoding_supported(),
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn evaluate(config: &JobConfig, path: PathBuf) -> Result<()> {
    let snapshot = Snapshot::load(&path)
        .with_context(|| format!("Failed to load snapshot from {}", path.display()))?;
    let context = snapshot.context()?;

    let job = Arc::new(AnonymizationJob::from_config(config)?);
    job.initialize(&context)?;
    tracing::info!(
        job = %job.id(),
        nodes = snapshot.nodes.len(),
        records = context.record_count(),
        budget = job.max_suppressed(context.record_count()),
        "Evaluating snapshot"
    );

    let mut handles = Vec::with_capacity(snapshot.nodes.len());
    for node in &snapshot.nodes {
        let input = node.to_input()?;
        let job = Arc::clone(&job);
        handles.push(tokio::task::spawn_blocking(move || {
            job.evaluate_node(&input.node, input.classes, input.matrix)
        }));
    }

    let mut verdicts = Vec::with_capacity(handles.len());
    for handle in handles {
        verdicts.push(handle.await??);
    }
    println!("{}", serde_json::to_string_pretty(&verdicts)?);
    Ok(())
}

fn derive(target: DeriveTarget) -> Result<()> {
    let output = match target {
        DeriveTarget::Dp { epsilon, delta } => {
            serde_json::to_value(derive_dp_parameters(epsilon, delta)?)?
        }
        DeriveTarget::KMap {
            k,
            sampling_fraction,
            estimator,
            significance,
        } => {
            let estimate: KMapEstimate = match estimator {
                EstimatorArg::Poisson => poisson_estimate(k, sampling_fraction, significance)?,
                EstimatorArg::ZeroTruncatedPoisson => {
                    zero_truncated_poisson_estimate(k, sampling_fraction, significance)?
                }
            };
            serde_json::to_value(estimate)?
        }
        DeriveTarget::Game { gain, cost } => serde_json::json!({ "k": no_attack_k(gain, cost)? }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_flag() {
        let cli = Cli::try_parse_from(["disclosure-guard", "derive", "game", "--gain", "3", "--cost", "1"])
            .unwrap();
        assert_eq!(cli.log_format, LogFormat::Text);

        let cli = Cli::try_parse_from(["disclosure-guard", "--log-format", "json", "describe"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Describe));

        assert!(Cli::try_parse_from(["disclosure-guard", "--log-format", "xml", "describe"]).is_err());
    }

    #[test]
    fn test_derive_arguments() {
        let cli = Cli::try_parse_from([
            "disclosure-guard",
            "derive",
            "k-map",
            "--k",
            "5",
            "--sampling-fraction",
            "0.1",
            "--estimator",
            "zero-truncated-poisson",
        ])
        .unwrap();
        match cli.command {
            Commands::Derive {
                target:
                    DeriveTarget::KMap {
                        k,
                        estimator,
                        significance,
                        ..
                    },
            } => {
                assert_eq!(k, 5);
                assert_eq!(estimator, EstimatorArg::ZeroTruncatedPoisson);
                assert_eq!(significance, 0.05);
            }
            _ => panic!("expected derive k-map"),
        }
    }
}
