//! CLI for exercising the taskgate dispatcher and batcher.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use taskgate_core::config;

use commands::{run_batch, run_config, run_simulate, SimulateArgs};

/// Top-level CLI for taskgate.
#[derive(Debug, Parser)]
#[command(name = "taskgate")]
#[command(about = "taskgate: bounded task dispatcher with retries and request batching", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Print the config file path and the effective configuration.
    Config,

    /// Push synthetic tasks through a dispatcher and report its counters.
    Simulate {
        /// Number of tasks to submit.
        #[arg(long, value_name = "N")]
        tasks: usize,
        /// Override dispatcher.max_concurrent.
        #[arg(long, value_name = "C")]
        concurrency: Option<usize>,
        /// Probability in [0, 1] that an attempt fails with a transient error.
        #[arg(long, default_value = "0.0", value_name = "R")]
        failure_rate: f64,
        /// Mean task latency in milliseconds.
        #[arg(long, default_value = "50", value_name = "L")]
        latency_ms: u64,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Push requests through a batcher with an echo client and report its counters.
    Batch {
        /// Number of requests to add.
        #[arg(long, value_name = "N")]
        requests: usize,
        /// Number of distinct batch keys.
        #[arg(long, default_value = "1", value_name = "K")]
        keys: usize,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Config => run_config(&cfg)?,
            CliCommand::Simulate {
                tasks,
                concurrency,
                failure_rate,
                latency_ms,
                json,
            } => {
                let args = SimulateArgs {
                    tasks,
                    concurrency,
                    failure_rate,
                    latency_ms,
                    json,
                };
                run_simulate(&cfg, &args).await?;
            }
            CliCommand::Batch {
                requests,
                keys,
                json,
            } => run_batch(&cfg, requests, keys, json).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
