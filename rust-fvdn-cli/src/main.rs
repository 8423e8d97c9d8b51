use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rust_fvdn_fwd::ProducerConfig;
use std::path::PathBuf;

mod sim;

/// fvDN command line interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a line-topology simulation of the forwarding core
    Run {
        /// Number of forwarders in the chain
        #[clap(short, long, default_value = "3")]
        nodes: usize,

        /// Producer configuration file (TOML/JSON/YAML)
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// Simulation length in seconds; defaults to the configured
        /// experiment time
        #[clap(short, long)]
        experiment_time: Option<u64>,

        /// Milliseconds between consumer requests
        #[clap(long, default_value = "500")]
        interest_interval: u64,

        /// One-way link delay in milliseconds
        #[clap(long, default_value = "10")]
        link_delay: u64,

        /// Number of distinct content names requested
        #[clap(long, default_value = "8")]
        distinct_contents: u32,

        /// RNG seed for reproducible runs
        #[clap(long, default_value = "1")]
        seed: u64,

        /// Disable the freshness-validation probes (classic cache hits)
        #[clap(long)]
        no_validation: bool,

        /// Print the final counters as JSON
        #[clap(long)]
        json: bool,
    },

    /// Print the default producer configuration as JSON
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.verbose {
        "debug"
    } else {
        "info"
    }))
    .init();

    match cli.command {
        Commands::Run {
            nodes,
            config,
            experiment_time,
            interest_interval,
            link_delay,
            distinct_contents,
            seed,
            no_validation,
            json,
        } => {
            let producer_config = load_producer_config(config.as_deref())?;
            let options = sim::SimOptions {
                nodes,
                experiment_time_s: experiment_time.unwrap_or(producer_config.experiment_time_s),
                interest_interval_ms: interest_interval.max(1),
                link_delay_ms: link_delay,
                distinct_contents: distinct_contents.max(1),
                validation: !no_validation,
                seed,
            };

            info!(
                "running {} nodes for {} s under prefix {}",
                options.nodes, options.experiment_time_s, producer_config.prefix
            );
            let report = sim::run(&options, producer_config);

            if json {
                let value = serde_json::json!({
                    "interests_sent": report.interests_sent,
                    "datas_received": report.datas_received,
                    "mean_rtt_ms": report.mean_rtt_ms,
                    "producer_store_len": report.producer_store_len,
                    "nodes": report.node_metrics,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!(
                    "{} interests sent, {} datas received, mean rtt {:.1} ms",
                    report.interests_sent, report.datas_received, report.mean_rtt_ms
                );
                for (i, metrics) in report.node_metrics.iter().enumerate() {
                    println!(
                        "node {}: in/out interests {}/{}, in/out datas {}/{}, cs hit/miss {}/{}, loops {}",
                        i + 1,
                        metrics.n_in_interests,
                        metrics.n_out_interests,
                        metrics.n_in_datas,
                        metrics.n_out_datas,
                        metrics.cs_hits,
                        metrics.cs_misses,
                        metrics.interest_loops,
                    );
                }
            }
        }
        Commands::Config => {
            println!(
                "{}",
                serde_json::to_string_pretty(&ProducerConfig::default())?
            );
        }
    }

    Ok(())
}

/// Layers the optional config file under `FVDN_`-prefixed environment
/// overrides, then fills the rest from the defaults.
fn load_producer_config(path: Option<&std::path::Path>) -> Result<ProducerConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    builder = builder.add_source(config::Environment::with_prefix("FVDN"));

    let settings = builder
        .build()
        .context("failed to load producer configuration")?;
    settings
        .try_deserialize::<ProducerConfig>()
        .context("invalid producer configuration")
}
