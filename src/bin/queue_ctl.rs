//! Command-line administration for a deployment config: initialize every
//! queue it declares, prune dangling messages across all of them, or clear
//! all subscriber state across all of them (spec.md §6 CLI surface), plus a
//! handful of single-queue variants for operating outside a config file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use duramq::config::DeploymentConfig;
use duramq::control::ControlPlane;
use duramq::{HighWaterMark, Strategy, StoreConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create (or re-assert) every queue declared in a deployment config.
    Initialize {
        /// Path to the JSON deployment config.
        config: PathBuf,
    },
    /// Run the dangling-reclamation vacuum step against every queue
    /// declared in a deployment config.
    PruneDangling {
        /// Path to the JSON deployment config.
        config: PathBuf,
    },
    /// Empty every subscriber's undelivered-message set for every queue
    /// declared in a deployment config.
    ClearAll {
        /// Path to the JSON deployment config.
        config: PathBuf,
    },
    /// Initialize a single queue directory directly, bypassing the config file.
    InitializeQueue {
        /// Queue directory to create.
        queue: PathBuf,
        /// Comma-separated subscriber ids.
        #[arg(long, value_delimiter = ',')]
        subscribers: Vec<String>,
        #[arg(long, default_value = "prune_first")]
        strategy: String,
    },
    /// Run the dangling-reclamation vacuum step against a single queue directory.
    PruneDanglingQueue {
        queue: PathBuf,
    },
    /// Empty every subscriber's undelivered-message set for a single queue.
    ClearAllQueue {
        queue: PathBuf,
    },
    /// Add a subscriber to an already-initialized queue.
    AddSubscriber {
        queue: PathBuf,
        subscriber_id: String,
    },
    /// Remove a subscriber from a queue, releasing its pending messages.
    RemoveSubscriber {
        queue: PathBuf,
        subscriber_id: String,
    },
    /// Print whether a queue directory is initialized.
    Status {
        queue: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Initialize { config } => {
            let deployment = read_config(&config)?;
            deployment.deploy().context("failed to initialize queues")?;
            info!("initialized every queue in {}", config.display());
        }
        Command::PruneDangling { config } => {
            let deployment = read_config(&config)?;
            let report = deployment.prune_dangling().context("vacuum failed")?;
            println!(
                "reclaimed {} dangling message(s) across every queue in {}",
                report.reclaimed,
                config.display()
            );
        }
        Command::ClearAll { config } => {
            let deployment = read_config(&config)?;
            deployment.clear_all().context("failed to clear subscribers")?;
            info!("cleared all subscriber state for every queue in {}", config.display());
        }
        Command::InitializeQueue {
            queue,
            subscribers,
            strategy,
        } => {
            let control = open_control(&queue)?;
            let strategy = Strategy::parse(&strategy).context("invalid --strategy")?;
            let refs: Vec<&str> = subscribers.iter().map(String::as_str).collect();
            control
                .initialize(&refs, HighWaterMark::default(), strategy)
                .context("failed to initialize queue")?;
            info!("initialized {} with {} subscriber(s)", queue.display(), refs.len());
        }
        Command::PruneDanglingQueue { queue } => {
            let control = open_control(&queue)?;
            let report = control.prune_dangling_messages().context("vacuum failed")?;
            println!("reclaimed {} dangling message(s)", report.reclaimed);
        }
        Command::ClearAllQueue { queue } => {
            let control = open_control(&queue)?;
            control.clear_all_subscribers().context("failed to clear subscribers")?;
            info!("cleared all subscriber state for {}", queue.display());
        }
        Command::AddSubscriber { queue, subscriber_id } => {
            let control = open_control(&queue)?;
            control
                .add_subscriber(&subscriber_id)
                .context("failed to add subscriber")?;
            info!("added subscriber {subscriber_id:?} to {}", queue.display());
        }
        Command::RemoveSubscriber { queue, subscriber_id } => {
            let control = open_control(&queue)?;
            control
                .remove_subscriber(&subscriber_id)
                .context("failed to remove subscriber")?;
            info!("removed subscriber {subscriber_id:?} from {}", queue.display());
        }
        Command::Status { queue } => {
            let control = open_control(&queue)?;
            let initialized = control.check_queue_is_initialized()?;
            println!("{}: {}", queue.display(), if initialized { "initialized" } else { "not initialized" });
        }
    }

    Ok(())
}

fn read_config(config: &PathBuf) -> Result<DeploymentConfig> {
    DeploymentConfig::from_path(config)
        .with_context(|| format!("failed to read deployment config at {}", config.display()))
}

fn open_control(queue: &PathBuf) -> Result<ControlPlane> {
    let env = duramq::registry::open(queue, StoreConfig::default())
        .with_context(|| format!("failed to open queue at {}", queue.display()))?;
    Ok(ControlPlane::new(env))
}
