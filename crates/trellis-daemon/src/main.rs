//! Trellis Daemon - Deployment manifest controller
//!
//! `trellisd run` keeps rendered deployments current against an in-memory
//! cluster seeded from a file. `trellisd render` renders a manifest from
//! local files.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trellis_daemon::{
    load_objects, render, shutdown_signal, Daemon, DaemonConfig, RenderRequest,
};
use trellis_types::ControllerEventEnvelope;

/// Trellis Daemon CLI
#[derive(Parser)]
#[command(name = "trellisd")]
#[command(about = "Trellis - declarative deployment manifest rendering", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML or YAML)
    #[arg(short, long, env = "TRELLIS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "TRELLIS_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller against an in-memory cluster
    Run {
        /// YAML list of objects to seed the cluster with
        #[arg(long)]
        objects: Option<PathBuf>,

        /// Maximum concurrent reconciles
        #[arg(long)]
        workers: Option<usize>,

        /// Only act on these namespaces
        #[arg(long = "namespace")]
        namespaces: Vec<String>,

        /// Print controller events as JSON lines
        #[arg(long)]
        events: bool,
    },

    /// Render a manifest from local files
    Render {
        /// Base manifest
        #[arg(long)]
        manifest: PathBuf,

        /// Ops file, may be repeated
        #[arg(long = "ops")]
        ops: Vec<PathBuf>,

        /// Variables file
        #[arg(long)]
        vars: Option<PathBuf>,

        /// Expand this instance group
        #[arg(long)]
        instance_group: Option<String>,

        /// Only this job of the instance group
        #[arg(long, requires = "instance_group")]
        job: Option<String>,

        /// Place the bootstrap instance as on a first rollout
        #[arg(long, requires = "instance_group")]
        initial: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = DaemonConfig::load(cli.config.as_deref()).context("loading configuration")?;

    // Override with CLI args
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Command::Run {
            objects,
            workers,
            namespaces,
            events,
        } => {
            if let Some(workers) = workers {
                config.controller.max_concurrent_reconciles = workers;
            }
            if !namespaces.is_empty() {
                config.controller.monitored_namespaces = namespaces;
            }
            run(config, objects, events).await
        }
        Command::Render {
            manifest,
            ops,
            vars,
            instance_group,
            job,
            initial,
        } => {
            let request = RenderRequest {
                manifest,
                ops,
                vars,
                instance_group,
                job,
                initial_rollout: initial,
            };
            let output = render(&request).context("rendering manifest")?;
            print!("{output}");
            Ok(())
        }
    }
}

async fn run(
    config: DaemonConfig,
    objects: Option<PathBuf>,
    events: bool,
) -> anyhow::Result<()> {
    let seed = match &objects {
        Some(path) => load_objects(path).context("loading seed objects")?,
        None => Vec::new(),
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = config.controller.max_concurrent_reconciles,
        "Trellis daemon starting"
    );

    let daemon = Daemon::new(config);
    let on_event = events.then_some(print_event as fn(&ControllerEventEnvelope));
    let summary = daemon.run(seed, on_event, shutdown_signal()).await;

    print!(
        "{}",
        serde_yaml::to_string(&summary).context("serializing summary")?
    );
    Ok(())
}

fn print_event(envelope: &ControllerEventEnvelope) {
    match serde_json::to_string(envelope) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
    }
}
