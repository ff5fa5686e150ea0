use clap::{Parser, Subcommand};

use dlock::config;
use dlock::globals::DEFAULT_CONFIG_PATH;
use dlock::options::LockOptions;
use dlock::registry::Registry;

#[derive(Parser, Debug)]
#[command(name = "nodectl", version, about = "Read-only admin tool for a configured lock backend")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reports the named backend's health, and, when `--key` is given,
    /// whether that key currently looks free.
    Inspect {
        /// Backend this config is expected to resolve to (`etcd`,
        /// `jetstream`, `redis`, `cassandra`); mismatches are rejected
        /// rather than silently inspecting a different backend.
        #[arg(long)]
        backend: String,

        #[arg(long)]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let spec = config::load(&args.config)?;
    let registry = Registry::new();
    let manager = registry.build(&spec).await?;

    match args.command {
        Command::Inspect { backend, key } => inspect(manager, backend, key).await,
    }
}

async fn inspect(manager: dlock::manager::LockManager, backend: String, key: Option<String>) -> anyhow::Result<()> {
    if manager.backend() != backend {
        anyhow::bail!(
            "--backend {backend:?} does not match the backend resolved from --config ({:?})",
            manager.backend()
        );
    }

    println!("backend: {}", manager.backend());
    println!("healthy: {}", manager.health().await);

    if let Some(key) = key {
        // Best-effort probe only: a successful non-blocking acquire is
        // released immediately and proves nothing about the moment after.
        let lock = manager.new_lock(&key, LockOptions::new());
        match lock.try_lock().await {
            Ok(Some(_)) => {
                lock.unlock().await.ok();
                println!("key {key:?}: free (probe acquired and released it)");
            }
            Ok(None) => println!("key {key:?}: held by another owner"),
            Err(e) => println!("key {key:?}: probe failed: {e}"),
        }
    }

    Ok(())
}
