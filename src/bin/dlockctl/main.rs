use std::process::Stdio;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tonic::transport::Channel;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use dlock::proto::dlock_client::DlockClient;
use dlock::proto::{LockEvent, LockRequest, LockResponse};

#[derive(Parser, Debug)]
#[command(name = "dlockctl", version, about = "Client for the distributed lock server")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:5055")]
    addr: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquires a lock, then either runs a command for the duration of the
    /// hold or blocks until interrupted.
    Lock {
        #[arg(long, short = 'k')]
        key: String,

        /// Block and retry until the lock is acquired, instead of failing
        /// immediately when it is already held.
        #[arg(long, short = 'b')]
        block: bool,

        /// Command to run while the lock is held. Killed when the lock is
        /// lost or the stream ends.
        #[arg(last = true)]
        argv: Vec<String>,
    },
    /// Checks the server's health endpoint.
    Health {
        #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
        timeout: Duration,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let channel = Channel::from_shared(args.addr.clone())?.connect().await?;

    match args.command {
        Command::Lock { key, block, argv } => run_lock(channel, key, !block, argv).await,
        Command::Health { timeout } => run_health(channel, timeout).await,
    }
}

async fn run_lock(channel: Channel, key: String, try_lock: bool, argv: Vec<String>) -> anyhow::Result<()> {
    let mut client = DlockClient::new(channel);
    let mut stream = client
        .lock(LockRequest { key: key.clone(), try_lock })
        .await?
        .into_inner();

    let first: Option<LockResponse> = stream.message().await?;
    match first.map(|r| r.event) {
        Some(event) if event == LockEvent::Acquired as i32 => {
            eprintln!("lock {key:?} acquired");
        }
        Some(_) => {
            eprintln!("lock {key:?} is held by another owner");
            std::process::exit(1);
        }
        None => {
            eprintln!("server closed the stream before responding");
            std::process::exit(1);
        }
    }

    if argv.is_empty() {
        // No command given: hold the lock until the stream ends (lease
        // lost) or the operator interrupts with Ctrl-C.
        tokio::select! {
            result = stream.message() => {
                report_stream_end(result);
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted, releasing {key:?}");
            }
        }
        return Ok(());
    }

    let mut child = tokio::process::Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()?;

    tokio::select! {
        status = child.wait() => {
            let status = status?;
            if !status.success() {
                std::process::exit(status.code().unwrap_or(1));
            }
        }
        result = stream.message() => {
            report_stream_end(result);
            let _ = child.kill().await;
        }
    }

    Ok(())
}

fn report_stream_end(result: Result<Option<LockResponse>, tonic::Status>) {
    match result {
        Ok(_) => eprintln!("lock released"),
        Err(status) => eprintln!("lock lost: {status}"),
    }
}

async fn run_health(channel: Channel, timeout: Duration) -> anyhow::Result<()> {
    let mut client = HealthClient::new(channel);
    let response = tokio::time::timeout(
        timeout,
        client.check(HealthCheckRequest { service: String::new() }),
    )
    .await??;

    match response.into_inner().status() {
        ServingStatus::Serving => {
            println!("SERVING");
            Ok(())
        }
        other => {
            println!("{other:?}");
            std::process::exit(1);
        }
    }
}
