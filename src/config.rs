use crate::application::processor::DEFAULT_SUCCESS_RATE;
use crate::application::worker::{DEFAULT_BATCH_SIZE, DEFAULT_POLL_INTERVAL_MS, WorkerConfig};
use crate::domain::idempotency::IDEMPOTENCY_TTL_SECONDS;
use crate::infrastructure::{
    DEFAULT_MAX_RECEIVE_COUNT, DEFAULT_VISIBILITY_TIMEOUT_SECONDS, QueueConfig,
};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "PAYFLOW_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API together with the status worker
    Serve(ServeArgs),
    /// Create sample payments and settle them
    Seed(SeedArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address the HTTP API listens on
    #[arg(long, env = "PAYFLOW_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub service: ServiceConfig,
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Number of payments to create
    #[arg(long, default_value_t = 18)]
    pub count: usize,

    #[command(flatten)]
    pub service: ServiceConfig,
}

/// Options shared by every command that wires the stores.
#[derive(Debug, Clone, Args)]
pub struct ServiceConfig {
    /// Path to persistent database. If provided, uses RocksDB.
    #[arg(long, env = "PAYFLOW_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Seconds an idempotency key is remembered
    #[arg(long, env = "PAYFLOW_IDEMPOTENCY_TTL_SECS", default_value_t = IDEMPOTENCY_TTL_SECONDS)]
    pub idempotency_ttl_secs: i64,

    /// Probability that a payment completes rather than fails
    #[arg(
        long,
        env = "PAYFLOW_SUCCESS_RATE",
        default_value_t = DEFAULT_SUCCESS_RATE,
        value_parser = parse_rate
    )]
    pub success_rate: f64,

    /// Seconds a received message stays hidden before redelivery
    #[arg(
        long,
        env = "PAYFLOW_VISIBILITY_TIMEOUT_SECS",
        default_value_t = DEFAULT_VISIBILITY_TIMEOUT_SECONDS
    )]
    pub visibility_timeout_secs: i64,

    /// Deliveries before a message is dead-lettered
    #[arg(long, env = "PAYFLOW_MAX_RECEIVE_COUNT", default_value_t = DEFAULT_MAX_RECEIVE_COUNT)]
    pub max_receive_count: u32,

    /// Messages the worker receives per poll
    #[arg(long, env = "PAYFLOW_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Milliseconds the worker sleeps when the queue is empty
    #[arg(long, env = "PAYFLOW_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
}

fn parse_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(format!("`{value}` is not between 0.0 and 1.0"));
    }
    Ok(rate)
}

impl ServiceConfig {
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            visibility_timeout: chrono::Duration::seconds(self.visibility_timeout_secs.max(0)),
            max_receive_count: self.max_receive_count.max(1),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            batch_size: self.batch_size.max(1),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn idempotency_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idempotency_ttl_secs.max(0))
    }
}
