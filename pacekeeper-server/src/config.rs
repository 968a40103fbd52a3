//! Server configuration and CLI argument parsing
//!
//! This module handles all server configuration through a flexible system that supports:
//! - Command-line arguments
//! - Environment variables (with PACEKEEPER_ prefix)
//!
//! # Configuration Priority
//!
//! The configuration system follows this precedence order:
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Using CLI arguments
//! pacekeeper --http-port 9090 --grace-period-ms 5000
//!
//! # Using environment variables
//! export PACEKEEPER_HTTP_PORT=8080
//! export PACEKEEPER_STORE=file
//! pacekeeper
//!
//! # Mixed (CLI overrides env)
//! export PACEKEEPER_HTTP_PORT=8080
//! pacekeeper --http-port 9090  # Uses port 9090
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use pacekeeper::PacerConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the server
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP transport configuration
    pub http: HttpConfig,
    /// Durable store configuration
    pub store: StoreConfig,
    /// Shared limiter configuration
    pub limiter: LimiterConfig,
    /// Counter served at `/api`
    pub counter_key: String,
    /// Channel buffer size for actor mailboxes
    pub buffer_size: usize,
    /// Idle actor eviction
    pub sweep: SweepConfig,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

/// Durable store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Type of store to use
    pub store_type: StoreType,
    /// Data file for the file store
    pub path: PathBuf,
}

/// Available store types
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    /// Process-local, lost on restart
    Memory,
    /// JSON document on disk
    File,
}

impl std::str::FromStr for StoreType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreType::Memory),
            "file" => Ok(StoreType::File),
            _ => Err(anyhow!(
                "Invalid store type: {}. Valid options are: memory, file",
                s
            )),
        }
    }
}

/// Shared limiter configuration
///
/// `unit_cost_ms` sets the sustained rate (one consuming request per unit),
/// `grace_period_ms` the burst allowance.
#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    /// Deadline advance per consuming request (milliseconds)
    pub unit_cost_ms: u64,
    /// Backlog tolerated before callers are told to wait (milliseconds)
    pub grace_period_ms: u64,
    /// Limiter key holding the budget shared by every session
    pub key: String,
}

impl LimiterConfig {
    pub fn pacer_config(&self) -> PacerConfig {
        PacerConfig {
            unit_cost: Duration::from_millis(self.unit_cost_ms),
            grace_period: Duration::from_millis(self.grace_period_ms),
        }
    }
}

/// Idle actor eviction
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Seconds without a request before an actor may be stopped
    pub actor_idle_secs: u64,
    /// Seconds between sweeps
    pub interval_secs: u64,
}

impl SweepConfig {
    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.actor_idle_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// PACEKEEPER_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "pacekeeper",
    about = "Per-key actors with a shared admission limiter",
    long_about = "Routes HTTP and WebSocket requests to per-key single-writer actors and paces access to a shared, globally rate-limited resource.\n\nEnvironment variables with PACEKEEPER_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // HTTP Transport
    #[arg(
        long,
        value_name = "HOST",
        help = "HTTP host",
        default_value = "127.0.0.1",
        env = "PACEKEEPER_HTTP_HOST"
    )]
    pub http_host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "HTTP port",
        default_value_t = 8080,
        env = "PACEKEEPER_HTTP_PORT"
    )]
    pub http_port: u16,

    // Store Configuration
    #[arg(
        long,
        value_name = "TYPE",
        help = "Store type: memory, file",
        default_value = "memory",
        env = "PACEKEEPER_STORE"
    )]
    pub store: StoreType,
    #[arg(
        long,
        value_name = "PATH",
        help = "Data file for the file store",
        default_value = "pacekeeper-data.json",
        env = "PACEKEEPER_STORE_PATH"
    )]
    pub store_path: PathBuf,

    // Limiter Configuration
    #[arg(
        long,
        value_name = "MS",
        help = "Deadline advance per consuming request (milliseconds)",
        default_value_t = 10,
        env = "PACEKEEPER_UNIT_COST_MS"
    )]
    pub unit_cost_ms: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Backlog tolerated before callers must wait (milliseconds)",
        default_value_t = 20_000,
        env = "PACEKEEPER_GRACE_PERIOD_MS"
    )]
    pub grace_period_ms: u64,
    #[arg(
        long,
        value_name = "KEY",
        help = "Limiter key for the budget shared by all sessions",
        default_value = "A",
        env = "PACEKEEPER_LIMITER_KEY"
    )]
    pub limiter_key: String,
    #[arg(
        long,
        value_name = "KEY",
        help = "Counter served at /api",
        default_value = "A",
        env = "PACEKEEPER_COUNTER_KEY"
    )]
    pub counter_key: String,

    // General options
    #[arg(
        long,
        value_name = "SIZE",
        help = "Actor mailbox size",
        default_value_t = 1_024,
        env = "PACEKEEPER_BUFFER_SIZE"
    )]
    pub buffer_size: usize,
    #[arg(
        long,
        value_name = "SECS",
        help = "Stop actors that received no request for this long (seconds)",
        default_value_t = 300,
        env = "PACEKEEPER_ACTOR_IDLE_SECS"
    )]
    pub actor_idle_secs: u64,
    #[arg(
        long,
        value_name = "SECS",
        help = "Interval between idle actor sweeps (seconds)",
        default_value_t = 60,
        env = "PACEKEEPER_SWEEP_INTERVAL_SECS"
    )]
    pub sweep_interval_secs: u64,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "PACEKEEPER_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if invalid configuration values are provided.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let config = Self::from_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Build configuration from already parsed arguments
    pub fn from_args(args: Args) -> Self {
        Config {
            http: HttpConfig {
                host: args.http_host,
                port: args.http_port,
            },
            store: StoreConfig {
                store_type: args.store,
                path: args.store_path,
            },
            limiter: LimiterConfig {
                unit_cost_ms: args.unit_cost_ms,
                grace_period_ms: args.grace_period_ms,
                key: args.limiter_key,
            },
            counter_key: args.counter_key,
            buffer_size: args.buffer_size,
            sweep: SweepConfig {
                actor_idle_secs: args.actor_idle_secs,
                interval_secs: args.sweep_interval_secs,
            },
            log_level: args.log_level,
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        self.limiter
            .pacer_config()
            .validate()
            .map_err(|e| anyhow!("{e}. Set --unit-cost-ms to 1 or more"))?;

        if self.buffer_size == 0 {
            return Err(anyhow!("--buffer-size must be greater than zero"));
        }

        if self.sweep.actor_idle_secs == 0 || self.sweep.interval_secs == 0 {
            return Err(anyhow!(
                "--actor-idle-secs and --sweep-interval-secs must be greater than zero"
            ));
        }

        if self.limiter.key.is_empty() || self.counter_key.is_empty() {
            return Err(anyhow!("--limiter-key and --counter-key must not be empty"));
        }

        if self.store.store_type == StoreType::File && self.store.path.as_os_str().is_empty() {
            return Err(anyhow!("--store-path is required for the file store"));
        }

        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("Pacekeeper Environment Variables");
        println!("================================");
        println!();
        println!("All environment variables use the PACEKEEPER_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Transport Configuration:");
        println!("  PACEKEEPER_HTTP_HOST=<host>           HTTP host [default: 127.0.0.1]");
        println!("  PACEKEEPER_HTTP_PORT=<port>           HTTP port [default: 8080]");
        println!();

        println!("Store Configuration:");
        println!("  PACEKEEPER_STORE=<type>               Store type: memory, file [default: memory]");
        println!(
            "  PACEKEEPER_STORE_PATH=<path>          Data file for the file store [default: pacekeeper-data.json]"
        );
        println!();

        println!("Limiter Configuration:");
        println!(
            "  PACEKEEPER_UNIT_COST_MS=<ms>          Deadline advance per consuming request [default: 10]"
        );
        println!(
            "  PACEKEEPER_GRACE_PERIOD_MS=<ms>       Backlog tolerated before waiting [default: 20000]"
        );
        println!("  PACEKEEPER_LIMITER_KEY=<key>          Shared limiter key [default: A]");
        println!("  PACEKEEPER_COUNTER_KEY=<key>          Counter served at /api [default: A]");
        println!();

        println!("General Configuration:");
        println!("  PACEKEEPER_BUFFER_SIZE=<size>         Actor mailbox size [default: 1024]");
        println!(
            "  PACEKEEPER_ACTOR_IDLE_SECS=<secs>     Stop actors idle this long [default: 300]"
        );
        println!(
            "  PACEKEEPER_SWEEP_INTERVAL_SECS=<secs> Interval between idle sweeps [default: 60]"
        );
        println!(
            "  PACEKEEPER_LOG_LEVEL=<level>          Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # Persist counters to disk");
        println!("  export PACEKEEPER_STORE=file");
        println!("  export PACEKEEPER_STORE_PATH=/var/lib/pacekeeper/data.json");
        println!();
        println!("  # 100 consuming requests per second, 5 second burst");
        println!("  export PACEKEEPER_UNIT_COST_MS=10");
        println!("  export PACEKEEPER_GRACE_PERIOD_MS=5000");
        println!();
        println!("  # Run server (CLI args override env vars)");
        println!("  pacekeeper --http-port 9090  # Will use port 9090, not 8080");
    }
}
