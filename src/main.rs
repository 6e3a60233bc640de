//! Taskforce - concurrent agent orchestration runtime
//!
//! Configuration inspection CLI.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use taskforce_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use taskforce_scheduler::SchedulerRegistry;
use taskforce_subagents::ResolvedSubagentConfig;

/// Taskforce CLI.
#[derive(Parser)]
#[command(name = "taskforce")]
#[command(about = "Concurrent agent orchestration runtime")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to taskforce/taskforce.toml in the user config dir)
    #[arg(short, long, global = true, env = "TASKFORCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// Print the subagent settings an agent at a given depth would use
    Resolve {
        /// Nesting depth of the agent (0 = root)
        #[arg(long, default_value_t = 0)]
        depth: u32,

        /// Model of the agent, used when no subagent model is configured
        #[arg(long, default_value = "default")]
        model: String,
    },

    /// Print the admission settings for one or more keys
    Limits {
        /// Admission keys; all configured keys when omitted
        keys: Vec<String>,
    },
}

/// Initialize tracing with console output and an optional daily log file.
fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let console = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let Some(dir) = logging.dir.as_deref() else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console)
            .init();
        return Ok(None);
    };

    let log_dir = ConfigLoader::expand_path(dir);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("taskforce")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file = if logging.json {
        fmt::layer().json().with_writer(non_blocking).boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();

    Ok(Some(guard))
}

fn load_config(path: Option<&Path>) -> Result<(PathBuf, Config)> {
    match path {
        Some(path) => {
            let config = ConfigLoader::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            Ok((path.to_path_buf(), config))
        }
        None => {
            let path = ConfigLoader::default_path();
            let config = ConfigLoader::load_or_default(&path)?;
            Ok((path, config))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (path, config) = load_config(cli.config.as_deref())?;
    let _guard = init_tracing(&config.logging)?;
    debug!("Loaded configuration from {}", path.display());

    match cli.command {
        Commands::Validate => validate(&path, &config),
        Commands::Resolve { depth, model } => resolve(&config, depth, &model),
        Commands::Limits { keys } => limits(&config, keys),
    }
}

fn validate(path: &Path, config: &Config) -> Result<()> {
    let result = ConfigValidator::validate(config);
    for warning in &result.warnings {
        warn!("{}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        eprintln!("error: {}: {}", error.path, error.message);
    }
    if !result.is_valid() {
        bail!(
            "{} has {} error(s)",
            path.display(),
            result.errors.len()
        );
    }
    info!("{} is valid", path.display());
    println!("ok");
    Ok(())
}

fn resolve(config: &Config, depth: u32, model: &str) -> Result<()> {
    let resolved = ResolvedSubagentConfig::resolve(&config.subagents, depth, model);
    let output = serde_json::json!({
        "subagents": resolved,
        "tools_enabled": resolved.tools_enabled(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn limits(config: &Config, keys: Vec<String>) -> Result<()> {
    let registry = SchedulerRegistry::new(config.scheduler.clone(), &config.retry);
    let mut keys = if keys.is_empty() {
        config.scheduler.keys.keys().cloned().collect()
    } else {
        keys
    };
    keys.sort();

    let mut output = serde_json::Map::new();
    output.insert(
        "defaults".to_string(),
        serde_json::to_value(config.scheduler.defaults())?,
    );
    for key in keys {
        let scheduler = registry.get(Some(&key));
        output.insert(
            scheduler.key().to_string(),
            serde_json::to_value(scheduler.settings())?,
        );
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
