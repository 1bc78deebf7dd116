//! CLI commands and argument parsing
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, subcommands, and their arguments.

use crate::config::{self, Config};
use crate::error::{PhraseError, Result};
use crate::phrase::{
    GeminiClient, GenerationJob, JobReport, JsonFileStore, PhraseResponse, PhraseService,
    PhraseStore, Scheduler,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "dailyphrase")]
#[command(about = "Generate, store and serve a daily positive phrase")]
#[command(version, author)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print command results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file to use instead of the default location
    #[arg(long = "config", global = true, value_name = "PATH", env = "DAILYPHRASE_CONFIG")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate one phrase and add it to the pool
    Generate,
    /// Rotate to and show the next stored phrase
    ///
    /// The phrase cache only lives for one process, so every invocation
    /// takes the next phrase from storage rather than repeating the last one.
    Phrase,
    /// Generate phrases periodically until interrupted
    Schedule {
        /// Seconds between runs (defaults to the configured interval)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
        /// Run once immediately instead of waiting a full interval
        #[arg(long)]
        run_now: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Write a default configuration file
    Init,
    /// Set a configuration value
    Set {
        /// Setting name
        key: String,
        /// Setting value
        value: String,
    },
    /// Show configuration file path
    Path,
}

impl Cli {
    /// Whether this invocation only touches configuration
    pub fn is_config_command(&self) -> bool {
        matches!(self.command, Commands::Config { .. })
    }

    pub async fn execute(self, config: Config) -> Result<()> {
        let json = self.json;
        match self.command {
            Commands::Generate => execute_generate(&config, json).await,
            Commands::Phrase => execute_phrase(&config, json).await,
            Commands::Schedule { interval, run_now } => {
                execute_schedule(&config, interval, run_now).await
            }
            Commands::Config { command } => {
                execute_config_command(command, config, self.config_file).await
            }
        }
    }
}

fn build_store(config: &Config) -> Arc<dyn PhraseStore> {
    Arc::new(JsonFileStore::new(&config.store_path))
}

fn build_job(config: &Config) -> Result<GenerationJob> {
    config.require_api_key()?;

    let generator = Arc::new(GeminiClient::new(&config.gemini)?);
    let options = config.retry.apply(GenerationJob::default_options());

    let mut job = GenerationJob::new(generator, build_store(config)).with_options(options);
    if let Some(prompt) = &config.prompt {
        job = job.with_prompt(prompt.clone());
    }
    Ok(job)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_report(report: &JobReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    match &report.phrase {
        Some(phrase) if report.success => {
            println!("✅ {} ({})", phrase.message, phrase.category);
            println!(
                "   {} attempt(s) in {}ms",
                report.attempts, report.total_time_ms
            );
        }
        _ => println!("❌ {}", report.message),
    }
    Ok(())
}

async fn execute_generate(config: &Config, json: bool) -> Result<()> {
    let job = build_job(config)?;
    let report = job.run().await;
    print_report(&report, json)?;

    if report.success {
        Ok(())
    } else {
        Err(PhraseError::GenerationFailed {
            attempts: report.attempts,
            message: report.message,
        })
    }
}

async fn execute_phrase(config: &Config, json: bool) -> Result<()> {
    let service = PhraseService::new(build_store(config));

    match service.daily_phrase().await {
        Ok(phrase) => {
            if json {
                print_json(&PhraseResponse::ok(phrase))
            } else {
                println!("{}", phrase.message);
                println!("  ({})", phrase.category);
                Ok(())
            }
        }
        Err(e) => {
            if json {
                print_json(&PhraseResponse::failed(e.to_string()))?;
            }
            Err(e)
        }
    }
}

async fn execute_schedule(config: &Config, interval: Option<u64>, run_now: bool) -> Result<()> {
    let interval = match interval {
        Some(0) => {
            return Err(PhraseError::config("--interval must be greater than zero"));
        }
        Some(secs) => Duration::from_secs(secs),
        None => config.schedule_interval(),
    };

    let job = Arc::new(build_job(config)?);
    let scheduler = Arc::new(Scheduler::new(job, interval));

    let signal_handle = scheduler.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current run");
            signal_handle.notify_one();
        }
    });

    let runs = scheduler.run(run_now).await;
    println!("Scheduler stopped after {runs} run(s)");
    Ok(())
}

async fn execute_config_command(
    command: ConfigCommands,
    config: Config,
    path: Option<PathBuf>,
) -> Result<()> {
    let config_path = match path {
        Some(path) => path,
        None => Config::get_config_path()?,
    };

    match command {
        ConfigCommands::Show => {
            println!("{config}");
        }
        ConfigCommands::Init => {
            if config::init_default_config(&config_path).await? {
                println!("✅ Configuration written to {}", config_path.display());
            } else {
                println!(
                    "Configuration already exists at {}",
                    config_path.display()
                );
            }
        }
        ConfigCommands::Set { key, value } => {
            execute_config_set(&key, &value, &config_path).await?;
        }
        ConfigCommands::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}

async fn execute_config_set(key: &str, value: &str, path: &std::path::Path) -> Result<()> {
    // Start from the file alone so environment overrides are not persisted
    let mut config = config::load_file_or_default(path).await?;
    set_config_value(&mut config, key, value)?;
    config.validate()?;

    config::save_config(&config, path).await?;
    println!("✅ Configuration updated: {key} = {value}");

    Ok(())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| PhraseError::config(format!("Invalid value for {key}: {value}")))
}

/// Apply one `key = value` assignment to `config`
pub fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "debug" => config.debug = value.to_lowercase() == "true" || value == "1",
        "log_json" => config.log_json = value.to_lowercase() == "true" || value == "1",
        "gemini.api_key" => config.gemini.api_key = value.to_string(),
        "gemini.model" => config.gemini.model = value.to_string(),
        "gemini.endpoint" => config.gemini.endpoint = value.to_string(),
        "gemini.request_timeout_secs" => {
            config.gemini.request_timeout_secs = parse_value(key, value)?
        }
        "store_path" => config.store_path = PathBuf::from(value),
        "schedule_interval_secs" => config.schedule_interval_secs = parse_value(key, value)?,
        "prompt" => {
            config.prompt = if value.trim().is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        }
        "retry.max_attempts" => config.retry.max_attempts = parse_value(key, value)?,
        "retry.initial_delay_ms" => config.retry.initial_delay_ms = parse_value(key, value)?,
        "retry.max_delay_ms" => config.retry.max_delay_ms = parse_value(key, value)?,
        "retry.backoff_multiplier" => config.retry.backoff_multiplier = parse_value(key, value)?,
        "retry.jitter_factor" => config.retry.jitter_factor = parse_value(key, value)?,
        _ => {
            return Err(PhraseError::config(format!(
                "Unknown configuration key: {key}. Available keys: debug, log_json, gemini.api_key, gemini.model, gemini.endpoint, gemini.request_timeout_secs, store_path, schedule_interval_secs, prompt, retry.max_attempts, retry.initial_delay_ms, retry.max_delay_ms, retry.backoff_multiplier, retry.jitter_factor"
            )));
        }
    }
    Ok(())
}
