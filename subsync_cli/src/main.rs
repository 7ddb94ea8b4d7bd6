use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use subsync_cli::config::{ConfigManager, get_config};
use subsync_cli::{ResyncMode, SyncOptions, SyncOrchestrator, auth, paths};

#[derive(Parser)]
#[command(name = "subsync")]
#[command(
    author,
    version,
    about = "Subtitle Synchronizer - fetch missing subtitles for a video library",
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch subtitles for every video below a directory
    Sync {
        /// Library directory to scan
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Exclude patterns (glob patterns, can be specified multiple times)
        #[arg(short = 'e', long = "exclude", value_name = "PATTERN")]
        exclude_patterns: Vec<String>,

        /// Also re-fetch videos whose subtitle was not fetched by subsync
        #[arg(long)]
        resync: bool,

        /// Re-fetch subtitles for every video
        #[arg(long)]
        resync_all: bool,

        /// Exit once the queue drains instead of waiting for Ctrl-C
        #[arg(long)]
        exit: bool,

        /// Number of concurrent fetches
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        workers: Option<u64>,

        /// Subtitle languages, comma separated (e.g. eng,swe)
        #[arg(short, long)]
        languages: Option<String>,

        /// Sync list file (default: .sync-cache in the library root)
        #[arg(long, value_name = "FILE")]
        sync_list: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Manage OpenSubtitles credentials
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., client.concurrent_workers)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., client.languages)
        key: String,
        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,

    /// Show the configuration file path
    Path,
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Prompt for credentials and store them
    Login,

    /// Remove stored credentials
    Logout,

    /// Show authentication status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on debug flag
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Warn)
            .filter_module("subsync_core", log::LevelFilter::Debug)
            .filter_module("subsync_cli", log::LevelFilter::Debug)
            .filter_module("subsync", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Commands::Sync {
            dir,
            exclude_patterns,
            resync,
            resync_all,
            exit,
            workers,
            languages,
            sync_list,
        } => {
            let mut config = get_config()?;
            config.apply_cli_overrides(
                workers.map(|w| w as usize),
                languages.as_deref(),
            );
            if !config.output.color_enabled {
                colored::control::set_override(false);
            }

            let options = SyncOptions {
                root: dir,
                exclude_patterns,
                mode: ResyncMode::from_flags(resync, resync_all),
                exit_when_done: exit,
                sync_list,
            };

            let started = Instant::now();
            let summary = SyncOrchestrator::new(config, options).run().await?;
            log::info!(
                "Sync finished in {:.1?}: {} processed, {} failed, {} skipped",
                started.elapsed(),
                summary.processed,
                summary.failed.len(),
                summary.skipped
            );
        }
        Commands::Config { command } => {
            config_command(command)?;
        }
        Commands::Auth { command } => {
            auth_command(command).await?;
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
        }
    }

    Ok(())
}

fn config_command(command: ConfigCommand) -> Result<()> {
    let mut manager = ConfigManager::new();

    match command {
        ConfigCommand::Get { key } => match manager.get(&key) {
            Ok(value) => {
                println!("{value}");
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {e}").red());
                std::process::exit(1);
            }
        },
        ConfigCommand::Set { key, value } => match manager.set(&key, &value) {
            Ok(()) => {
                eprintln!("{}", format!("Set {key} = {value}").green());
                eprintln!(
                    "Configuration saved to: {}",
                    manager.get_config_path().display()
                );
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {e:#}").red());
                std::process::exit(1);
            }
        },
        ConfigCommand::List => {
            let items = manager.list().context("Failed to list configuration")?;
            eprintln!("{}", "Configuration:".bold().blue());
            eprintln!("Config file: {}", manager.get_config_path().display());
            eprintln!();

            // Items arrive sorted, so sections come out grouped
            let mut current_section = None;
            for (key, value) in items {
                let (section, field) = key.split_once('.').unwrap_or(("general", key.as_str()));
                if current_section.as_deref() != Some(section) {
                    if current_section.is_some() {
                        eprintln!();
                    }
                    eprintln!("[{}]", section.yellow());
                    current_section = Some(section.to_string());
                }
                eprintln!("  {} = {}", field.cyan(), value);
            }
        }
        ConfigCommand::Path => {
            println!("{}", manager.get_config_path().display());
        }
    }

    Ok(())
}

async fn auth_command(command: AuthCommand) -> Result<()> {
    let path = paths::get_auth_path();
    match command {
        AuthCommand::Login => auth::login(&path).await,
        AuthCommand::Logout => auth::logout(&path).await,
        AuthCommand::Status => auth::status(&path).await,
    }
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
