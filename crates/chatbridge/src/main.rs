// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatbridge - relays support conversations between an external system and
//! chat threads, and turns resolved threads into knowledge articles.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use chatbridge_config::{BridgeConfig, ConfigError};

/// Chatbridge - conversation relay and knowledge-article pipeline.
#[derive(Parser, Debug)]
#[command(name = "chatbridge", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay and its HTTP gateway.
    Serve,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate configuration and print it with secrets redacted.
    Check,
}

fn load(path: Option<&PathBuf>) -> Result<BridgeConfig, Vec<ConfigError>> {
    match path {
        Some(path) => chatbridge_config::load_and_validate_path(path),
        None => chatbridge_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            chatbridge_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("chatbridge: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config {
            action: ConfigAction::Check,
        }) => match toml::to_string_pretty(&config.redacted()) {
            Ok(rendered) => {
                eprintln!("chatbridge: config is valid");
                println!("{rendered}");
            }
            Err(e) => {
                eprintln!("chatbridge: failed to render config: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("chatbridge: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_check_parses_with_global_path() {
        let cli = Cli::parse_from(["chatbridge", "config", "check", "--config", "/tmp/x.toml"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Check
            })
        ));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
    }

    #[test]
    fn explicit_config_file_is_loaded_and_redacts_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatbridge.toml");
        std::fs::write(
            &path,
            "[slack]\nbot_token = \"xoxb-secret\"\n\n[gateway]\nport = 4000\n",
        )
        .unwrap();

        let config = load(Some(&path)).expect("file should be valid");
        assert_eq!(config.gateway.port, 4000);
        let rendered = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!rendered.contains("xoxb-secret"));
    }
}
