// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Chatbridge relay.
//!
//! TOML files layered over compiled defaults, `CHATBRIDGE_*` environment
//! overrides, strict unknown-key rejection and miette diagnostics with typo
//! suggestions.
//!
//! ```no_run
//! use chatbridge_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.gateway.host, config.gateway.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::BridgeConfig;

/// Load configuration from the file hierarchy and validate it.
pub fn load_and_validate() -> Result<BridgeConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            &collect_toml_sources(),
        )),
    }
}

/// Load configuration from an explicit file and validate it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<BridgeConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = std::fs::read_to_string(path)
                .map(|content| vec![(path.display().to_string(), content)])
                .unwrap_or_default();
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<BridgeConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Contents of every config file that exists, for error spans.
fn collect_toml_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|d| d.join(loader::LOCAL_PATH))
        .unwrap_or_else(|_| loader::LOCAL_PATH.into());
    [local, loader::user_path(), loader::SYSTEM_PATH.into()]
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
