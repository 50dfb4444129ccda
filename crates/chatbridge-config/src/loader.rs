// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/chatbridge/chatbridge.toml`,
//! `~/.config/chatbridge/chatbridge.toml`, `./chatbridge.toml`, then
//! `CHATBRIDGE_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::BridgeConfig;

/// Top-level sections, used to turn `CHATBRIDGE_SLACK_BOT_TOKEN` into `slack.bot_token`.
const SECTIONS: &[&str] = &[
    "bridge", "slack", "openai", "article", "storage", "gateway", "crm",
];

pub(crate) const SYSTEM_PATH: &str = "/etc/chatbridge/chatbridge.toml";
pub(crate) const LOCAL_PATH: &str = "chatbridge.toml";

pub(crate) fn user_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("chatbridge/chatbridge.toml"))
        .unwrap_or_default()
}

/// The full layered figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::file(SYSTEM_PATH))
        .merge(Toml::file(user_path()))
        .merge(Toml::file(LOCAL_PATH))
        .merge(env_provider())
}

/// Load configuration from the standard file hierarchy with env overrides.
pub fn load_config() -> Result<BridgeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the defaults, without env vars.
pub fn load_config_from_str(toml_content: &str) -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env overrides.
pub fn load_config_from_path(path: &Path) -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Maps `CHATBRIDGE_<SECTION>_<KEY>` onto `<section>.<key>`.
///
/// Variable names arrive upper-cased. Only the first underscore after a
/// known section is a separator, so keys such as `bot_token` keep theirs.
fn env_provider() -> Env {
    Env::prefixed("CHATBRIDGE_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or(key_str)
            .into()
    })
}
