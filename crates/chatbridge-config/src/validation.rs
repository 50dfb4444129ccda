// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks run after deserialization.

use crate::diagnostic::ConfigError;
use crate::model::BridgeConfig;

/// Validate a deserialized configuration.
///
/// Collects every violation rather than stopping at the first.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation("storage.database_path must not be empty"));
    }

    let host = config.gateway.host.trim();
    let host_ok = host.parse::<std::net::IpAddr>().is_ok()
        || (!host.is_empty()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-'));
    if !host_ok {
        errors.push(ConfigError::validation(format!(
            "gateway.host `{host}` is not a valid IP address or hostname"
        )));
    }

    let article = &config.article;
    for (key, value) in [
        ("article.title_max_chars", article.title_max_chars),
        ("article.slug_max_chars", article.slug_max_chars),
        ("article.body_max_chars", article.body_max_chars),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!("{key} must be greater than 0")));
        }
    }
    if article.title_break_min >= article.title_max_chars {
        errors.push(ConfigError::validation(format!(
            "article.title_break_min ({}) must be less than article.title_max_chars ({})",
            article.title_break_min, article.title_max_chars
        )));
    }

    if config.openai.max_output_tokens == 0 {
        errors.push(ConfigError::validation(
            "openai.max_output_tokens must be greater than 0",
        ));
    }

    let storage = &config.storage;
    if storage.claim_poll_ms == 0 || storage.claim_poll_ms > storage.claim_wait_ms {
        errors.push(ConfigError::validation(format!(
            "storage.claim_poll_ms must be between 1 and storage.claim_wait_ms ({}), got {}",
            storage.claim_wait_ms, storage.claim_poll_ms
        )));
    }

    for (key, value) in [
        ("slack.api_base_url", Some(&config.slack.api_base_url)),
        ("openai.base_url", Some(&config.openai.base_url)),
        ("crm.messages_url", config.crm.messages_url.as_ref()),
        ("crm.articles_url", config.crm.articles_url.as_ref()),
    ] {
        if let Some(raw) = value
            && let Err(e) = url::Url::parse(raw)
        {
            errors.push(ConfigError::validation(format!(
                "{key} `{raw}` is not a valid URL: {e}"
            )));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
