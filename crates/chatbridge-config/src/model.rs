// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so that a misspelled key
//! is reported at startup instead of silently falling back to a default.

use serde::{Deserialize, Serialize};

/// Top-level Chatbridge configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub bridge: BridgeSection,

    /// Chat platform (Slack Web API) settings.
    #[serde(default)]
    pub slack: SlackConfig,

    /// Completion service settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Article post-processing limits.
    #[serde(default)]
    pub article: ArticleConfig,

    /// Mapping and operation store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// CRM webhook endpoints.
    #[serde(default)]
    pub crm: CrmConfig,
}

/// Process identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeSection {
    #[serde(default = "default_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_name() -> String {
    "chatbridge".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Slack Web API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`). `None` falls back to `SLACK_BOT_TOKEN`.
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default = "default_slack_api_base_url")]
    pub api_base_url: String,

    /// Channel used when an inbound event names none and no mapping exists.
    #[serde(default)]
    pub default_channel: Option<String>,

    /// Icon for messages not posted as a quoted identity.
    #[serde(default = "default_icon_emoji")]
    pub icon_emoji: String,

    /// Metadata event type marking conversation content.
    #[serde(default = "default_content_tag")]
    pub content_tag: String,

    /// Show a "Reply" control under relayed external messages.
    #[serde(default = "default_reply_button")]
    pub reply_button: bool,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: default_slack_api_base_url(),
            default_channel: None,
            icon_emoji: default_icon_emoji(),
            content_tag: default_content_tag(),
            reply_button: default_reply_button(),
        }
    }
}

fn default_slack_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_icon_emoji() -> String {
    ":speech_balloon:".to_string()
}

fn default_content_tag() -> String {
    "conversation_content".to_string()
}

fn default_reply_button() -> bool {
    true
}

/// Completion service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. `None` falls back to `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Output budget per completion; longer output is truncated by the service.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_openai_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_openai_timeout(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_max_output_tokens() -> u32 {
    2000
}

fn default_openai_timeout() -> u64 {
    120
}

/// Limits applied when turning a completion into an article.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArticleConfig {
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    /// A line break at or after this position shortens the title.
    #[serde(default = "default_title_break_min")]
    pub title_break_min: usize,

    /// Slug length before the uniqueness suffix.
    #[serde(default = "default_slug_max_chars")]
    pub slug_max_chars: usize,

    #[serde(default = "default_body_max_chars")]
    pub body_max_chars: usize,

    /// Replaces the built-in summarization instruction.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            title_max_chars: default_title_max_chars(),
            title_break_min: default_title_break_min(),
            slug_max_chars: default_slug_max_chars(),
            body_max_chars: default_body_max_chars(),
            system_prompt: None,
        }
    }
}

fn default_title_max_chars() -> usize {
    100
}

fn default_title_break_min() -> usize {
    50
}

fn default_slug_max_chars() -> usize {
    70
}

fn default_body_max_chars() -> usize {
    2000
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a concurrent first message waits for the thread root.
    #[serde(default = "default_claim_wait_ms")]
    pub claim_wait_ms: u64,

    #[serde(default = "default_claim_poll_ms")]
    pub claim_poll_ms: u64,

    /// Age after which an unfinished claim may be taken over.
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            claim_wait_ms: default_claim_wait_ms(),
            claim_poll_ms: default_claim_poll_ms(),
            claim_ttl_secs: default_claim_ttl_secs(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chatbridge").join("chatbridge.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("chatbridge.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_claim_wait_ms() -> u64 {
    5000
}

fn default_claim_poll_ms() -> u64 {
    50
}

fn default_claim_ttl_secs() -> u64 {
    120
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on `/v1` routes. Unset rejects every request.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// CRM webhook configuration. Unset URLs disable the corresponding handoff.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CrmConfig {
    /// Receives outbound chat replies.
    #[serde(default)]
    pub messages_url: Option<String>,

    /// Receives knowledge drafts.
    #[serde(default)]
    pub articles_url: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_crm_timeout")]
    pub timeout_secs: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            messages_url: None,
            articles_url: None,
            token: None,
            timeout_secs: default_crm_timeout(),
        }
    }
}

fn default_crm_timeout() -> u64 {
    30
}

impl BridgeConfig {
    /// Copy of the configuration with credentials replaced, for display.
    pub fn redacted(&self) -> Self {
        fn mask(v: &Option<String>) -> Option<String> {
            v.as_ref().map(|_| "********".to_string())
        }
        let mut out = self.clone();
        out.slack.bot_token = mask(&self.slack.bot_token);
        out.openai.api_key = mask(&self.openai.api_key);
        out.gateway.bearer_token = mask(&self.gateway.bearer_token);
        out.crm.token = mask(&self.crm.token);
        out
    }
}
