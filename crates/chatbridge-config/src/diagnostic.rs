// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converts Figment errors into miette diagnostics with typo suggestions.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with enough context for an annotated report.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(chatbridge::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(chatbridge::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(chatbridge::config::missing_key),
        help("add `{key} = <value>` to chatbridge.toml")
    )]
    MissingKey { key: String },

    /// A value parsed but violates a semantic constraint.
    #[error("validation error: {message}")]
    #[diagnostic(code(chatbridge::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(chatbridge::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation {
            message: message.into(),
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Splits a `figment::Error` into one diagnostic per underlying error.
///
/// `toml_sources` pairs file paths with their contents so that unknown keys
/// can be pointed at in the offending file.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let section: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
                let (span, src) = locate_key(&error, &section, field, toml_sources);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.clone().into_owned(),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: error
                    .path
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

fn locate_key(
    error: &figment::error::Error,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(path)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let path = path.display().to_string();
    let Some((name, content)) = toml_sources.iter().find(|(p, _)| *p == path) else {
        return (None, None);
    };
    match find_key_offset(content, section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` as a key inside the `[section]` table of `content`.
///
/// Top-level keys (empty `section`) are searched from the start.
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let start = match section.first() {
        None => 0,
        Some(name) => {
            let header = format!("[{name}]");
            content.find(&header)? + header.len()
        }
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            break;
        }
        if let Some(rest) = trimmed.strip_prefix(field)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Best-scoring valid key above the similarity threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_content_tag_for_typo() {
        let valid = &["bot_token", "content_tag", "icon_emoji"];
        assert_eq!(
            suggest_key("contnet_tag", valid),
            Some("content_tag".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_unrelated_key() {
        assert_eq!(suggest_key("zzzz", &["model", "base_url"]), None);
    }

    #[test]
    fn finds_key_inside_its_section_only() {
        let content = "[slack]\nmodle = 1\n[openai]\nmodle = \"x\"\n";
        let offset = find_key_offset(content, &["openai".to_string()], "modle").unwrap();
        assert!(offset > content.find("[openai]").unwrap());
        assert_eq!(&content[offset..offset + 5], "modle");
    }

    #[test]
    fn missing_section_yields_none() {
        assert_eq!(find_key_offset("[crm]\n", &["slack".to_string()], "x"), None);
    }
}
