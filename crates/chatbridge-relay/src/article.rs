// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-processing of completion output into a bounded article.
//!
//! Everything here is pure apart from the slug suffix clock.

use std::sync::atomic::{AtomicI64, Ordering};

use chatbridge_config::model::ArticleConfig;
use chatbridge_core::GeneratedArticle;

const FALLBACK_TITLE: &str = "Knowledge article";
const FALLBACK_SLUG: &str = "article";

/// Character limits applied to generated articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArticleLimits {
    pub title_max_chars: usize,
    pub title_break_min: usize,
    pub slug_max_chars: usize,
    pub body_max_chars: usize,
}

impl ArticleLimits {
    pub fn from_config(config: &ArticleConfig) -> Self {
        Self {
            title_max_chars: config.title_max_chars,
            title_break_min: config.title_break_min,
            slug_max_chars: config.slug_max_chars,
            body_max_chars: config.body_max_chars,
        }
    }
}

impl Default for ArticleLimits {
    fn default() -> Self {
        Self::from_config(&ArticleConfig::default())
    }
}

/// Title from the leading characters of `text`.
///
/// Takes at most `title_max_chars` characters, cuts at the first line break
/// found at or after `title_break_min`, then collapses whitespace runs to a
/// single space.
pub fn derive_title(text: &str, limits: &ArticleLimits) -> String {
    let head: Vec<char> = text.trim().chars().take(limits.title_max_chars).collect();
    let end = head
        .iter()
        .enumerate()
        .skip(limits.title_break_min)
        .find(|(_, c)| **c == '\n')
        .map_or(head.len(), |(i, _)| i);

    let title = head[..end]
        .iter()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

/// URL-safe slug for `title` without the uniqueness suffix.
pub fn slug_base(title: &str, max_chars: usize) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("-");
    let truncated: String = joined.chars().take(max_chars).collect();
    let trimmed = truncated.trim_matches('-');

    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Slug for `title` with a suffix that never repeats within this process.
pub fn derive_slug(title: &str, limits: &ArticleLimits) -> String {
    format!("{}-{}", slug_base(title, limits.slug_max_chars), next_suffix())
}

/// Hard cut at `limit` characters.
pub fn truncate_body(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Title, slug and body for one completion.
pub fn build_article(text: &str, limits: &ArticleLimits) -> GeneratedArticle {
    let title = derive_title(text, limits);
    let url_slug = derive_slug(&title, limits);
    GeneratedArticle {
        title,
        url_slug,
        body: truncate_body(text, limits.body_max_chars),
    }
}

static LAST_SUFFIX: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp, bumped past the previous value when the clock
/// has not advanced.
fn next_suffix() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let prev = LAST_SUFFIX
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(prev + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn title_cuts_at_line_break_past_midpoint() {
        let text = format!("{}\n{}", "a".repeat(60), "b".repeat(59));
        assert_eq!(text.chars().count(), 120);

        let title = derive_title(&text, &ArticleLimits::default());
        assert_eq!(title, "a".repeat(60));
    }

    #[test]
    fn early_line_break_is_collapsed_not_cut() {
        let text = format!("Short line\n{}", "word ".repeat(30));
        let title = derive_title(&text, &ArticleLimits::default());
        assert!(title.starts_with("Short line word"));
        assert!(title.chars().count() <= 100);
        assert!(!title.contains('\n'));
    }

    #[test]
    fn title_collapses_whitespace() {
        let title = derive_title("  How   to\treset\r\n a password  ", &ArticleLimits::default());
        assert_eq!(title, "How to reset a password");
    }

    #[test]
    fn blank_text_gets_fallback_title() {
        assert_eq!(derive_title("   \n ", &ArticleLimits::default()), FALLBACK_TITLE);
    }

    #[test]
    fn slug_strips_punctuation_and_joins_words() {
        let slug = derive_slug("Hello, World!  Foo", &ArticleLimits::default());
        let (base, suffix) = slug.rsplit_once('-').unwrap();
        assert_eq!(base, "Hello-World-Foo");
        assert!(suffix.parse::<i64>().is_ok());
    }

    #[test]
    fn slug_base_never_ends_with_hyphen_after_truncation() {
        let title = format!("{} {}", "a".repeat(69), "bbbb");
        let base = slug_base(&title, 70);
        assert_eq!(base, "a".repeat(69));
    }

    #[test]
    fn punctuation_only_title_gets_fallback_slug() {
        assert_eq!(slug_base("?!* ---", 70), FALLBACK_SLUG);
    }

    #[test]
    fn repeated_slugs_never_collide() {
        let limits = ArticleLimits::default();
        let a = derive_slug("Same title", &limits);
        let b = derive_slug("Same title", &limits);
        assert_ne!(a, b);
    }

    #[test]
    fn body_is_cut_on_char_boundary() {
        assert_eq!(truncate_body("héllo wörld", 4), "héll");
        assert_eq!(truncate_body("short", 2000), "short");
    }

    #[test]
    fn article_respects_limits() {
        let text = "x".repeat(5000);
        let article = build_article(&text, &ArticleLimits::default());
        assert_eq!(article.title.chars().count(), 100);
        assert_eq!(article.body.chars().count(), 2000);
    }

    proptest! {
        #[test]
        fn slug_base_is_url_safe_and_bounded(title in ".{0,200}") {
            let base = slug_base(&title, 70);
            prop_assert!(base.chars().count() <= 70);
            prop_assert!(!base.starts_with('-') && !base.ends_with('-'));
            prop_assert!(base.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
        }

        #[test]
        fn title_is_bounded_and_single_spaced(text in "(?s).{0,300}") {
            let title = derive_title(&text, &ArticleLimits::default());
            prop_assert!(title.chars().count() <= 100);
            prop_assert!(!title.contains("  "));
            prop_assert!(!title.contains('\n'));
        }
    }
}
