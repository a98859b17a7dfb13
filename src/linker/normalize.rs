//! Attribute normalization for link matching

use std::collections::BTreeSet;

use regex::Regex;

use super::errors::LinkResult;

/// Compiled patterns for comparing entity attributes
#[derive(Debug, Clone)]
pub struct AttributeNormalizer {
    username_noise: Regex,
    name_noise: Regex,
    whitespace: Regex,
    url_prefix: Regex,
}

impl AttributeNormalizer {
    pub fn new() -> LinkResult<Self> {
        Ok(Self {
            username_noise: Regex::new(r"[^a-z0-9_]")?,
            name_noise: Regex::new(r"[^\p{L}\p{N}\s]")?,
            whitespace: Regex::new(r"\s+")?,
            url_prefix: Regex::new(r"^(?:[a-z][a-z0-9+.-]*://)?(?:www\.)?")?,
        })
    }

    /// `@Alice.Smith ` and `alicesmith` compare equal
    pub fn username(&self, raw: &str) -> Option<String> {
        let lower = raw.trim().trim_start_matches('@').to_lowercase();
        let cleaned = self.username_noise.replace_all(&lower, "");
        non_empty(cleaned.into_owned())
    }

    /// Lower-cased, punctuation dropped, whitespace collapsed
    pub fn display_name(&self, raw: &str) -> Option<String> {
        let lower = raw.to_lowercase();
        let cleaned = self.name_noise.replace_all(&lower, " ");
        let collapsed = self.whitespace.replace_all(cleaned.trim(), " ");
        non_empty(collapsed.trim().to_string())
    }

    /// Order-insensitive token set of a display name
    pub fn name_tokens(&self, raw: &str) -> BTreeSet<String> {
        self.display_name(raw)
            .map(|n| n.split(' ').map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Scheme, `www.`, query, fragment and trailing slashes stripped
    pub fn url(&self, raw: &str) -> Option<String> {
        let lower = raw.trim().to_lowercase();
        let without_prefix = self.url_prefix.replace(&lower, "");
        let path = without_prefix
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        non_empty(path.to_string())
    }
}

/// Exact identifiers (addresses, tx hashes, avatar ids) compare trimmed and
/// case-folded.
pub fn identifier(raw: &str) -> Option<String> {
    non_empty(raw.trim().to_lowercase())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
