//! Catalog hub for Flair-style embeddings.
//!
//! Flair embeddings are published under the `flairNLP/` provider prefix. The
//! catalog lists the static word-vector tables and the contextual character
//! language models; user entries from config are searched when
//! `user_uploaded` is set.

use super::{exact_first, HubOrigin, ModelHub, ModelRecord};
use crate::error::Result;

/// Provider prefix of every Flair catalog name.
pub const FLAIR_PREFIX: &str = "flairNLP/";

/// Names served as static word-vector tables.
pub const STATIC_EMBEDDINGS: &[&str] = &[
    "glove", "turian", "extvec", "crawl", "news", "twitter", "en", "en-crawl", "en-glove",
    "de", "de-crawl", "fr", "fr-crawl", "es", "es-crawl", "it", "it-crawl", "nl", "nl-crawl",
    "pt", "pt-crawl", "sv", "sv-crawl", "pl", "pl-crawl", "ru", "ru-crawl", "fi", "fi-crawl",
];

/// Names served as contextual character language models.
pub const CONTEXTUAL_EMBEDDINGS: &[&str] = &[
    "news-forward", "news-backward", "news-forward-fast", "news-backward-fast",
    "mix-forward", "mix-backward", "multi-forward", "multi-backward",
    "multi-forward-fast", "multi-backward-fast", "de-forward", "de-backward",
    "fr-forward", "fr-backward", "es-forward", "es-backward", "nl-forward", "nl-backward",
    "pubmed-forward", "pubmed-backward",
];

/// Remove the `flairNLP/` provider prefix, if present.
pub fn strip_provider_prefix(name: &str) -> &str {
    name.strip_prefix(FLAIR_PREFIX).unwrap_or(name)
}

pub struct FlairModelHub {
    user_models: Vec<String>,
}

impl FlairModelHub {
    pub fn new() -> Self {
        Self {
            user_models: Vec::new(),
        }
    }

    /// Catalog extended with user-provided embedding names.
    pub fn with_user_models(user_models: Vec<String>) -> Self {
        Self { user_models }
    }

    fn official(&self) -> impl Iterator<Item = &str> {
        STATIC_EMBEDDINGS
            .iter()
            .chain(CONTEXTUAL_EMBEDDINGS.iter())
            .copied()
    }
}

impl Default for FlairModelHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelHub for FlairModelHub {
    fn search_model_by_name(&self, name: &str, user_uploaded: bool) -> Result<Vec<ModelRecord>> {
        let query = strip_provider_prefix(name).to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let user = self
            .user_models
            .iter()
            .map(|m| strip_provider_prefix(m))
            .filter(|_| user_uploaded);

        let mut records: Vec<ModelRecord> = Vec::new();
        for candidate in self.official().chain(user) {
            if !candidate.to_lowercase().contains(&query) {
                continue;
            }
            let full = format!("{FLAIR_PREFIX}{candidate}");
            if records.iter().all(|r| r.name != full) {
                records.push(ModelRecord::new(full, HubOrigin::Flair));
            }
        }

        exact_first(&mut records, &format!("{FLAIR_PREFIX}{query}"));
        tracing::debug!(query = %name, hits = records.len(), "flair hub search");
        Ok(records)
    }
}
