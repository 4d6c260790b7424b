//! Dataset preparation for fine-tuning.
//!
//! - [`categorize`]: label vocabulary.
//! - [`split`]: seeded train/validation splits.
//! - [`datasets`]: tokenized train/valid sets for sequence classification
//!   and language modelling, including block grouping.
//! - [`collate`]: batch padding and masked-LM corruption.

pub mod categorize;
pub mod collate;
pub mod datasets;
pub mod split;

use std::path::Path;

use tokenizers::Tokenizer;

use crate::config::EasyConfig;
use crate::error::{Error, Result};
use crate::hub::download::ensure_tokenizer;

pub use categorize::Categorize;
pub use collate::{Batch, BatchLabels, Collator, DefaultCollator, MaskedLmCollator};
pub use datasets::{
    group_texts, DataLoaders, DEFAULT_MAX_LENGTH, Dataset, Example, Labels, LanguageModelDatasets,
    LanguageModelOptions, SequenceClassificationDatasets, TaskDatasets,
};
pub use split::RandomSplitter;

/// A tokenizer and the name it was loaded under.
#[derive(Clone)]
pub struct NamedTokenizer {
    pub name: String,
    pub tokenizer: Tokenizer,
}

impl NamedTokenizer {
    pub fn new(name: impl Into<String>, tokenizer: Tokenizer) -> Self {
        Self {
            name: name.into(),
            tokenizer,
        }
    }

    /// Load from a `tokenizer.json` file, a directory holding one, or a
    /// Hugging Face repo name (downloaded into the model cache).
    pub fn load(name: &str, config: &EasyConfig) -> Result<Self> {
        let invalid = || {
            Error::InvalidInput(format!(
                "{name} is not a valid pretrained model on the Hugging Face hub or a local model"
            ))
        };
        let local = Path::new(name);
        let path = if local.is_file() {
            local.to_path_buf()
        } else if local.is_dir() {
            local.join("tokenizer.json")
        } else {
            ensure_tokenizer(&config.resolved_cache_dir(), &config.hub.hf_endpoint, name).map_err(
                |e| {
                    tracing::debug!(name, error = %e, "tokenizer download failed");
                    invalid()
                },
            )?
        };
        let tokenizer = Tokenizer::from_file(&path).map_err(|e| {
            tracing::debug!(name, error = %e, "tokenizer parse failed");
            invalid()
        })?;
        Ok(Self::new(name, tokenizer))
    }
}

impl std::fmt::Debug for NamedTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedTokenizer")
            .field("name", &self.name)
            .field("vocab_size", &self.tokenizer.get_vocab_size(true))
            .finish()
    }
}
