//! High-level entry points: embed text with one model, a stack of models, or
//! into document vectors.
//!
//! ```no_run
//! use easynlp::config::EasyConfig;
//! use easynlp::easy::EasyWordEmbeddings;
//!
//! let config = EasyConfig::load()?;
//! let mut embeddings = EasyWordEmbeddings::from_config(&config)?;
//! let results = embeddings.embed_text("Paris is the capital of France", "bert-base-cased")?;
//! println!("{}", results[0]);
//! # Ok::<(), easynlp::Error>(())
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::{DocumentConfig, EasyConfig};
use crate::embedding::document::{DocumentPoolEmbeddings, DocumentRnnEmbeddings};
use crate::embedding::stacked::StackedEmbeddings;
use crate::embedding::Embeddings;
use crate::error::{Error, Result};
use crate::hub::ModelReference;
use crate::resolver::ModelResolver;
use crate::result::{flatten_results, DetailLevel, EmbeddingResult};
use crate::sentence::{Sentence, TextInput};

fn wrap(sentences: Vec<Sentence>) -> Vec<EmbeddingResult> {
    sentences.into_iter().map(EmbeddingResult::new).collect()
}

/// Load every reference uncached, shared between the backends built on them.
fn load_all(resolver: &ModelResolver, models: &[ModelReference]) -> Result<Vec<Arc<dyn Embeddings>>> {
    if models.is_empty() {
        return Err(Error::InvalidInput("at least one model is required".into()));
    }
    models
        .iter()
        .map(|m| resolver.build(m).map(Arc::from))
        .collect()
}

/// Word embeddings from any model the resolver can find. Backends stay loaded
/// for the lifetime of the instance.
#[derive(Debug)]
pub struct EasyWordEmbeddings {
    resolver: ModelResolver,
}

impl EasyWordEmbeddings {
    pub fn new(resolver: ModelResolver) -> Self {
        Self { resolver }
    }

    pub fn from_config(config: &EasyConfig) -> Result<Self> {
        Ok(Self::new(ModelResolver::from_config(config)?))
    }

    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    /// Embed `text` with `model`, attaching the vectors to the returned sentences.
    pub fn embed_text_raw(
        &mut self,
        text: impl Into<TextInput>,
        model: impl Into<ModelReference>,
    ) -> Result<Vec<Sentence>> {
        let mut sentences = text.into().into_sentences()?;
        let model = model.into();
        let backend = self.resolver.resolve(&model)?;
        backend.embed(&mut sentences)?;
        Ok(sentences)
    }

    pub fn embed_text(
        &mut self,
        text: impl Into<TextInput>,
        model: impl Into<ModelReference>,
    ) -> Result<Vec<EmbeddingResult>> {
        Ok(wrap(self.embed_text_raw(text, model)?))
    }

    pub fn embed_text_with_detail(
        &mut self,
        text: impl Into<TextInput>,
        model: impl Into<ModelReference>,
        level: DetailLevel,
    ) -> Result<Vec<Map<String, Value>>> {
        flatten_results(self.embed_text_raw(text, model)?, level)
    }

    /// Run every model in `models` over the same sentences, in order. With an
    /// empty list, every model this instance has already loaded is used.
    pub fn embed_all_raw(
        &mut self,
        text: impl Into<TextInput>,
        models: &[ModelReference],
    ) -> Result<Vec<Sentence>> {
        let mut sentences = text.into().into_sentences()?;
        let models = if models.is_empty() {
            self.resolver.cached_references()
        } else {
            models.to_vec()
        };
        for model in &models {
            self.resolver.resolve(model)?.embed(&mut sentences)?;
        }
        Ok(sentences)
    }

    pub fn embed_all(
        &mut self,
        text: impl Into<TextInput>,
        models: &[ModelReference],
    ) -> Result<Vec<EmbeddingResult>> {
        Ok(wrap(self.embed_all_raw(text, models)?))
    }

    pub fn embed_all_with_detail(
        &mut self,
        text: impl Into<TextInput>,
        models: &[ModelReference],
        level: DetailLevel,
    ) -> Result<Vec<Map<String, Value>>> {
        flatten_results(self.embed_all_raw(text, models)?, level)
    }
}

/// Several models whose token vectors are concatenated.
#[derive(Debug)]
pub struct EasyStackedEmbeddings {
    stack: StackedEmbeddings,
}

impl EasyStackedEmbeddings {
    pub fn new(resolver: &ModelResolver, models: &[ModelReference]) -> Result<Self> {
        tracing::info!(models = models.len(), "loading stacked embeddings");
        let stack = StackedEmbeddings::new(load_all(resolver, models)?)?;
        Ok(Self { stack })
    }

    pub fn embedding_length(&self) -> usize {
        self.stack.embedding_length()
    }

    pub fn embed_text(&self, text: impl Into<TextInput>) -> Result<Vec<EmbeddingResult>> {
        let mut sentences = text.into().into_sentences()?;
        self.stack.embed(&mut sentences)?;
        Ok(wrap(sentences))
    }

    pub fn embed_text_with_detail(
        &self,
        text: impl Into<TextInput>,
        level: DetailLevel,
    ) -> Result<Vec<Map<String, Value>>> {
        let mut sentences = text.into().into_sentences()?;
        self.stack.embed(&mut sentences)?;
        flatten_results(sentences, level)
    }
}

/// Which document embeddings [`EasyDocumentEmbeddings`] builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentMethod {
    Pool,
    Rnn,
}

impl std::str::FromStr for DocumentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pool" => Ok(Self::Pool),
            "rnn" => Ok(Self::Rnn),
            _ => Err(format!("document method must be pool or rnn, got {s}")),
        }
    }
}

/// Both methods, the default.
pub const ALL_METHODS: &[DocumentMethod] = &[DocumentMethod::Rnn, DocumentMethod::Pool];

/// Sentence vectors from pooled or RNN-encoded word embeddings.
#[derive(Debug)]
pub struct EasyDocumentEmbeddings {
    pool: Option<DocumentPoolEmbeddings>,
    rnn: Option<DocumentRnnEmbeddings>,
}

impl EasyDocumentEmbeddings {
    /// Load `models` once and build the requested `methods` over them.
    pub fn new(
        resolver: &ModelResolver,
        models: &[ModelReference],
        methods: &[DocumentMethod],
        config: &DocumentConfig,
    ) -> Result<Self> {
        if methods.is_empty() {
            return Err(Error::InvalidInput("at least one document method is required".into()));
        }
        let embeddings = load_all(resolver, models)?;

        let pool = if methods.contains(&DocumentMethod::Pool) {
            let pool = DocumentPoolEmbeddings::new(embeddings.clone(), &config.pool)?;
            tracing::info!(pooling = ?pool.pooling(), "pooled document embeddings loaded");
            Some(pool)
        } else {
            None
        };
        let rnn = if methods.contains(&DocumentMethod::Rnn) {
            let rnn = DocumentRnnEmbeddings::new(embeddings, &config.rnn)?;
            tracing::info!(rnn_type = ?rnn.rnn_type(), "rnn document embeddings loaded");
            Some(rnn)
        } else {
            None
        };
        Ok(Self { pool, rnn })
    }

    fn pool(&self) -> Result<&DocumentPoolEmbeddings> {
        self.pool.as_ref().ok_or_else(|| {
            Error::InvalidInput("pool document embeddings were not loaded".into())
        })
    }

    fn rnn(&self) -> Result<&DocumentRnnEmbeddings> {
        self.rnn.as_ref().ok_or_else(|| {
            Error::InvalidInput("rnn document embeddings were not loaded".into())
        })
    }

    pub fn embed_pool(&self, text: impl Into<TextInput>) -> Result<Vec<EmbeddingResult>> {
        Ok(wrap(embed_with(self.pool()?, text)?))
    }

    pub fn embed_pool_with_detail(
        &self,
        text: impl Into<TextInput>,
        level: DetailLevel,
    ) -> Result<Vec<Map<String, Value>>> {
        flatten_results(embed_with(self.pool()?, text)?, level)
    }

    pub fn embed_rnn(&self, text: impl Into<TextInput>) -> Result<Vec<EmbeddingResult>> {
        Ok(wrap(embed_with(self.rnn()?, text)?))
    }

    pub fn embed_rnn_with_detail(
        &self,
        text: impl Into<TextInput>,
        level: DetailLevel,
    ) -> Result<Vec<Map<String, Value>>> {
        flatten_results(embed_with(self.rnn()?, text)?, level)
    }
}

fn embed_with(backend: &dyn Embeddings, text: impl Into<TextInput>) -> Result<Vec<Sentence>> {
    let mut sentences = text.into().into_sentences()?;
    backend.embed(&mut sentences)?;
    Ok(sentences)
}
