//! Embedding backends.
//!
//! Provides the [`Embeddings`] trait implemented by every backend family:
//! transformer word embeddings ([`transformer`]), static lookup tables
//! ([`word`]), contextual character language models ([`contextual`]), and the
//! combinators [`stacked`] and [`document`]. Backends are built through a
//! [`BackendFactory`] so the resolver never names a concrete type.

pub mod contextual;
pub mod document;
pub mod rnn;
pub mod stacked;
pub mod transformer;
pub mod word;

use std::path::{Path, PathBuf};

use ort::session::Session;

use crate::config::EasyConfig;
use crate::error::Result;
use crate::sentence::{Sentence, Token};

/// Which family a backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Transformer,
    StaticWord,
    Contextual,
    Stacked,
    DocumentPool,
    DocumentRnn,
}

/// Trait for attaching vectors to sentences.
///
/// Embedding happens in place: token (and, for document backends, sentence)
/// vectors are stored under [`Embeddings::name`]. All methods are synchronous.
pub trait Embeddings: Send + Sync {
    /// Name the vectors are stored under.
    fn name(&self) -> &str;

    /// Length of the vector this backend attaches.
    fn embedding_length(&self) -> usize;

    fn kind(&self) -> BackendKind;

    /// Embed every sentence in place.
    fn embed(&self, sentences: &mut [Sentence]) -> Result<()>;

    /// The vector this backend attached to `token`, if any.
    fn token_vector(&self, token: &Token) -> Option<Vec<f32>> {
        token.embeddings().get(self.name()).map(<[f32]>::to_vec)
    }
}

impl<'a> std::fmt::Debug for dyn Embeddings + 'a {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embeddings")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("embedding_length", &self.embedding_length())
            .finish()
    }
}

/// Constructors for the three word-level backend families.
pub trait BackendFactory {
    fn transformer(&self, name: &str) -> Result<Box<dyn Embeddings>>;

    /// Fails with [`crate::Error::StaticEmbeddingUnavailable`] when `name` is not
    /// a static table.
    fn static_word(&self, name: &str) -> Result<Box<dyn Embeddings>>;

    fn contextual(&self, name: &str) -> Result<Box<dyn Embeddings>>;
}

/// Builds real backends from the local model cache, downloading Hugging Face
/// assets on first use.
pub struct LocalBackendFactory {
    cache_dir: PathBuf,
    hf_endpoint: String,
    max_seq_len: usize,
    word_vectors_url: Option<String>,
}

impl LocalBackendFactory {
    pub fn new(config: &EasyConfig) -> Self {
        Self {
            cache_dir: config.resolved_cache_dir(),
            hf_endpoint: config.hub.hf_endpoint.clone(),
            max_seq_len: config.models.max_seq_len,
            word_vectors_url: config.models.word_vectors_url.clone(),
        }
    }
}

impl BackendFactory for LocalBackendFactory {
    fn transformer(&self, name: &str) -> Result<Box<dyn Embeddings>> {
        let local = Path::new(name);
        let assets = if local.is_dir() {
            crate::hub::download::TransformerAssets::in_dir(local)
        } else {
            crate::hub::download::ensure_transformer_assets(&self.cache_dir, &self.hf_endpoint, name)?
        };
        let backend = transformer::TransformerWordEmbeddings::load(name, &assets, self.max_seq_len)?;
        Ok(Box::new(backend))
    }

    fn static_word(&self, name: &str) -> Result<Box<dyn Embeddings>> {
        let backend =
            word::WordEmbeddings::open(name, &self.cache_dir, self.word_vectors_url.as_deref())?;
        Ok(Box::new(backend))
    }

    fn contextual(&self, name: &str) -> Result<Box<dyn Embeddings>> {
        let backend = contextual::ContextualEmbeddings::open(name, &self.cache_dir)?;
        Ok(Box::new(backend))
    }
}

/// Open an ONNX Runtime session with the optimization settings shared by all backends.
pub(crate) fn open_session(model_path: &Path) -> anyhow::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .commit_from_file(model_path)?;
    Ok(session)
}
