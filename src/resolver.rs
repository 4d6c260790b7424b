//! Model resolution: from a [`ModelReference`] to a loaded backend.
//!
//! - Hugging Face record: transformer word embeddings under the record name.
//! - Flair record: the `flairNLP/` prefix is stripped and static word
//!   embeddings are tried first; if that fails, the contextual backend is
//!   loaded under the same name. If both fail, [`Error::BackendUnavailable`]
//!   carries both causes.
//! - Bare key: the Flair hub is searched, then the Hugging Face hub. The first
//!   hit is dispatched as above. No hit is [`Error::ModelNotFound`].
//!
//! [`ModelResolver::resolve`] memoizes backends per reference. The cache is
//! never evicted.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::debug;

use crate::config::EasyConfig;
use crate::embedding::{BackendFactory, Embeddings, LocalBackendFactory};
use crate::error::{Error, Result};
use crate::hub::flair::{strip_provider_prefix, FlairModelHub};
use crate::hub::hf::HfModelHub;
use crate::hub::{ModelHub, ModelRecord, ModelReference};

/// Hubs and the backend factory.
struct Dispatch {
    flair_hub: Box<dyn ModelHub>,
    hf_hub: Box<dyn ModelHub>,
    factory: Box<dyn BackendFactory>,
}

impl Dispatch {
    fn build(&self, reference: &ModelReference) -> Result<Box<dyn Embeddings>> {
        match reference {
            ModelReference::HuggingFace(record) => self.transformer(record),
            ModelReference::Flair(record) => self.flair(record),
            ModelReference::Key(key) => {
                if let Some(record) = self.flair_hub.search_model_by_name(key, true)?.into_iter().next() {
                    debug!(key, model = %record.name, "resolved on flair hub");
                    return self.flair(&record);
                }
                if let Some(record) = self.hf_hub.search_model_by_name(key, true)?.into_iter().next() {
                    debug!(key, model = %record.name, "resolved on hugging face hub");
                    return self.transformer(&record);
                }
                Err(Error::ModelNotFound { key: key.clone() })
            }
        }
    }

    fn transformer(&self, record: &ModelRecord) -> Result<Box<dyn Embeddings>> {
        self.factory.transformer(&record.name)
    }

    fn flair(&self, record: &ModelRecord) -> Result<Box<dyn Embeddings>> {
        let name = strip_provider_prefix(&record.name);
        match self.factory.static_word(name) {
            Ok(backend) => Ok(backend),
            Err(static_err) => {
                debug!(model = name, error = %static_err, "no static embeddings, loading contextual embeddings");
                self.factory
                    .contextual(name)
                    .map_err(|contextual_err| Error::BackendUnavailable {
                        model: name.to_string(),
                        static_error: static_err.to_string(),
                        contextual_error: contextual_err.to_string(),
                    })
            }
        }
    }
}

pub struct ModelResolver {
    dispatch: Dispatch,
    cache: BTreeMap<ModelReference, Box<dyn Embeddings>>,
}

impl ModelResolver {
    pub fn new(
        flair_hub: Box<dyn ModelHub>,
        hf_hub: Box<dyn ModelHub>,
        factory: Box<dyn BackendFactory>,
    ) -> Self {
        Self {
            dispatch: Dispatch {
                flair_hub,
                hf_hub,
                factory,
            },
            cache: BTreeMap::new(),
        }
    }

    /// Resolver over the Flair catalog, the configured Hugging Face endpoint,
    /// and backends loaded from the local model cache.
    pub fn from_config(config: &EasyConfig) -> Result<Self> {
        Ok(Self::new(
            Box::new(FlairModelHub::with_user_models(config.hub.flair_user_models.clone())),
            Box::new(HfModelHub::new(&config.hub)?),
            Box::new(LocalBackendFactory::new(config)),
        ))
    }

    /// Build a fresh backend for `reference`, bypassing the cache.
    pub fn build(&self, reference: &ModelReference) -> Result<Box<dyn Embeddings>> {
        self.dispatch.build(reference)
    }

    /// Backend for `reference`, built on first use and cached afterwards.
    pub fn resolve(&mut self, reference: &ModelReference) -> Result<&dyn Embeddings> {
        match self.cache.entry(reference.clone()) {
            Entry::Occupied(entry) => {
                debug!(model = %reference, "using cached backend");
                Ok(&**entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let backend = self.dispatch.build(reference)?;
                tracing::info!(
                    model = %reference,
                    backend = backend.name(),
                    kind = ?backend.kind(),
                    "backend loaded"
                );
                Ok(&**entry.insert(backend))
            }
        }
    }

    /// References with a cached backend, in sorted order.
    pub fn cached_references(&self) -> Vec<ModelReference> {
        self.cache.keys().cloned().collect()
    }

    pub fn is_cached(&self, reference: &ModelReference) -> bool {
        self.cache.contains_key(reference)
    }
}

impl std::fmt::Debug for ModelResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelResolver")
            .field("cached", &self.cache.keys().collect::<Vec<_>>())
            .finish()
    }
}
