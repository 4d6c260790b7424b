//! Easy embeddings: pick a pretrained model by name and get uniform vectors back.
//!
//! `easynlp` resolves a model key (or a hub record) to a concrete embedding
//! backend, runs it over text, and normalizes the output into
//! [`result::EmbeddingResult`]s that flatten into ordered JSON maps at three
//! levels of detail.
//!
//! | Backend | Source | Vectors |
//! |---------|--------|---------|
//! | **Transformer** | Hugging Face repo with an ONNX export | first sub-token of each word |
//! | **Static word** | Flair catalog name, word2vec/GloVe table | one per vocabulary word |
//! | **Contextual** | Flair catalog name, character LM exported to ONNX | state around each word |
//! | **Stacked** | any of the above | concatenation |
//! | **Document** | pooled or RNN-encoded word vectors | one per sentence |
//!
//! # Resolution
//!
//! A bare key is searched on the Flair catalog first, then on the Hugging
//! Face hub. Flair names try static tables before contextual models. Loaded
//! backends are cached per reference for the lifetime of the resolver.
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`hub`]: model hubs, model references, and asset download
//! - [`embedding`]: backends and the [`embedding::Embeddings`] trait
//! - [`resolver`]: model reference to backend dispatch with memoization
//! - [`result`]: result normalization and detail levels
//! - [`easy`]: word, stacked, and document embedding entry points
//! - [`training`]: dataset preparation for fine-tuning

pub mod config;
pub mod easy;
pub mod embedding;
pub mod error;
pub mod hub;
pub mod resolver;
pub mod result;
pub mod sentence;
pub mod training;

pub use error::{Error, Result};
