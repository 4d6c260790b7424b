//! Error type shared by the resolver, backends, and result normalizer.

use thiserror::Error;

/// Errors surfaced by the public `easynlp` API.
#[derive(Debug, Error)]
pub enum Error {
    /// Neither hub had a model matching the key.
    #[error("embeddings not found for the model key: {key}, check documentation or custom model path to verify specified model")]
    ModelNotFound { key: String },
    /// The name does not denote a static word-embedding table.
    #[error("static word embeddings unavailable: {0}")]
    StaticEmbeddingUnavailable(String),
    /// A Flair name loaded neither as static vectors nor as a contextual model.
    #[error("no backend could load {model}; static word embeddings: {static_error}; contextual model: {contextual_error}")]
    BackendUnavailable {
        model: String,
        static_error: String,
        contextual_error: String,
    },
    /// Token vectors of one sentence disagree on dimensionality.
    #[error("token embeddings have inconsistent shapes: token {index} has {found} dims, expected {expected}")]
    ShapeMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
    /// A batch mixed raw strings and already-built sentences.
    #[error("batch mixes raw text and sentence objects; pass one kind per call")]
    MixedBatch,
    /// Caller supplied arguments that cannot be honoured.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A model hub query failed.
    #[error("hub query failed: {0}")]
    Hub(String),
    /// Model asset download failed.
    #[error("download failed: {0}")]
    Download(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Backend failures (ONNX Runtime, tokenizer, malformed model files).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Hub(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_not_found_names_the_key() {
        let err = Error::ModelNotFound {
            key: "no-such-model".into(),
        };
        assert!(err.to_string().contains("no-such-model"));
    }

    #[test]
    fn shape_mismatch_reports_dims() {
        let err = Error::ShapeMismatch {
            index: 2,
            expected: 4,
            found: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("token 2"));
        assert!(msg.contains("expected 4"));
    }

    #[test]
    fn anyhow_errors_pass_through() {
        let err: Error = anyhow::anyhow!("session lock poisoned").into();
        assert_eq!(err.to_string(), "session lock poisoned");
    }

    #[test]
    fn io_errors_convert() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
