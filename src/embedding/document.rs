//! Document embeddings: one vector per sentence built from word vectors.
//!
//! [`DocumentPoolEmbeddings`] pools (optionally projected) token vectors.
//! [`DocumentRnnEmbeddings`] runs a seeded GRU/LSTM over them. Both embed with
//! a [`StackedEmbeddings`] first, so the word-level vectors stay on the tokens.

use std::sync::Arc;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::rnn::{Linear, Rnn, RnnType};
use super::stacked::StackedEmbeddings;
use super::{BackendKind, Embeddings};
use crate::config::{PoolConfig, RnnConfig};
use crate::error::{Error, Result};
use crate::sentence::{Sentence, Token};

pub const POOL_NAME: &str = "document_pool";
pub const RNN_NAME: &str = "document_rnn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    Mean,
    Min,
    Max,
}

impl std::str::FromStr for Pooling {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            _ => Err(format!("pooling must be mean, min or max, got {s}")),
        }
    }
}

/// How token vectors are transformed before pooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FineTuneMode {
    None,
    Linear,
    Nonlinear,
}

impl std::str::FromStr for FineTuneMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "linear" => Ok(Self::Linear),
            "nonlinear" => Ok(Self::Nonlinear),
            _ => Err(format!("fine_tune_mode must be none, linear or nonlinear, got {s}")),
        }
    }
}

/// Stack the vectors `stack` attached to each token into `(tokens, dim)`.
fn token_matrix(stack: &StackedEmbeddings, tokens: &[Token]) -> Result<Array2<f32>> {
    let dim = stack.embedding_length();
    let mut matrix = Array2::zeros((tokens.len(), dim));
    for (i, token) in tokens.iter().enumerate() {
        let vector = stack.token_vector(token).unwrap_or_default();
        if vector.len() != dim {
            return Err(Error::ShapeMismatch {
                index: i,
                expected: dim,
                found: vector.len(),
            });
        }
        matrix.row_mut(i).assign(&Array1::from(vector));
    }
    Ok(matrix)
}

#[derive(Debug)]
pub struct DocumentPoolEmbeddings {
    stack: StackedEmbeddings,
    pooling: Pooling,
    fine_tune_mode: FineTuneMode,
    /// Square projection, identity at construction.
    projection: Option<Array2<f32>>,
}

impl DocumentPoolEmbeddings {
    pub fn new(embeddings: Vec<Arc<dyn Embeddings>>, config: &PoolConfig) -> Result<Self> {
        let pooling = config.pooling.parse().map_err(Error::InvalidInput)?;
        let fine_tune_mode: FineTuneMode = config.fine_tune_mode.parse().map_err(Error::InvalidInput)?;
        let stack = StackedEmbeddings::new(embeddings)?;
        let projection = match fine_tune_mode {
            FineTuneMode::None => None,
            FineTuneMode::Linear | FineTuneMode::Nonlinear => {
                Some(Array2::eye(stack.embedding_length()))
            }
        };
        Ok(Self {
            stack,
            pooling,
            fine_tune_mode,
            projection,
        })
    }

    pub fn pooling(&self) -> Pooling {
        self.pooling
    }

    pub fn fine_tune_mode(&self) -> FineTuneMode {
        self.fine_tune_mode
    }

    fn pool(&self, matrix: Array2<f32>) -> Array1<f32> {
        let mut matrix = match &self.projection {
            Some(w) => matrix.dot(&w.t()),
            None => matrix,
        };
        if self.fine_tune_mode == FineTuneMode::Nonlinear {
            matrix.mapv_inplace(|v| v.max(0.0));
        }
        match self.pooling {
            Pooling::Mean => matrix
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(matrix.ncols())),
            Pooling::Min => matrix.fold_axis(Axis(0), f32::INFINITY, |acc, v| acc.min(*v)),
            Pooling::Max => matrix.fold_axis(Axis(0), f32::NEG_INFINITY, |acc, v| acc.max(*v)),
        }
    }
}

impl Embeddings for DocumentPoolEmbeddings {
    fn name(&self) -> &str {
        POOL_NAME
    }

    fn embedding_length(&self) -> usize {
        self.stack.embedding_length()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::DocumentPool
    }

    fn embed(&self, sentences: &mut [Sentence]) -> Result<()> {
        self.stack.embed(sentences)?;
        for sentence in sentences.iter_mut() {
            if sentence.is_empty() {
                continue;
            }
            let matrix = token_matrix(&self.stack, sentence.tokens())?;
            let pooled = self.pool(matrix);
            sentence.set_embedding(POOL_NAME, pooled.to_vec());
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct DocumentRnnEmbeddings {
    stack: StackedEmbeddings,
    reprojection: Option<Linear>,
    rnn: Rnn,
    rnn_type: RnnType,
}

impl DocumentRnnEmbeddings {
    /// Build with weights drawn from `config.seed`. Dropout settings only
    /// apply during training and are ignored here.
    pub fn new(embeddings: Vec<Arc<dyn Embeddings>>, config: &RnnConfig) -> Result<Self> {
        let rnn_type: RnnType = config.rnn_type.parse().map_err(Error::InvalidInput)?;
        if config.hidden_size == 0 {
            return Err(Error::InvalidInput("hidden_size must be positive".into()));
        }
        let stack = StackedEmbeddings::new(embeddings)?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let word_dim = stack.embedding_length();
        let reprojection = config.reproject_words.then(|| {
            let out = config.reproject_words_dimension.unwrap_or(word_dim);
            Linear::new(&mut rng, word_dim, out)
        });
        let rnn_input = reprojection.as_ref().map_or(word_dim, Linear::output_len);
        let rnn = Rnn::new(
            &mut rng,
            rnn_type,
            rnn_input,
            config.hidden_size,
            config.rnn_layers,
            config.bidirectional,
        );
        tracing::debug!(
            ?rnn_type,
            input = rnn_input,
            hidden = config.hidden_size,
            layers = config.rnn_layers,
            bidirectional = config.bidirectional,
            "document rnn initialized"
        );
        Ok(Self {
            stack,
            reprojection,
            rnn,
            rnn_type,
        })
    }

    pub fn rnn_type(&self) -> RnnType {
        self.rnn_type
    }
}

impl Embeddings for DocumentRnnEmbeddings {
    fn name(&self) -> &str {
        RNN_NAME
    }

    fn embedding_length(&self) -> usize {
        self.rnn.output_len()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::DocumentRnn
    }

    fn embed(&self, sentences: &mut [Sentence]) -> Result<()> {
        self.stack.embed(sentences)?;
        for sentence in sentences.iter_mut() {
            if sentence.is_empty() {
                continue;
            }
            let words = token_matrix(&self.stack, sentence.tokens())?;
            let inputs = match &self.reprojection {
                Some(layer) => {
                    let mut projected = Array2::zeros((words.nrows(), layer.output_len()));
                    for (mut row, word) in projected.rows_mut().into_iter().zip(words.rows()) {
                        row.assign(&layer.forward(word));
                    }
                    projected
                }
                None => words,
            };
            sentence.set_embedding(RNN_NAME, self.rnn.represent(&inputs)?.to_vec());
        }
        Ok(())
    }
}
