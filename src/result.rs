//! Uniform view over an embedded sentence, whatever backend produced it.

use anyhow::Context;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::sentence::Sentence;

/// How much of a result [`EmbeddingResult::to_dict`] flattens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Inputs, sentence vector, token vectors.
    #[default]
    Low,
    /// Low plus a per-token mapping and the tokenized text.
    Medium,
    /// Medium plus the full sentence.
    High,
}

impl std::str::FromStr for DetailLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("detail level must be low, medium or high, got {s}")),
        }
    }
}

impl std::fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// One embedded sentence. Every accessor is a fresh projection of the
/// wrapped sentence; nothing is cached and nothing mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    sentence: Sentence,
}

impl EmbeddingResult {
    pub fn new(sentence: Sentence) -> Self {
        Self { sentence }
    }

    /// The original text.
    pub fn inputs(&self) -> String {
        self.sentence.to_original_text()
    }

    /// Token texts joined by single spaces.
    pub fn tokenized_inputs(&self) -> String {
        self.sentence.to_tokenized_string()
    }

    /// The document vector, when a document backend attached one.
    pub fn sentence_embeddings(&self) -> Option<Array1<f32>> {
        self.sentence.embedding().map(Array1::from)
    }

    /// Token vectors as `(tokens, dim)` in token order.
    pub fn token_embeddings(&self) -> Result<Array2<f32>> {
        let tokens = self.sentence.tokens();
        let Some(first) = tokens.first() else {
            return Ok(Array2::zeros((0, 0)));
        };
        let dim = first.embedding().len();
        let mut flat = Vec::with_capacity(tokens.len() * dim);
        for (index, token) in tokens.iter().enumerate() {
            let vector = token.embedding();
            if vector.len() != dim {
                return Err(Error::ShapeMismatch {
                    index,
                    expected: dim,
                    found: vector.len(),
                });
            }
            flat.extend(vector);
        }
        Array2::from_shape_vec((tokens.len(), dim), flat)
            .context("token embedding matrix")
            .map_err(Error::from)
    }

    pub fn sentence(&self) -> &Sentence {
        &self.sentence
    }

    pub fn into_sentence(self) -> Sentence {
        self.sentence
    }

    fn token_entries(&self, out: &mut Map<String, Value>) {
        for token in self.sentence.iter() {
            out.insert(
                token.text().to_string(),
                json!({
                    "embeddings": token.embedding(),
                    "word_idx": token.idx(),
                }),
            );
        }
    }

    /// Flatten into an ordered map.
    ///
    /// Token texts become keys at `Medium` and above, so a token spelled like
    /// a reserved key (`inputs`, ...) overwrites that entry, and repeated
    /// tokens keep only their last occurrence.
    pub fn to_dict(&self, level: DetailLevel) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        out.insert("inputs".into(), Value::String(self.inputs()));
        out.insert(
            "sentence_embeddings".into(),
            match self.sentence_embeddings() {
                Some(v) => json!(v.to_vec()),
                None => Value::Null,
            },
        );
        let rows: Vec<Vec<f32>> = self
            .token_embeddings()?
            .outer_iter()
            .map(|row| row.to_vec())
            .collect();
        out.insert("token_embeddings".into(), json!(rows));

        if level == DetailLevel::Low {
            return Ok(out);
        }
        self.token_entries(&mut out);
        out.insert(
            "tokenized_inputs".into(),
            Value::String(self.tokenized_inputs()),
        );

        if level == DetailLevel::High {
            // Same entries as above; the output does not change.
            self.token_entries(&mut out);
            let sentence = serde_json::to_value(&self.sentence).context("serializing sentence")?;
            out.insert("sentence".into(), sentence);
        }
        Ok(out)
    }
}

impl From<Sentence> for EmbeddingResult {
    fn from(sentence: Sentence) -> Self {
        Self::new(sentence)
    }
}

impl std::fmt::Display for EmbeddingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tokens = match self.token_embeddings() {
            Ok(m) => format!("{:?}", m.dim()),
            Err(_) => "ragged".to_string(),
        };
        let document = match self.sentence_embeddings() {
            Some(v) => format!("({},)", v.len()),
            None => "none".to_string(),
        };
        write!(
            f,
            "EmbeddingResult {{ inputs: {:?}, token_embeddings: {tokens}, sentence_embeddings: {document} }}",
            self.inputs()
        )
    }
}

/// Output of [`format_results`].
#[derive(Debug, Clone, PartialEq)]
pub enum FormattedResults {
    Results(Vec<EmbeddingResult>),
    Dicts(Vec<Map<String, Value>>),
}

impl FormattedResults {
    pub fn len(&self) -> usize {
        match self {
            Self::Results(r) => r.len(),
            Self::Dicts(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flatten embedded sentences at `level`, in order.
pub fn flatten_results(sentences: Vec<Sentence>, level: DetailLevel) -> Result<Vec<Map<String, Value>>> {
    sentences
        .into_iter()
        .map(|s| EmbeddingResult::new(s).to_dict(level))
        .collect()
}

/// Wrap embedded sentences, flattening them when `level` is set.
pub fn format_results(sentences: Vec<Sentence>, level: Option<DetailLevel>) -> Result<FormattedResults> {
    match level {
        None => Ok(FormattedResults::Results(
            sentences.into_iter().map(EmbeddingResult::new).collect(),
        )),
        Some(level) => flatten_results(sentences, level).map(FormattedResults::Dicts),
    }
}
