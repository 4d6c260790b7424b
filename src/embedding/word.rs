//! Static word embeddings: one fixed vector per vocabulary entry.
//!
//! Tables are read from word2vec/GloVe text files (`word v1 v2 ...`, with an
//! optional `count dim` header line). Lookup falls back to lowercase and then
//! to digit-normalized forms; unknown words get a zero vector.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;

use super::{BackendKind, Embeddings};
use crate::error::{Error, Result};
use crate::hub::download::ensure_word_vectors;
use crate::hub::flair::CONTEXTUAL_EMBEDDINGS;
use crate::sentence::Sentence;

pub struct WordEmbeddings {
    name: String,
    vectors: HashMap<String, Vec<f32>>,
    dim: usize,
}

impl WordEmbeddings {
    /// Open the table `name`: an explicit file path, or a cached/downloadable
    /// table under `<cache>/word/<name>.vec`.
    pub fn open(name: &str, cache_dir: &Path, url_template: Option<&str>) -> Result<Self> {
        let as_path = Path::new(name);
        if as_path.is_file() {
            return Self::from_file(name, as_path);
        }
        if CONTEXTUAL_EMBEDDINGS.contains(&name) {
            return Err(Error::StaticEmbeddingUnavailable(format!(
                "{name} is a contextual language model"
            )));
        }
        match ensure_word_vectors(cache_dir, name, url_template)? {
            Some(path) => Self::from_file(name, &path),
            None => Err(Error::StaticEmbeddingUnavailable(format!(
                "{name}: no table at {} and models.word_vectors_url is not set",
                cache_dir.join("word").join(format!("{name}.vec")).display()
            ))),
        }
    }

    pub fn from_file(name: &str, path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open word vectors {}", path.display()))?;
        let table = Self::parse(name, BufReader::new(file))?;
        tracing::info!(name, words = table.vectors.len(), dim = table.dim, "word vectors loaded");
        Ok(table)
    }

    /// Parse a word2vec text table.
    pub fn parse(name: &str, reader: impl BufRead) -> Result<Self> {
        let mut vectors = HashMap::new();
        let mut dim = 0;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let values: Vec<&str> = fields.collect();
            if line_no == 0 && values.len() == 1 && word.parse::<usize>().is_ok() {
                // `count dim` header
                continue;
            }
            let vector = values
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<Vec<f32>, _>>()
                .with_context(|| format!("{name}: bad number on line {}", line_no + 1))?;
            if dim == 0 {
                dim = vector.len();
            } else if vector.len() != dim {
                return Err(Error::InvalidInput(format!(
                    "{name}: line {} has {} values, expected {dim}",
                    line_no + 1,
                    vector.len()
                )));
            }
            vectors.entry(word.to_string()).or_insert(vector);
        }

        if vectors.is_empty() || dim == 0 {
            return Err(Error::StaticEmbeddingUnavailable(format!("{name}: empty table")));
        }
        Ok(Self {
            name: name.to_string(),
            vectors,
            dim,
        })
    }

    /// Vector for `word`, trying lowercase and digit-normalized variants.
    pub fn lookup(&self, word: &str) -> Option<&[f32]> {
        let lower = word.to_lowercase();
        let hashed: String = lower
            .chars()
            .map(|c| if c.is_ascii_digit() { '#' } else { c })
            .collect();
        let zeroed: String = lower
            .chars()
            .map(|c| if c.is_ascii_digit() { '0' } else { c })
            .collect();

        let found = [word, lower.as_str(), hashed.as_str(), zeroed.as_str()]
            .into_iter()
            .find_map(|candidate| self.vectors.get(candidate))
            .map(|v| v.as_slice());
        found
    }

    pub fn vocab_size(&self) -> usize {
        self.vectors.len()
    }
}

impl Embeddings for WordEmbeddings {
    fn name(&self) -> &str {
        &self.name
    }

    fn embedding_length(&self) -> usize {
        self.dim
    }

    fn kind(&self) -> BackendKind {
        BackendKind::StaticWord
    }

    fn embed(&self, sentences: &mut [Sentence]) -> Result<()> {
        for sentence in sentences.iter_mut() {
            for token in sentence.tokens_mut() {
                let vector = self
                    .lookup(token.text())
                    .map(<[f32]>::to_vec)
                    .unwrap_or_else(|| vec![0.0; self.dim]);
                token.set_embedding(&self.name, vector);
            }
        }
        Ok(())
    }
}
