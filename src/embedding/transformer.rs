//! Transformer word embeddings via ONNX Runtime.
//!
//! Runs a Hugging Face encoder exported to ONNX over pre-tokenized sentences
//! and attaches, for every word, the last hidden state of its first sub-token.

use std::sync::Mutex;

use anyhow::Context;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{open_session, BackendKind, Embeddings};
use crate::error::Result;
use crate::hub::download::TransformerAssets;
use crate::sentence::Sentence;

/// Sentences per inference call.
const BATCH_SIZE: usize = 32;

pub struct TransformerWordEmbeddings {
    name: String,
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    hidden_size: usize,
    uses_token_type_ids: bool,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
// The Mutex guarantees exclusive access during run().
unsafe impl Send for TransformerWordEmbeddings {}
unsafe impl Sync for TransformerWordEmbeddings {}

/// Hidden states of one inference batch, row-major `[batch, seq, hidden]`.
struct HiddenStates {
    data: Vec<f32>,
    seq_len: usize,
    hidden: usize,
}

impl TransformerWordEmbeddings {
    pub fn load(name: &str, assets: &TransformerAssets, max_seq_len: usize) -> Result<Self> {
        let session = open_session(&assets.model_path)
            .with_context(|| format!("failed to load ONNX model for {name}"))?;

        tracing::info!(model = %assets.model_path.display(), "ONNX model loaded");

        let uses_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(&assets.tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: max_seq_len,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(tokenizer = %assets.tokenizer_path.display(), "tokenizer loaded");

        let mut backend = Self {
            name: name.to_string(),
            session: Mutex::new(session),
            tokenizer,
            hidden_size: 0,
            uses_token_type_ids,
        };
        // Run once so embedding_length() is known before the first embed().
        let sample = backend.run(&[vec!["."]])?;
        backend.hidden_size = sample.1.hidden;
        Ok(backend)
    }

    /// Tokenize and run one batch. Returns the encodings and hidden states.
    fn run(&self, words: &[Vec<&str>]) -> anyhow::Result<(Vec<tokenizers::Encoding>, HiddenStates)> {
        let encodings = self
            .tokenizer
            .encode_batch(words.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        let mut input_ids_flat = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask_flat = Vec::with_capacity(batch_size * seq_len);
        for encoding in &encodings {
            input_ids_flat.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask_flat.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor =
            Tensor::from_array((shape.clone(), input_ids_flat.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask_flat.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = if self.uses_token_type_ids {
            // token_type_ids: all zeros (single sentence, no segment B)
            let token_type_ids = vec![0i64; batch_size * seq_len];
            let token_type_ids_tensor =
                Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;
            session.run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            })?
        } else {
            session.run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
            })?
        };

        // The output name varies by ONNX export. Try common names, fall back to index 0.
        let hidden_value = outputs
            .get("last_hidden_state")
            .or_else(|| outputs.get("token_embeddings"))
            .unwrap_or_else(|| &outputs[0]);

        let (dims, data) = hidden_value
            .try_extract_tensor::<f32>()
            .context("failed to extract last_hidden_state tensor")?;
        let dims: &[i64] = &dims;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size,
            "unexpected hidden state shape: {dims:?}, expected [{batch_size}, seq, hidden]"
        );

        let hidden = HiddenStates {
            data: data.to_vec(),
            seq_len: dims[1] as usize,
            hidden: dims[2] as usize,
        };
        Ok((encodings, hidden))
    }

    fn embed_chunk(&self, sentences: &mut [Sentence]) -> anyhow::Result<()> {
        let targets: Vec<usize> = (0..sentences.len())
            .filter(|&i| !sentences[i].is_empty())
            .collect();
        if targets.is_empty() {
            return Ok(());
        }

        let words: Vec<Vec<&str>> = targets
            .iter()
            .map(|&i| sentences[i].iter().map(|t| t.text()).collect())
            .collect();
        let (encodings, states) = self.run(&words)?;

        let vectors: Vec<Vec<Option<Vec<f32>>>> = encodings
            .iter()
            .zip(&words)
            .enumerate()
            .map(|(b, (encoding, sentence_words))| {
                first_subtoken_vectors(encoding.get_word_ids(), sentence_words.len(), &states, b)
            })
            .collect();

        for (&i, sentence_vectors) in targets.iter().zip(vectors) {
            let sentence = &mut sentences[i];
            let missing = sentence_vectors.iter().filter(|v| v.is_none()).count();
            if missing > 0 {
                tracing::warn!(
                    model = %self.name,
                    missing,
                    "words beyond the sequence limit get zero vectors"
                );
            }
            for (token, vector) in sentence.tokens_mut().iter_mut().zip(sentence_vectors) {
                let vector = vector.unwrap_or_else(|| vec![0.0; states.hidden]);
                token.set_embedding(&self.name, vector);
            }
        }
        Ok(())
    }
}

/// For each word, the hidden state of its first sub-token (`None` when the
/// word was truncated away).
fn first_subtoken_vectors(
    word_ids: &[Option<u32>],
    word_count: usize,
    states: &HiddenStates,
    batch_index: usize,
) -> Vec<Option<Vec<f32>>> {
    let mut first: Vec<Option<usize>> = vec![None; word_count];
    for (pos, word) in word_ids.iter().enumerate().take(states.seq_len) {
        if let Some(w) = word.map(|w| w as usize) {
            if w < word_count && first[w].is_none() {
                first[w] = Some(pos);
            }
        }
    }
    first
        .into_iter()
        .map(|pos| {
            pos.map(|p| {
                let offset = (batch_index * states.seq_len + p) * states.hidden;
                states.data[offset..offset + states.hidden].to_vec()
            })
        })
        .collect()
}

impl Embeddings for TransformerWordEmbeddings {
    fn name(&self) -> &str {
        &self.name
    }

    fn embedding_length(&self) -> usize {
        self.hidden_size
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Transformer
    }

    fn embed(&self, sentences: &mut [Sentence]) -> Result<()> {
        for chunk in sentences.chunks_mut(BATCH_SIZE) {
            self.embed_chunk(chunk)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states() -> HiddenStates {
        // batch 1, seq 5, hidden 2; position p holds [p, p]
        let data = (0..5).flat_map(|p| [p as f32, p as f32]).collect();
        HiddenStates {
            data,
            seq_len: 5,
            hidden: 2,
        }
    }

    #[test]
    fn first_subtoken_wins() {
        // [CLS] w0 w1 w1 [SEP]
        let word_ids = [None, Some(0), Some(1), Some(1), None];
        let vectors = first_subtoken_vectors(&word_ids, 2, &states(), 0);
        assert_eq!(vectors[0], Some(vec![1.0, 1.0]));
        assert_eq!(vectors[1], Some(vec![2.0, 2.0]));
    }

    #[test]
    fn truncated_words_are_none() {
        let word_ids = [None, Some(0), Some(1), None, None];
        let vectors = first_subtoken_vectors(&word_ids, 3, &states(), 0);
        assert!(vectors[2].is_none());
    }

    fn test_assets() -> TransformerAssets {
        let cache = dirs::home_dir()
            .expect("home dir")
            .join(".easynlp/models");
        crate::hub::download::ensure_transformer_assets(
            &cache,
            "https://huggingface.co",
            "google-bert/bert-base-cased",
        )
        .unwrap()
    }

    #[test]
    #[ignore] // Requires network or cached model files — run with: cargo test -- --ignored
    fn test_one_vector_per_word() {
        let backend = TransformerWordEmbeddings::load("bert-base-cased", &test_assets(), 512).unwrap();
        let mut sentences = vec![Sentence::new("Paris is the capital of France")];
        backend.embed(&mut sentences).unwrap();
        for token in sentences[0].iter() {
            assert_eq!(token.embedding().len(), backend.embedding_length());
        }
    }

    #[test]
    #[ignore]
    fn test_embed_consistency() {
        let backend = TransformerWordEmbeddings::load("bert-base-cased", &test_assets(), 512).unwrap();
        let mut a = vec![Sentence::new("Rust is a systems programming language")];
        let mut b = a.clone();
        backend.embed(&mut a).unwrap();
        backend.embed(&mut b).unwrap();
        assert_eq!(a, b, "same input must produce identical output");
    }
}
