//! Contextual string embeddings from a character language model.
//!
//! The model is an ONNX export taking `char_ids` `[batch, chars]` and
//! returning hidden states `[batch, chars, hidden]`. Each sentence is fed as
//! `"\n" + tokenized text + " "`. A forward model contributes the state at the
//! character following the token; a backward model (name ending in
//! `-backward`) reads the text reversed between the same markers and
//! contributes the state at the character preceding the token.
//!
//! Assets live in `<cache>/contextual/<name>/` as `model.onnx` and
//! `chars.json` (a JSON array of single-character strings; index = id).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use ort::session::Session;
use ort::value::Tensor;

use super::{open_session, BackendKind, Embeddings};
use crate::error::Result;
use crate::sentence::Sentence;

const START_MARKER: char = '\n';
const END_MARKER: char = ' ';
const UNK: &str = "<unk>";

pub struct ContextualEmbeddings {
    name: String,
    session: Mutex<Session>,
    char_ids: HashMap<char, i64>,
    unk_id: i64,
    forward: bool,
    hidden_size: usize,
}

// Safety: Session is behind a Mutex.
unsafe impl Send for ContextualEmbeddings {}
unsafe impl Sync for ContextualEmbeddings {}

impl ContextualEmbeddings {
    pub fn open(name: &str, cache_dir: &Path) -> Result<Self> {
        let dir = cache_dir.join("contextual").join(name);
        let model_path = dir.join("model.onnx");
        let chars_path = dir.join("chars.json");
        if !(model_path.exists() && chars_path.exists()) {
            return Err(anyhow::anyhow!(
                "contextual model {name} not found: expected model.onnx and chars.json in {}",
                dir.display()
            )
            .into());
        }

        let dictionary: Vec<String> = serde_json::from_str(
            &std::fs::read_to_string(&chars_path)
                .with_context(|| format!("failed to read {}", chars_path.display()))?,
        )
        .context("chars.json must be a JSON array of strings")?;
        let (char_ids, unk_id) = build_dictionary(&dictionary);

        let session = open_session(&model_path)
            .with_context(|| format!("failed to load ONNX model for {name}"))?;
        tracing::info!(model = %model_path.display(), "character language model loaded");

        let mut backend = Self {
            name: name.to_string(),
            session: Mutex::new(session),
            char_ids,
            unk_id,
            forward: !name.ends_with("-backward"),
            hidden_size: 0,
        };
        let sample = backend.run(&[vec![backend.unk_id]])?;
        backend.hidden_size = sample.hidden;
        Ok(backend)
    }

    fn encode(&self, text: &[char]) -> Vec<i64> {
        text.iter()
            .map(|c| self.char_ids.get(c).copied().unwrap_or(self.unk_id))
            .collect()
    }

    fn run(&self, batch: &[Vec<i64>]) -> anyhow::Result<CharStates> {
        let batch_size = batch.len();
        let max_len = batch.iter().map(Vec::len).max().unwrap_or(0);
        let pad = self.char_ids.get(&END_MARKER).copied().unwrap_or(self.unk_id);

        let mut flat = Vec::with_capacity(batch_size * max_len);
        for ids in batch {
            flat.extend_from_slice(ids);
            flat.extend(std::iter::repeat(pad).take(max_len - ids.len()));
        }
        let tensor = Tensor::from_array((
            vec![batch_size as i64, max_len as i64],
            flat.into_boxed_slice(),
        ))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs! { "char_ids" => tensor })?;
        let (dims, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("failed to extract hidden states")?;
        let dims: &[i64] = &dims;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size,
            "unexpected hidden state shape: {dims:?}, expected [{batch_size}, chars, hidden]"
        );
        Ok(CharStates {
            data: data.to_vec(),
            len: dims[1] as usize,
            hidden: dims[2] as usize,
        })
    }
}

struct CharStates {
    data: Vec<f32>,
    len: usize,
    hidden: usize,
}

impl CharStates {
    fn at(&self, batch_index: usize, pos: usize) -> Vec<f32> {
        let offset = (batch_index * self.len + pos) * self.hidden;
        self.data[offset..offset + self.hidden].to_vec()
    }
}

fn build_dictionary(entries: &[String]) -> (HashMap<char, i64>, i64) {
    let mut ids = HashMap::new();
    let mut unk_id = 0;
    for (i, entry) in entries.iter().enumerate() {
        if entry == UNK {
            unk_id = i as i64;
            continue;
        }
        let mut chars = entry.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            ids.entry(c).or_insert(i as i64);
        }
    }
    (ids, unk_id)
}

/// Model input text (as chars) and, per token, the position whose hidden
/// state represents it.
fn lm_input(sentence: &Sentence, forward: bool) -> (Vec<char>, Vec<usize>) {
    let mut body: Vec<char> = sentence.to_tokenized_string().chars().collect();
    let body_len = body.len();
    if !forward {
        body.reverse();
    }
    let mut text = Vec::with_capacity(body_len + 2);
    text.push(START_MARKER);
    text.extend(body);
    text.push(END_MARKER);

    let mut offsets = Vec::with_capacity(sentence.len());
    let mut offset_forward = 1;
    let mut offset_backward = body_len + 1;
    for token in sentence.iter() {
        let len = token.text().chars().count();
        offset_forward += len;
        offsets.push(if forward { offset_forward } else { offset_backward });
        offset_forward += 1;
        offset_backward = offset_backward.saturating_sub(len + 1);
    }
    (text, offsets)
}

impl Embeddings for ContextualEmbeddings {
    fn name(&self) -> &str {
        &self.name
    }

    fn embedding_length(&self) -> usize {
        self.hidden_size
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Contextual
    }

    fn embed(&self, sentences: &mut [Sentence]) -> Result<()> {
        let targets: Vec<usize> = (0..sentences.len())
            .filter(|&i| !sentences[i].is_empty())
            .collect();
        if targets.is_empty() {
            return Ok(());
        }

        let inputs: Vec<(Vec<char>, Vec<usize>)> = targets
            .iter()
            .map(|&i| lm_input(&sentences[i], self.forward))
            .collect();
        let batch: Vec<Vec<i64>> = inputs.iter().map(|(text, _)| self.encode(text)).collect();
        let states = self.run(&batch)?;

        for (b, (&i, (_, offsets))) in targets.iter().zip(&inputs).enumerate() {
            for (token, &pos) in sentences[i].tokens_mut().iter_mut().zip(offsets) {
                token.set_embedding(&self.name, states.at(b, pos));
            }
        }
        Ok(())
    }
}
