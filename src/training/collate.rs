//! Turning tokenized examples into padded batches.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::Rng;
use tokenizers::Tokenizer;

use super::datasets::{Example, Labels};
use crate::error::{Error, Result};

/// Label value ignored by the loss.
pub const IGNORE_INDEX: i64 = -100;

#[derive(Debug, Clone, PartialEq)]
pub enum BatchLabels {
    None,
    Classes(Array1<i64>),
    Tokens(Array2<i64>),
}

/// One model-ready batch, padded to its longest example.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub input_ids: Array2<i64>,
    pub attention_mask: Array2<i64>,
    pub labels: BatchLabels,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.input_ids.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait Collator {
    fn collate(&self, examples: &[&Example], rng: &mut StdRng) -> Result<Batch>;
}

fn pad_inputs(examples: &[&Example], pad_id: u32) -> Result<(Array2<i64>, Array2<i64>)> {
    if examples.iter().any(|e| e.input_ids.is_empty()) {
        return Err(Error::InvalidInput(
            "examples must be tokenized before collation".into(),
        ));
    }
    let width = examples.iter().map(|e| e.input_ids.len()).max().unwrap_or(0);
    let mut ids = Array2::from_elem((examples.len(), width), i64::from(pad_id));
    let mut mask = Array2::zeros((examples.len(), width));
    for (b, example) in examples.iter().enumerate() {
        for (t, &id) in example.input_ids.iter().enumerate() {
            ids[[b, t]] = i64::from(id);
            mask[[b, t]] = example.attention_mask.get(t).map_or(1, |&m| i64::from(m));
        }
    }
    Ok((ids, mask))
}

fn stack_labels(examples: &[&Example], width: usize) -> Result<BatchLabels> {
    if examples.iter().all(|e| matches!(e.labels, Labels::None)) {
        return Ok(BatchLabels::None);
    }
    if let Some(classes) = examples
        .iter()
        .map(|e| match e.labels {
            Labels::Class(c) => Some(c as i64),
            _ => None,
        })
        .collect::<Option<Vec<i64>>>()
    {
        return Ok(BatchLabels::Classes(Array1::from(classes)));
    }
    let mut tokens = Array2::from_elem((examples.len(), width), IGNORE_INDEX);
    for (b, example) in examples.iter().enumerate() {
        let Labels::Tokens(labels) = &example.labels else {
            return Err(Error::InvalidInput("batch mixes label kinds".into()));
        };
        for (t, &label) in labels.iter().enumerate().take(width) {
            tokens[[b, t]] = label;
        }
    }
    Ok(BatchLabels::Tokens(tokens))
}

/// Pads inputs and stacks whatever labels the examples carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCollator {
    pub pad_id: u32,
}

impl Collator for DefaultCollator {
    fn collate(&self, examples: &[&Example], _rng: &mut StdRng) -> Result<Batch> {
        let (input_ids, attention_mask) = pad_inputs(examples, self.pad_id)?;
        let labels = stack_labels(examples, input_ids.ncols())?;
        Ok(Batch {
            input_ids,
            attention_mask,
            labels,
        })
    }
}

/// Masked language modelling corruption.
///
/// Each non-special, non-padding token is selected with `mlm_probability`.
/// Selected tokens keep their id as the label and are replaced by the mask
/// token 80% of the time, a random token 10% of the time, and left as is
/// otherwise. Every other label is [`IGNORE_INDEX`].
#[derive(Debug, Clone, Copy)]
pub struct MaskedLmCollator {
    mask_id: u32,
    pad_id: u32,
    vocab_size: u32,
    mlm_probability: f64,
}

impl MaskedLmCollator {
    pub fn new(mask_id: u32, pad_id: u32, vocab_size: u32, mlm_probability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&mlm_probability) {
            return Err(Error::InvalidInput(format!(
                "mlm_probability must be within [0, 1], got {mlm_probability}"
            )));
        }
        if vocab_size == 0 {
            return Err(Error::InvalidInput("vocab_size must be positive".into()));
        }
        Ok(Self {
            mask_id,
            pad_id,
            vocab_size,
            mlm_probability,
        })
    }

    /// Mask and pad ids taken from `tokenizer` (`[MASK]`/`<mask>`, `[PAD]`/`<pad>`).
    pub fn from_tokenizer(tokenizer: &Tokenizer, mlm_probability: f64) -> Result<Self> {
        let mask_id = ["[MASK]", "<mask>"]
            .iter()
            .find_map(|t| tokenizer.token_to_id(t))
            .ok_or_else(|| {
                Error::InvalidInput(
                    "tokenizer has no mask token, masked language modelling needs one".into(),
                )
            })?;
        let pad_id = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| ["[PAD]", "<pad>"].iter().find_map(|t| tokenizer.token_to_id(t)))
            .unwrap_or(0);
        let vocab_size = tokenizer.get_vocab_size(true) as u32;
        Self::new(mask_id, pad_id, vocab_size, mlm_probability)
    }
}

impl Collator for MaskedLmCollator {
    fn collate(&self, examples: &[&Example], rng: &mut StdRng) -> Result<Batch> {
        let (mut input_ids, attention_mask) = pad_inputs(examples, self.pad_id)?;
        let mut labels = Array2::from_elem(input_ids.dim(), IGNORE_INDEX);

        for (b, example) in examples.iter().enumerate() {
            for t in 0..example.input_ids.len() {
                let special = example.special_tokens_mask.get(t) == Some(&1);
                if special || attention_mask[[b, t]] == 0 {
                    continue;
                }
                if !rng.gen_bool(self.mlm_probability) {
                    continue;
                }
                labels[[b, t]] = input_ids[[b, t]];
                let roll: f64 = rng.gen();
                if roll < 0.8 {
                    input_ids[[b, t]] = i64::from(self.mask_id);
                } else if roll < 0.9 {
                    input_ids[[b, t]] = i64::from(rng.gen_range(0..self.vocab_size));
                }
            }
        }

        Ok(Batch {
            input_ids,
            attention_mask,
            labels: BatchLabels::Tokens(labels),
        })
    }
}
