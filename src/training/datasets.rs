//! Train/validation datasets for fine-tuning tasks.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use super::categorize::Categorize;
use super::collate::{Batch, Collator, DefaultCollator, MaskedLmCollator};
use super::split::RandomSplitter;
use super::NamedTokenizer;
use crate::config::EasyConfig;
use crate::error::{Error, Result};

/// Truncation limit used when neither the caller nor the tokenizer sets one.
pub const DEFAULT_MAX_LENGTH: usize = 512;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum Labels {
    #[default]
    None,
    /// Encoded class of a classification example.
    Class(usize),
    /// Per-token targets of a language modelling example.
    Tokens(Vec<i64>),
}

/// One example. Raw examples carry `text`; tokenization replaces it with ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Example {
    pub text: Option<String>,
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub special_tokens_mask: Vec<u32>,
    pub labels: Labels,
}

impl Example {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn is_tokenized(&self) -> bool {
        self.text.is_none() && !self.input_ids.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    examples: Vec<Example>,
}

impl Dataset {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    pub fn from_texts(texts: impl IntoIterator<Item = String>) -> Self {
        Self::new(texts.into_iter().map(Example::from_text).collect())
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Example> {
        self.examples.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Example> {
        self.examples.iter()
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    fn tokenize(&mut self, tokenizer: &tokenizers::Tokenizer) -> Result<()> {
        let (positions, texts): (Vec<usize>, Vec<String>) = self
            .examples
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.text.clone().map(|t| (i, t)))
            .unzip();
        if texts.is_empty() {
            return Ok(());
        }
        let encodings = tokenizer
            .encode_batch(texts, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;
        for (i, encoding) in positions.into_iter().zip(encodings) {
            let example = &mut self.examples[i];
            example.text = None;
            example.input_ids = encoding.get_ids().to_vec();
            example.attention_mask = encoding.get_attention_mask().to_vec();
            example.special_tokens_mask = encoding.get_special_tokens_mask().to_vec();
        }
        Ok(())
    }
}

/// Concatenate every example, drop the tail that does not fill a block, and
/// cut the rest into `block_size` blocks whose labels are their input ids.
pub fn group_texts(examples: &[Example], block_size: usize) -> Result<Vec<Example>> {
    if block_size == 0 {
        return Err(Error::InvalidInput("block_size must be positive".into()));
    }
    let mut input_ids = Vec::new();
    let mut attention_mask = Vec::new();
    let mut special_tokens_mask = Vec::new();
    for example in examples {
        input_ids.extend_from_slice(&example.input_ids);
        attention_mask.extend_from_slice(&example.attention_mask);
        special_tokens_mask.extend_from_slice(&example.special_tokens_mask);
    }
    let total = (input_ids.len() / block_size) * block_size;

    let block = |column: &[u32], start: usize| -> Vec<u32> {
        column.get(start..start + block_size).map(<[u32]>::to_vec).unwrap_or_default()
    };
    Ok((0..total)
        .step_by(block_size)
        .map(|start| {
            let ids = block(&input_ids, start);
            Example {
                text: None,
                labels: Labels::Tokens(ids.iter().map(|&id| i64::from(id)).collect()),
                input_ids: ids,
                attention_mask: block(&attention_mask, start),
                special_tokens_mask: block(&special_tokens_mask, start),
            }
        })
        .collect())
}

/// Batched train and validation sets.
#[derive(Debug, Clone, PartialEq)]
pub struct DataLoaders {
    pub train: Vec<Batch>,
    pub valid: Vec<Batch>,
}

/// Train and validation datasets with an optional tokenizer.
#[derive(Debug, Clone)]
pub struct TaskDatasets {
    pub train: Dataset,
    pub valid: Dataset,
    tokenizer: Option<NamedTokenizer>,
}

impl TaskDatasets {
    pub fn new(train: Dataset, valid: Dataset) -> Self {
        Self {
            train,
            valid,
            tokenizer: None,
        }
    }

    pub fn tokenizer(&self) -> Option<&NamedTokenizer> {
        self.tokenizer.as_ref()
    }

    /// Load and set the tokenizer `name`. An existing tokenizer is kept
    /// unless `override_existing` is set.
    pub fn set_tokenizer(&mut self, name: &str, override_existing: bool, config: &EasyConfig) -> Result<()> {
        if self.refuses_override(override_existing) {
            return Ok(());
        }
        let tokenizer = NamedTokenizer::load(name, config)?;
        self.set_loaded_tokenizer(tokenizer, override_existing);
        Ok(())
    }

    /// Set an already loaded tokenizer. Returns whether it was applied.
    pub fn set_loaded_tokenizer(&mut self, tokenizer: NamedTokenizer, override_existing: bool) -> bool {
        if self.refuses_override(override_existing) {
            return false;
        }
        if self.tokenizer.is_some() {
            info!(tokenizer = %tokenizer.name, "setting new tokenizer");
        }
        self.tokenizer = Some(tokenizer);
        true
    }

    fn refuses_override(&self, override_existing: bool) -> bool {
        match &self.tokenizer {
            Some(existing) if !override_existing => {
                warn!(
                    existing = %existing.name,
                    "a tokenizer is already set, pass override_existing to replace it"
                );
                true
            }
            _ => false,
        }
    }

    /// Tokenize both splits in place. Sequences are truncated to
    /// `max_length`, else to the tokenizer's own limit, else to
    /// [`DEFAULT_MAX_LENGTH`].
    pub fn tokenize(&mut self, max_length: Option<usize>) -> Result<()> {
        let limit = max_length
            .or_else(|| {
                self.tokenizer
                    .as_ref()
                    .and_then(|t| t.tokenizer.get_truncation())
                    .map(|t| t.max_length)
            })
            .unwrap_or(DEFAULT_MAX_LENGTH);
        self.tokenize_with(Some(limit))
    }

    fn tokenize_with(&mut self, max_length: Option<usize>) -> Result<()> {
        let named = self.tokenizer.as_ref().ok_or_else(|| {
            Error::InvalidInput(
                "tried to tokenize a dataset without a tokenizer, set one with set_tokenizer first".into(),
            )
        })?;
        let mut tokenizer = named.tokenizer.clone();
        tokenizer.with_padding(None);
        let truncation = max_length.map(|max_length| tokenizers::TruncationParams {
            max_length,
            ..Default::default()
        });
        tokenizer
            .with_truncation(truncation)
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        self.train.tokenize(&tokenizer)?;
        self.valid.tokenize(&tokenizer)?;
        info!(
            tokenizer = %named.name,
            train = self.train.len(),
            valid = self.valid.len(),
            "datasets tokenized"
        );
        Ok(())
    }

    /// Training example `idx`.
    pub fn get(&self, idx: usize) -> Option<&Example> {
        self.train.get(idx)
    }

    /// Collate both splits into batches. Only the training split is shuffled.
    pub fn dataloaders(
        &self,
        batch_size: usize,
        shuffle_train: bool,
        seed: Option<u64>,
        collator: &dyn Collator,
    ) -> Result<DataLoaders> {
        if batch_size == 0 {
            return Err(Error::InvalidInput("batch_size must be positive".into()));
        }
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut train: Vec<&Example> = self.train.iter().collect();
        if shuffle_train {
            train.shuffle(&mut rng);
        }
        let valid: Vec<&Example> = self.valid.iter().collect();

        let mut batches = |examples: &[&Example]| -> Result<Vec<Batch>> {
            examples
                .chunks(batch_size)
                .map(|chunk| collator.collate(chunk, &mut rng))
                .collect()
        };
        let train = batches(&train)?;
        let valid = batches(&valid)?;
        Ok(DataLoaders { train, valid })
    }
}

fn pick<T: Clone>(items: &[T], idx: &[usize]) -> Result<Vec<T>> {
    idx.iter()
        .map(|&i| {
            items.get(i).cloned().ok_or_else(|| {
                Error::InvalidInput(format!("split index {i} out of range for {} items", items.len()))
            })
        })
        .collect()
}

/// Datasets for sequence classification. String labels are encoded through a
/// sorted [`Categorize`] vocabulary.
#[derive(Debug, Clone)]
pub struct SequenceClassificationDatasets {
    datasets: TaskDatasets,
    categorize: Categorize<String>,
}

impl SequenceClassificationDatasets {
    /// Build from parallel `texts` and `labels`. Without `splits`, 20% of the
    /// items are held out at random. With a tokenizer, both splits are
    /// tokenized immediately, truncated as in [`TaskDatasets::tokenize`].
    pub fn from_items(
        texts: Vec<String>,
        labels: Vec<String>,
        splits: Option<(Vec<usize>, Vec<usize>)>,
        tokenizer: Option<NamedTokenizer>,
        max_length: Option<usize>,
    ) -> Result<Self> {
        if texts.len() != labels.len() {
            return Err(Error::InvalidInput(format!(
                "{} texts but {} labels",
                texts.len(),
                labels.len()
            )));
        }
        let categorize = Categorize::new(labels.iter().cloned(), true);
        let (train_idx, valid_idx) = splits.unwrap_or_else(|| RandomSplitter::default().split(texts.len()));

        let build = |idx: &[usize]| -> Result<Dataset> {
            let xs = pick(&texts, idx)?;
            let ys = pick(&labels, idx)?;
            Ok(Dataset::new(
                xs.into_iter()
                    .zip(ys)
                    .map(|(text, label)| Example {
                        labels: categorize.encode(&label).map_or(Labels::None, Labels::Class),
                        ..Example::from_text(text)
                    })
                    .collect(),
            ))
        };
        let mut datasets = TaskDatasets::new(build(&train_idx)?, build(&valid_idx)?);

        match tokenizer {
            Some(tokenizer) => {
                datasets.set_loaded_tokenizer(tokenizer, false);
                datasets.tokenize(max_length)?;
            }
            None => warn!("no tokenizer given, call set_tokenizer and tokenize before batching"),
        }
        Ok(Self {
            datasets,
            categorize,
        })
    }

    pub fn categorize(&self) -> &Categorize<String> {
        &self.categorize
    }

    pub fn datasets(&self) -> &TaskDatasets {
        &self.datasets
    }

    pub fn datasets_mut(&mut self) -> &mut TaskDatasets {
        &mut self.datasets
    }

    pub fn dataloaders(&self, batch_size: usize, shuffle_train: bool, seed: Option<u64>) -> Result<DataLoaders> {
        let collator = DefaultCollator {
            pad_id: pad_id(self.datasets.tokenizer()),
        };
        self.datasets.dataloaders(batch_size, shuffle_train, seed, &collator)
    }
}

fn pad_id(tokenizer: Option<&NamedTokenizer>) -> u32 {
    tokenizer
        .and_then(|t| {
            t.tokenizer
                .get_padding()
                .map(|p| p.pad_id)
                .or_else(|| ["[PAD]", "<pad>"].iter().find_map(|p| t.tokenizer.token_to_id(p)))
        })
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanguageModelOptions {
    /// Tokens per training block.
    pub block_size: usize,
    pub masked_lm: bool,
    /// Held-out fraction when no validation texts are given.
    pub split_pct: f64,
    pub seed: Option<u64>,
}

impl Default for LanguageModelOptions {
    fn default() -> Self {
        Self {
            block_size: 128,
            masked_lm: false,
            split_pct: 0.1,
            seed: None,
        }
    }
}

/// Datasets for causal or masked language model fine-tuning: tokenized text
/// grouped into fixed-size blocks.
#[derive(Debug, Clone)]
pub struct LanguageModelDatasets {
    datasets: TaskDatasets,
    block_size: usize,
    masked_lm: bool,
}

impl LanguageModelDatasets {
    pub fn from_texts(
        train: Vec<String>,
        valid: Option<Vec<String>>,
        tokenizer: NamedTokenizer,
        options: &LanguageModelOptions,
    ) -> Result<Self> {
        let (train, valid) = match valid {
            Some(valid) => (train, valid),
            None => {
                let (train_idx, valid_idx) =
                    RandomSplitter::new(options.split_pct, options.seed)?.split(train.len());
                (pick(&train, &train_idx)?, pick(&train, &valid_idx)?)
            }
        };

        let mut datasets = TaskDatasets::new(Dataset::from_texts(train), Dataset::from_texts(valid));
        datasets.set_loaded_tokenizer(tokenizer, false);
        // Untruncated: ids are regrouped into blocks below.
        datasets.tokenize_with(None)?;
        datasets.train = Dataset::new(group_texts(datasets.train.examples(), options.block_size)?);
        datasets.valid = Dataset::new(group_texts(datasets.valid.examples(), options.block_size)?);
        info!(
            block_size = options.block_size,
            train_blocks = datasets.train.len(),
            valid_blocks = datasets.valid.len(),
            "language model datasets grouped"
        );

        Ok(Self {
            datasets,
            block_size: options.block_size,
            masked_lm: options.masked_lm,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn masked_lm(&self) -> bool {
        self.masked_lm
    }

    pub fn datasets(&self) -> &TaskDatasets {
        &self.datasets
    }

    /// Batches; masked language models get [`MaskedLmCollator`] corruption
    /// with `mlm_probability`.
    pub fn dataloaders(
        &self,
        batch_size: usize,
        shuffle_train: bool,
        seed: Option<u64>,
        mlm_probability: f64,
    ) -> Result<DataLoaders> {
        let tokenizer = self.datasets.tokenizer();
        if self.masked_lm {
            let tokenizer = tokenizer.ok_or_else(|| {
                Error::InvalidInput("masked language modelling needs a tokenizer".into())
            })?;
            let collator = MaskedLmCollator::from_tokenizer(&tokenizer.tokenizer, mlm_probability)?;
            self.datasets.dataloaders(batch_size, shuffle_train, seed, &collator)
        } else {
            let collator = DefaultCollator {
                pad_id: pad_id(tokenizer),
            };
            self.datasets.dataloaders(batch_size, shuffle_train, seed, &collator)
        }
    }
}
