//! Processed-sentence structure shared by every backend.
//!
//! A [`Sentence`] owns its [`Token`]s. Backends attach vectors in place, keyed by
//! the backend name; a token's embedding is the concatenation of everything
//! attached to it, in attachment order. [`TextInput`] normalizes the accepted
//! input shapes into a batch of sentences.

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

/// A vector attached by one backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedVector {
    pub name: String,
    pub vector: Vec<f32>,
}

/// Ordered collection of named vectors. Re-attaching a name replaces it in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EmbeddingStore(Vec<NamedVector>);

impl EmbeddingStore {
    pub fn set(&mut self, name: &str, vector: Vec<f32>) {
        match self.0.iter_mut().find(|v| v.name == name) {
            Some(existing) => existing.vector = vector,
            None => self.0.push(NamedVector {
                name: name.to_string(),
                vector,
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.0
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.vector.as_slice())
    }

    /// Concatenation of every stored vector.
    pub fn concat(&self) -> Vec<f32> {
        self.0.iter().flat_map(|v| v.vector.iter().copied()).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|v| v.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// One token of a [`Sentence`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    text: String,
    /// 1-based position within the sentence.
    idx: usize,
    /// Byte offset of the token in the original text.
    start_pos: usize,
    whitespace_after: bool,
    embeddings: EmbeddingStore,
}

impl Token {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn start_pos(&self) -> usize {
        self.start_pos
    }

    pub fn end_pos(&self) -> usize {
        self.start_pos + self.text.len()
    }

    pub fn whitespace_after(&self) -> bool {
        self.whitespace_after
    }

    pub fn set_embedding(&mut self, name: &str, vector: Vec<f32>) {
        self.embeddings.set(name, vector);
    }

    /// All attached vectors concatenated; empty when nothing is attached.
    pub fn embedding(&self) -> Vec<f32> {
        self.embeddings.concat()
    }

    pub fn embeddings(&self) -> &EmbeddingStore {
        &self.embeddings
    }

    pub fn clear_embeddings(&mut self) {
        self.embeddings.clear();
    }
}

/// Tokenized text plus whatever vectors backends have attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sentence {
    tokens: Vec<Token>,
    embeddings: EmbeddingStore,
}

impl Sentence {
    /// Tokenize `text` on Unicode word boundaries (UAX #29). Whitespace runs
    /// are dropped; punctuation becomes its own token.
    pub fn new(text: &str) -> Self {
        let mut tokens = Vec::new();
        for (start_pos, piece) in text.split_word_bound_indices() {
            if piece.chars().all(char::is_whitespace) {
                continue;
            }
            let end = start_pos + piece.len();
            let whitespace_after = text[end..].starts_with(char::is_whitespace);
            tokens.push(Token {
                text: piece.to_string(),
                idx: tokens.len() + 1,
                start_pos,
                whitespace_after,
                embeddings: EmbeddingStore::default(),
            });
        }
        Self {
            tokens,
            embeddings: EmbeddingStore::default(),
        }
    }

    /// Build from pre-split tokens separated by single spaces.
    pub fn from_tokens<S: AsRef<str>>(words: &[S]) -> Self {
        let mut tokens = Vec::with_capacity(words.len());
        let mut pos = 0;
        for (i, word) in words.iter().enumerate() {
            let word = word.as_ref();
            tokens.push(Token {
                text: word.to_string(),
                idx: i + 1,
                start_pos: pos,
                whitespace_after: i + 1 < words.len(),
                embeddings: EmbeddingStore::default(),
            });
            pos += word.len() + 1;
        }
        Self {
            tokens,
            embeddings: EmbeddingStore::default(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut [Token] {
        &mut self.tokens
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Reconstruct the input text from tokens and their trailing whitespace.
    pub fn to_original_text(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            out.push_str(&token.text);
            if token.whitespace_after {
                out.push(' ');
            }
        }
        out
    }

    /// Token texts joined by single spaces.
    pub fn to_tokenized_string(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn set_embedding(&mut self, name: &str, vector: Vec<f32>) {
        self.embeddings.set(name, vector);
    }

    /// Document-level vector, if any backend attached one.
    pub fn embedding(&self) -> Option<Vec<f32>> {
        if self.embeddings.is_empty() {
            None
        } else {
            Some(self.embeddings.concat())
        }
    }

    pub fn embeddings(&self) -> &EmbeddingStore {
        &self.embeddings
    }

    /// Drop sentence and token vectors.
    pub fn clear_embeddings(&mut self) {
        self.embeddings.clear();
        for token in &mut self.tokens {
            token.clear_embeddings();
        }
    }
}

impl<'a> IntoIterator for &'a Sentence {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

/// One element of a heterogeneous batch.
#[derive(Debug, Clone)]
pub enum TextItem {
    Text(String),
    Sentence(Sentence),
}

/// Every input shape accepted by the `embed_*` entry points.
#[derive(Debug, Clone)]
pub enum TextInput {
    Text(String),
    Texts(Vec<String>),
    Sentence(Sentence),
    Sentences(Vec<Sentence>),
    Items(Vec<TextItem>),
}

impl TextInput {
    /// Normalize into a batch of sentences.
    ///
    /// `Items` must be all text or all sentences; a mixed list is rejected.
    pub fn into_sentences(self) -> Result<Vec<Sentence>> {
        match self {
            TextInput::Text(text) => Ok(vec![Sentence::new(&text)]),
            TextInput::Texts(texts) => Ok(texts.iter().map(|t| Sentence::new(t)).collect()),
            TextInput::Sentence(sentence) => Ok(vec![sentence]),
            TextInput::Sentences(sentences) => Ok(sentences),
            TextInput::Items(items) => {
                let all_text = items.iter().all(|i| matches!(i, TextItem::Text(_)));
                let all_sentences = items.iter().all(|i| matches!(i, TextItem::Sentence(_)));
                if !all_text && !all_sentences {
                    return Err(Error::MixedBatch);
                }
                Ok(items
                    .into_iter()
                    .map(|item| match item {
                        TextItem::Text(text) => Sentence::new(&text),
                        TextItem::Sentence(sentence) => sentence,
                    })
                    .collect())
            }
        }
    }
}

impl From<&str> for TextInput {
    fn from(text: &str) -> Self {
        TextInput::Text(text.to_string())
    }
}

impl From<String> for TextInput {
    fn from(text: String) -> Self {
        TextInput::Text(text)
    }
}

impl From<Vec<String>> for TextInput {
    fn from(texts: Vec<String>) -> Self {
        TextInput::Texts(texts)
    }
}

impl From<Vec<&str>> for TextInput {
    fn from(texts: Vec<&str>) -> Self {
        TextInput::Texts(texts.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for TextInput {
    fn from(texts: &[&str]) -> Self {
        TextInput::Texts(texts.iter().map(|t| t.to_string()).collect())
    }
}

impl From<Sentence> for TextInput {
    fn from(sentence: Sentence) -> Self {
        TextInput::Sentence(sentence)
    }
}

impl From<Vec<Sentence>> for TextInput {
    fn from(sentences: Vec<Sentence>) -> Self {
        TextInput::Sentences(sentences)
    }
}

impl From<Vec<TextItem>> for TextInput {
    fn from(items: Vec<TextItem>) -> Self {
        TextInput::Items(items)
    }
}
