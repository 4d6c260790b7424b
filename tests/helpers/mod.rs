#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use easynlp::embedding::{BackendFactory, BackendKind, Embeddings};
use easynlp::hub::{HubOrigin, ModelHub, ModelRecord};
use easynlp::resolver::ModelResolver;
use easynlp::sentence::Sentence;
use easynlp::training::NamedTokenizer;
use easynlp::{Error, Result};

pub const TRANSFORMER_DIM: usize = 8;
pub const STATIC_DIM: usize = 4;
pub const CONTEXTUAL_DIM: usize = 6;

/// Hub answering with every record whose name contains the query.
pub struct MockHub {
    records: Vec<ModelRecord>,
    queries: Rc<RefCell<Vec<(String, bool)>>>,
}

impl MockHub {
    pub fn new(origin: HubOrigin, names: &[&str]) -> Self {
        Self {
            records: names.iter().map(|n| ModelRecord::new(*n, origin)).collect(),
            queries: Rc::default(),
        }
    }

    pub fn queries(&self) -> Rc<RefCell<Vec<(String, bool)>>> {
        self.queries.clone()
    }
}

impl ModelHub for MockHub {
    fn search_model_by_name(&self, name: &str, user_uploaded: bool) -> Result<Vec<ModelRecord>> {
        self.queries.borrow_mut().push((name.to_string(), user_uploaded));
        Ok(self
            .records
            .iter()
            .filter(|r| r.name.contains(name))
            .cloned()
            .collect())
    }
}

/// Backend attaching `[idx + offset; dim]` to every token.
pub struct FakeBackend {
    name: String,
    kind: BackendKind,
    dim: usize,
    offset: f32,
}

impl FakeBackend {
    pub fn new(name: &str, kind: BackendKind, dim: usize, offset: f32) -> Self {
        Self {
            name: name.to_string(),
            kind,
            dim,
            offset,
        }
    }
}

impl Embeddings for FakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn embedding_length(&self) -> usize {
        self.dim
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn embed(&self, sentences: &mut [Sentence]) -> Result<()> {
        for sentence in sentences.iter_mut() {
            for token in sentence.tokens_mut() {
                let value = token.idx() as f32 + self.offset;
                token.set_embedding(&self.name, vec![value; self.dim]);
            }
        }
        Ok(())
    }
}

/// Factory building [`FakeBackend`]s. Static tables exist only for
/// `static_names`, contextual models for every name not in
/// `missing_contextual`; every build is logged as `"<kind>:<name>"`.
pub struct MockFactory {
    static_names: Vec<String>,
    missing_contextual: Vec<String>,
    builds: Rc<RefCell<Vec<String>>>,
}

impl MockFactory {
    pub fn new(static_names: &[&str]) -> Self {
        Self {
            static_names: static_names.iter().map(|s| s.to_string()).collect(),
            missing_contextual: Vec::new(),
            builds: Rc::default(),
        }
    }

    pub fn without_contextual(mut self, names: &[&str]) -> Self {
        self.missing_contextual = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn builds(&self) -> Rc<RefCell<Vec<String>>> {
        self.builds.clone()
    }
}

impl BackendFactory for MockFactory {
    fn transformer(&self, name: &str) -> Result<Box<dyn Embeddings>> {
        self.builds.borrow_mut().push(format!("transformer:{name}"));
        Ok(Box::new(FakeBackend::new(name, BackendKind::Transformer, TRANSFORMER_DIM, 0.0)))
    }

    fn static_word(&self, name: &str) -> Result<Box<dyn Embeddings>> {
        if !self.static_names.iter().any(|s| s == name) {
            return Err(Error::StaticEmbeddingUnavailable(name.to_string()));
        }
        self.builds.borrow_mut().push(format!("static:{name}"));
        Ok(Box::new(FakeBackend::new(name, BackendKind::StaticWord, STATIC_DIM, 100.0)))
    }

    fn contextual(&self, name: &str) -> Result<Box<dyn Embeddings>> {
        if self.missing_contextual.iter().any(|s| s == name) {
            return Err(Error::InvalidInput(format!("contextual model {name} not found")));
        }
        self.builds.borrow_mut().push(format!("contextual:{name}"));
        Ok(Box::new(FakeBackend::new(name, BackendKind::Contextual, CONTEXTUAL_DIM, 200.0)))
    }
}

/// Handles for inspecting a [`test_resolver`].
pub struct Recorded {
    pub flair_queries: Rc<RefCell<Vec<(String, bool)>>>,
    pub hf_queries: Rc<RefCell<Vec<(String, bool)>>>,
    pub builds: Rc<RefCell<Vec<String>>>,
}

/// Flair catalog: glove (static), news-forward (contextual). Hugging Face:
/// google-bert/bert-base-cased, distilbert-base-uncased.
pub fn test_resolver() -> (ModelResolver, Recorded) {
    resolver_with(
        &["flairNLP/glove", "flairNLP/news-forward"],
        &["google-bert/bert-base-cased", "distilbert-base-uncased"],
        &["glove"],
    )
}

pub fn resolver_with(flair: &[&str], hf: &[&str], static_names: &[&str]) -> (ModelResolver, Recorded) {
    resolver_with_factory(flair, hf, MockFactory::new(static_names))
}

pub fn resolver_with_factory(flair: &[&str], hf: &[&str], factory: MockFactory) -> (ModelResolver, Recorded) {
    let flair_hub = MockHub::new(HubOrigin::Flair, flair);
    let hf_hub = MockHub::new(HubOrigin::HuggingFace, hf);
    let recorded = Recorded {
        flair_queries: flair_hub.queries(),
        hf_queries: hf_hub.queries(),
        builds: factory.builds(),
    };
    let resolver = ModelResolver::new(Box::new(flair_hub), Box::new(hf_hub), Box::new(factory));
    (resolver, recorded)
}

pub const TOY_VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "the", "cat", "sat", "on", "mat", "a", "dog",
    "ran",
];

/// Word-level tokenizer over [`TOY_VOCAB`]: `[CLS] words [SEP]`.
pub fn toy_tokenizer() -> NamedTokenizer {
    let vocab: serde_json::Map<String, serde_json::Value> = TOY_VOCAB
        .iter()
        .enumerate()
        .map(|(i, w)| (w.to_string(), serde_json::json!(i)))
        .collect();
    let added: Vec<serde_json::Value> = TOY_VOCAB[..5]
        .iter()
        .enumerate()
        .map(|(i, w)| {
            serde_json::json!({
                "id": i, "content": w, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            })
        })
        .collect();
    let special = |token: &str, type_id: u32| serde_json::json!({ "SpecialToken": { "id": token, "type_id": type_id } });
    let sequence = |id: &str, type_id: u32| serde_json::json!({ "Sequence": { "id": id, "type_id": type_id } });
    let json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added,
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": {
            "type": "TemplateProcessing",
            "single": [special("[CLS]", 0), sequence("A", 0), special("[SEP]", 0)],
            "pair": [
                special("[CLS]", 0), sequence("A", 0), special("[SEP]", 0),
                sequence("B", 1), special("[SEP]", 1)
            ],
            "special_tokens": {
                "[CLS]": { "id": "[CLS]", "ids": [2], "tokens": ["[CLS]"] },
                "[SEP]": { "id": "[SEP]", "ids": [3], "tokens": ["[SEP]"] }
            }
        },
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
    });
    let tokenizer = tokenizers::Tokenizer::from_str(&json.to_string()).unwrap();
    NamedTokenizer::new("toy", tokenizer)
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
