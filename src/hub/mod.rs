//! Model hubs and model references.
//!
//! A [`ModelHub`] maps a search string to [`ModelRecord`]s. Two hubs are
//! provided: [`flair::FlairModelHub`] (a catalog of Flair embedding names) and
//! [`hf::HfModelHub`] (the Hugging Face model API). [`ModelReference`] is what
//! callers hand to the resolver.

pub mod download;
pub mod flair;
pub mod hf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which hub a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubOrigin {
    Flair,
    HuggingFace,
}

impl HubOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flair => "flair",
            Self::HuggingFace => "hugging_face",
        }
    }
}

impl std::fmt::Display for HubOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HubOrigin {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flair" => Ok(Self::Flair),
            "hf" | "huggingface" | "hugging_face" => Ok(Self::HuggingFace),
            _ => Err(format!("unknown hub: {s}")),
        }
    }
}

/// A model found on a hub.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Canonical name on the hub, e.g. `flairNLP/glove` or `google-bert/bert-base-cased`.
    pub name: String,
    pub origin: HubOrigin,
}

impl ModelRecord {
    pub fn new(name: impl Into<String>, origin: HubOrigin) -> Self {
        Self {
            name: name.into(),
            origin,
        }
    }
}

/// Identifies a pretrained model: a bare key to search for, or a hub record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelReference {
    Key(String),
    Flair(ModelRecord),
    HuggingFace(ModelRecord),
}

impl ModelReference {
    /// The string the reference was built from.
    pub fn name(&self) -> &str {
        match self {
            Self::Key(key) => key,
            Self::Flair(record) | Self::HuggingFace(record) => &record.name,
        }
    }
}

impl Default for ModelReference {
    fn default() -> Self {
        Self::Key(DEFAULT_MODEL.to_string())
    }
}

impl std::fmt::Display for ModelReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Flair(record) | Self::HuggingFace(record) => {
                write!(f, "{}:{}", record.origin, record.name)
            }
        }
    }
}

impl From<&str> for ModelReference {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for ModelReference {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<ModelRecord> for ModelReference {
    fn from(record: ModelRecord) -> Self {
        match record.origin {
            HubOrigin::Flair => Self::Flair(record),
            HubOrigin::HuggingFace => Self::HuggingFace(record),
        }
    }
}

/// Model key used when a caller does not name one.
pub const DEFAULT_MODEL: &str = "bert-base-cased";

/// Search surface of a model catalog.
pub trait ModelHub {
    /// Records whose name matches `name`. `user_uploaded` widens the search to
    /// community models in addition to the hub's official ones.
    fn search_model_by_name(&self, name: &str, user_uploaded: bool) -> Result<Vec<ModelRecord>>;
}

/// Move exact matches (`name` itself or `<namespace>/name`) to the front,
/// keeping hub order otherwise.
pub(crate) fn exact_first(records: &mut [ModelRecord], name: &str) {
    let suffix = format!("/{name}");
    records.sort_by_key(|r| !(r.name == name || r.name.ends_with(&suffix)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_converts_by_origin() {
        let flair: ModelReference = ModelRecord::new("flairNLP/glove", HubOrigin::Flair).into();
        assert!(matches!(flair, ModelReference::Flair(_)));

        let hf: ModelReference = ModelRecord::new("bert-base-cased", HubOrigin::HuggingFace).into();
        assert!(matches!(hf, ModelReference::HuggingFace(_)));
        assert_eq!(hf.name(), "bert-base-cased");
    }

    #[test]
    fn default_reference_is_bert() {
        assert_eq!(ModelReference::default(), ModelReference::Key("bert-base-cased".into()));
    }

    #[test]
    fn parse_hub_origin() {
        assert_eq!("HF".parse::<HubOrigin>().unwrap(), HubOrigin::HuggingFace);
        assert_eq!("flair".parse::<HubOrigin>().unwrap(), HubOrigin::Flair);
        assert!("spacy".parse::<HubOrigin>().is_err());
    }

    #[test]
    fn exact_matches_sort_first() {
        let mut records = vec![
            ModelRecord::new("dslim/bert-base-cased-ner", HubOrigin::HuggingFace),
            ModelRecord::new("google-bert/bert-base-cased", HubOrigin::HuggingFace),
            ModelRecord::new("bert-base-cased-finetuned", HubOrigin::HuggingFace),
        ];
        exact_first(&mut records, "bert-base-cased");
        assert_eq!(records[0].name, "google-bert/bert-base-cased");
        assert_eq!(records[1].name, "dslim/bert-base-cased-ner");
    }
}
