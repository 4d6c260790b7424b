use std::path::Path;

use anyhow::{Context, Result};
use easynlp::config::EasyConfig;
use easynlp::easy::EasyWordEmbeddings;
use easynlp::hub::download::ensure_transformer_assets;
use easynlp::hub::flair::FlairModelHub;
use easynlp::hub::hf::HfModelHub;
use easynlp::hub::{HubOrigin, ModelHub, ModelRecord, ModelReference};
use easynlp::result::DetailLevel;
use serde_json::Value;

/// A local model directory is loaded as a transformer; anything else is a key.
fn model_reference(model: &str) -> ModelReference {
    if Path::new(model).is_dir() {
        ModelRecord::new(model, HubOrigin::HuggingFace).into()
    } else {
        ModelReference::from(model)
    }
}

/// Embed `texts` with `model` and print the flattened results.
pub fn embed(config: &EasyConfig, model: &str, detail: DetailLevel, texts: Vec<String>) -> Result<()> {
    let mut embeddings = EasyWordEmbeddings::from_config(config)?;
    let dicts = embeddings.embed_text_with_detail(texts, model_reference(model), detail)?;
    let out = Value::Array(dicts.into_iter().map(Value::Object).collect());
    println!(
        "{}",
        serde_json::to_string_pretty(&out).context("failed to serialize results")?
    );
    Ok(())
}

/// Print hub records matching `query`, Flair first.
pub fn search(config: &EasyConfig, query: &str, hub: Option<HubOrigin>) -> Result<()> {
    let mut records = Vec::new();
    if hub.is_none() || hub == Some(HubOrigin::Flair) {
        let flair = FlairModelHub::with_user_models(config.hub.flair_user_models.clone());
        records.extend(flair.search_model_by_name(query, true)?);
    }
    if hub.is_none() || hub == Some(HubOrigin::HuggingFace) {
        let hf = HfModelHub::new(&config.hub)?;
        records.extend(hf.search_model_by_name(query, true)?);
    }

    if records.is_empty() {
        println!("No models match \"{query}\".");
        return Ok(());
    }
    for record in &records {
        println!("{:<14} {}", record.origin, record.name);
    }
    Ok(())
}

/// Download the ONNX export and tokenizer of `repo` into the model cache.
pub fn model_download(config: &EasyConfig, repo: &str) -> Result<()> {
    let cache_dir = config.resolved_cache_dir();
    let assets = ensure_transformer_assets(&cache_dir, &config.hub.hf_endpoint, repo)?;
    println!("Model saved to {}", assets.model_path.display());
    println!("Tokenizer saved to {}", assets.tokenizer_path.display());
    println!("Model download complete. Ready for use.");
    Ok(())
}
