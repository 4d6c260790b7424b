//! Hugging Face hub client (model search over the public API).

use std::time::Duration;

use serde::Deserialize;

use super::{exact_first, HubOrigin, ModelHub, ModelRecord};
use crate::config::HubConfig;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct HfModelEntry {
    #[serde(alias = "modelId")]
    id: String,
}

pub struct HfModelHub {
    client: reqwest::blocking::Client,
    endpoint: String,
    limit: usize,
}

impl HfModelHub {
    pub fn new(config: &HubConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.hf_endpoint.trim_end_matches('/').to_string(),
            limit: config.search_limit,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ModelHub for HfModelHub {
    fn search_model_by_name(&self, name: &str, user_uploaded: bool) -> Result<Vec<ModelRecord>> {
        let limit = self.limit.to_string();
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/models", self.endpoint),
            &[("search", name), ("limit", limit.as_str())],
        )
        .map_err(|e| Error::Hub(format!("invalid hub endpoint {}: {e}", self.endpoint)))?;
        let response = self.client.get(url).send()?;

        if !response.status().is_success() {
            return Err(Error::Hub(format!(
                "search for {name} failed with HTTP {}",
                response.status()
            )));
        }

        let body = response.text()?;
        let records = parse_search_response(&body, name, user_uploaded)?;
        tracing::debug!(query = %name, hits = records.len(), "hugging face hub search");
        Ok(records)
    }
}

/// Turn an `/api/models` response body into ordered records.
///
/// Without `user_uploaded`, namespaced (`owner/name`) models are dropped.
pub(crate) fn parse_search_response(
    body: &str,
    name: &str,
    user_uploaded: bool,
) -> Result<Vec<ModelRecord>> {
    let entries: Vec<HfModelEntry> = serde_json::from_str(body)
        .map_err(|e| Error::Hub(format!("malformed search response: {e}")))?;

    let mut records: Vec<ModelRecord> = entries
        .into_iter()
        .filter(|e| user_uploaded || !e.id.contains('/'))
        .map(|e| ModelRecord::new(e.id, HubOrigin::HuggingFace))
        .collect();

    exact_first(&mut records, name);
    Ok(records)
}
