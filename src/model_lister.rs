//! Queries each provider's model-listing endpoint.

use crate::config::Settings;
use crate::http_client::HttpClient;
use crate::llm_generator::{PROBE_TIMEOUT, auth_headers, ensure_success, models_url};
use crate::provider_kind::{ProviderChoice, ProviderKind};
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const LISTING_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelItem>,
}

#[derive(Debug, Deserialize)]
struct ModelItem {
    id: String,
}

pub struct ModelLister {
    http: Arc<dyn HttpClient>,
}

impl ModelLister {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// Sorted, de-duplicated model identifiers offered by `kind`.
    pub async fn list_models(&self, kind: ProviderKind, settings: &Settings) -> Result<Vec<String>> {
        let url = models_url(kind, settings)
            .ok_or_else(|| anyhow!("No host configured for {}", kind.label()))?;

        let headers = if kind.requires_api_key() {
            let key = settings
                .api_key_for(kind)
                .ok_or_else(|| anyhow!("No API key configured for {}", kind.label()))?;
            auth_headers(kind, key)
        } else {
            Vec::new()
        };
        let headers: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();

        // Local services answer instantly or not at all.
        let timeout = if kind.is_host_based() { PROBE_TIMEOUT } else { LISTING_TIMEOUT };
        debug!("Listing {} models from {}", kind.label(), url);
        let response = self
            .http
            .get(&url, &headers, Some(timeout))
            .await
            .with_context(|| format!("{} is not reachable at {}", kind.label(), url))?;
        ensure_success(kind, &response)?;

        let mut ids = match kind {
            ProviderKind::Ollama => serde_json::from_str::<OllamaTags>(&response.body)
                .with_context(|| format!("failed to parse {} model list", kind.label()))?
                .models
                .into_iter()
                .map(|m| m.name)
                .collect::<Vec<_>>(),
            _ => serde_json::from_str::<ModelList>(&response.body)
                .with_context(|| format!("failed to parse {} model list", kind.label()))?
                .data
                .into_iter()
                .map(|m| m.id)
                .collect::<Vec<_>>(),
        };

        ids = ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Prints the models of one provider, or of every provider in priority
    /// order for `auto`. Unreachable providers are reported inline.
    pub async fn print_models_with_io<W: Write>(
        &self,
        choice: ProviderChoice,
        settings: &Settings,
        output: &mut W,
    ) -> Result<()> {
        let kinds: Vec<ProviderKind> = match choice.fixed() {
            Some(kind) => vec![kind],
            None => ProviderKind::PRIORITY.to_vec(),
        };

        for kind in kinds {
            writeln!(output, "{}:", kind.label())?;
            match self.list_models(kind, settings).await {
                Ok(models) if models.is_empty() => writeln!(output, "  (no models found)")?,
                Ok(models) => {
                    for model in models {
                        let marker = if model == settings.model_for(kind) { " (configured)" } else { "" };
                        writeln!(output, "  {}{}", model, marker)?;
                    }
                }
                Err(e) => writeln!(output, "  (unavailable: {:#})", e)?,
            }
        }
        Ok(())
    }

    pub async fn print_models(&self, choice: ProviderChoice, settings: &Settings) -> Result<()> {
        self.print_models_with_io(choice, settings, &mut io::stdout()).await
    }
}
