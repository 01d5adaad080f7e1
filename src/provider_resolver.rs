//! Provider selection and generation.
//!
//! An explicit provider choice is a hard commitment: one attempt, and any
//! failure is returned. In auto mode providers are probed one at a time in
//! [`ProviderKind::PRIORITY`] order and the first detected provider that
//! generates successfully wins. A detected provider whose generation fails
//! is logged and the scan moves on to the next candidate.

use crate::config::Settings;
use crate::error::RefineError;
use crate::http_client::HttpClient;
use crate::llm_generator::{HttpBackend, LlmBackend, system_prompt};
use crate::provider_kind::{ProviderChoice, ProviderKind};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A successful refinement and the label of the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refinement {
    pub refined: String,
    pub provider: String,
}

pub struct ProviderResolver {
    backends: Vec<Box<dyn LlmBackend>>,
}

impl ProviderResolver {
    /// Resolver over the real HTTP backends.
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self::with_backends(HttpBackend::all(http))
    }

    /// Resolver over the given backends, kept in priority order for auto mode.
    pub fn with_backends(mut backends: Vec<Box<dyn LlmBackend>>) -> Self {
        backends.sort_by_key(|b| priority_of(b.kind()));
        Self { backends }
    }

    fn backend(&self, kind: ProviderKind) -> Option<&dyn LlmBackend> {
        self.backends
            .iter()
            .find(|b| b.kind() == kind)
            .map(|b| b.as_ref())
    }

    /// Turns raw intention text into the refined three-line form.
    ///
    /// `input` is expected to be non-empty after trimming.
    pub async fn refine_intention(
        &self,
        input: &str,
        settings: &Settings,
    ) -> Result<Refinement, RefineError> {
        match settings.provider {
            ProviderChoice::Fixed(kind) => self.refine_with(kind, input, settings).await,
            ProviderChoice::Auto => self.refine_auto(input, settings).await,
        }
    }

    async fn refine_with(
        &self,
        kind: ProviderKind,
        input: &str,
        settings: &Settings,
    ) -> Result<Refinement, RefineError> {
        if kind.requires_api_key() && settings.api_key_for(kind).is_none() {
            return Err(RefineError::MissingApiKey {
                provider: kind.label(),
                env_var: kind.env_var(),
            });
        }

        let backend = self.backend(kind).ok_or_else(|| RefineError::ProviderFailed {
            provider: kind.label(),
            message: "provider is not registered".to_string(),
        })?;

        info!("Using {} (explicit)", kind.label());
        generate_once(backend, input, settings)
            .await
            .map_err(|e| RefineError::provider_failed(kind.label(), &e))
    }

    async fn refine_auto(
        &self,
        input: &str,
        settings: &Settings,
    ) -> Result<Refinement, RefineError> {
        let mut tried = Vec::new();
        for backend in &self.backends {
            let label = backend.kind().label();
            if !backend.detect(settings).await {
                debug!("{} not detected", label);
                tried.push(format!("{}: not detected", label));
                continue;
            }

            info!("Detected {}, requesting refinement", label);
            match generate_once(backend.as_ref(), input, settings).await {
                Ok(refinement) => return Ok(refinement),
                Err(e) => {
                    warn!("{} was detected but generation failed: {:#}", label, e);
                    tried.push(format!("{}: generation failed", label));
                }
            }
        }

        Err(RefineError::NoProviderAvailable { tried })
    }
}

async fn generate_once(
    backend: &dyn LlmBackend,
    input: &str,
    settings: &Settings,
) -> anyhow::Result<Refinement> {
    let refined = backend
        .generate(settings, system_prompt(settings), input)
        .await?;
    Ok(Refinement {
        refined: refined.trim().to_string(),
        provider: backend.kind().label().to_string(),
    })
}

fn priority_of(kind: ProviderKind) -> usize {
    ProviderKind::PRIORITY
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(usize::MAX)
}
