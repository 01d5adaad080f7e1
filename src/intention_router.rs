use crate::config::Settings;
use crate::entry_log::EntryLog;
use crate::error::RefineError;
use crate::overrides::{RuntimeOverrides, apply_overrides};
use crate::provider_resolver::{ProviderResolver, Refinement};
use crate::providers::{DateProvider, SystemDateProvider};
use anyhow::Result;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Why a run ended without writing an entry.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Refine(#[from] RefineError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub refinement: Refinement,
    pub output_file: PathBuf,
}

/// Routes raw intention text through the resolver into the entry log.
pub struct IntentionRouter {
    resolver: ProviderResolver,
    dates: Box<dyn DateProvider>,
}

impl IntentionRouter {
    pub fn new(resolver: ProviderResolver) -> Self {
        Self::with_date_provider(resolver, Box::new(SystemDateProvider))
    }

    pub fn with_date_provider(resolver: ProviderResolver, dates: Box<dyn DateProvider>) -> Self {
        Self { resolver, dates }
    }

    /// Refines `text` with the effective settings and prepends the entry.
    ///
    /// Returns `Ok(None)` for blank input; nothing is generated or written.
    /// The log is only touched after generation succeeded.
    pub async fn process_intention(
        &self,
        text: &str,
        settings: &Settings,
        overrides: &RuntimeOverrides,
    ) -> Result<Option<Outcome>, FlowError> {
        let text = text.trim();
        if text.is_empty() {
            info!("Empty intention, nothing to do");
            return Ok(None);
        }

        let effective = apply_overrides(settings, overrides);
        info!("Processing intention with provider {}", effective.provider);

        let refinement = self.resolver.refine_intention(text, &effective).await?;

        let output_file = effective.output_path()?;
        EntryLog::new(&output_file).prepend(self.dates.today(), &refinement.refined)?;

        Ok(Some(Outcome {
            refinement,
            output_file,
        }))
    }
}
