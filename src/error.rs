//! Error types surfaced to the command line.

use thiserror::Error;

/// A provider name that is not part of the fixed provider set.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown provider '{0}'. Expected one of: auto, ollama, lmstudio, openai, anthropic, groq")]
pub struct UnknownProvider(pub String);

/// Failures of the provider resolver.
#[derive(Debug, Error)]
pub enum RefineError {
    #[error("No API key configured for {provider}. Run `intent --setup` or set {env_var}.")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },
    #[error("{provider} request failed: {message}")]
    ProviderFailed {
        provider: &'static str,
        message: String,
    },
    /// Auto mode ran out of providers. `tried` holds one note per provider
    /// in probe order, e.g. `Ollama: not detected`.
    #[error(
        "No LLM provider available ({}). Start Ollama or LM Studio, or configure an API key with `intent --setup`.",
        summarize(.tried)
    )]
    NoProviderAvailable { tried: Vec<String> },
}

fn summarize(tried: &[String]) -> String {
    if tried.is_empty() {
        "no providers registered".to_string()
    } else {
        tried.join("; ")
    }
}

impl RefineError {
    /// Wraps an underlying transport or API error with the provider's label.
    pub fn provider_failed(provider: &'static str, err: &anyhow::Error) -> Self {
        RefineError::ProviderFailed {
            provider,
            message: format!("{:#}", err),
        }
    }
}
