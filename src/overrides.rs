//! One-shot provider/model overrides from command-line flags.

use crate::config::Settings;
use crate::provider_kind::ProviderChoice;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOverrides {
    pub provider: Option<ProviderChoice>,
    pub model: Option<String>,
}

/// Returns a copy of `settings` with the overrides applied in memory.
///
/// The model override targets the effective provider after the provider
/// override is applied. When that is `auto` it has no target and is dropped.
pub fn apply_overrides(settings: &Settings, overrides: &RuntimeOverrides) -> Settings {
    let mut effective = settings.clone();

    if let Some(provider) = overrides.provider {
        effective.provider = provider;
    }

    if let Some(model) = overrides.model.as_deref() {
        match effective.provider.fixed() {
            Some(kind) => effective.set_model(kind, model),
            None => debug!("Ignoring model override '{}' in auto mode", model),
        }
    }

    effective
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider_kind::ProviderKind;

    #[test]
    fn test_empty_overrides_are_identity() {
        let mut settings = Settings::default();
        settings.provider = ProviderChoice::Fixed(ProviderKind::Groq);
        let before = settings.clone();

        let result = apply_overrides(&settings, &RuntimeOverrides::default());

        assert_eq!(result, before);
        assert_eq!(settings, before);
    }

    #[test]
    fn test_model_override_ignored_in_auto_mode() {
        let settings = Settings::default();
        let overrides = RuntimeOverrides {
            provider: None,
            model: Some("x".to_string()),
        };

        let result = apply_overrides(&settings, &overrides);

        assert_eq!(result.provider, ProviderChoice::Auto);
        assert_eq!(result.models, settings.models);
    }

    #[test]
    fn test_provider_and_model_override() {
        let settings = Settings::default();
        let overrides = RuntimeOverrides {
            provider: Some(ProviderChoice::Fixed(ProviderKind::Ollama)),
            model: Some("x".to_string()),
        };

        let result = apply_overrides(&settings, &overrides);

        assert_eq!(result.provider, ProviderChoice::Fixed(ProviderKind::Ollama));
        assert_eq!(result.models["ollama"], "x");
        assert_eq!(settings.models["ollama"], "llama3.2");
    }

    #[test]
    fn test_model_override_targets_configured_provider() {
        let mut settings = Settings::default();
        settings.provider = ProviderChoice::Fixed(ProviderKind::OpenAi);
        let overrides = RuntimeOverrides {
            provider: None,
            model: Some("gpt-4.1".to_string()),
        };

        let result = apply_overrides(&settings, &overrides);

        assert_eq!(result.model_for(ProviderKind::OpenAi), "gpt-4.1");
        assert_eq!(result.model_for(ProviderKind::Ollama), "llama3.2");
    }

    #[test]
    fn test_switching_to_auto_drops_model_override() {
        let mut settings = Settings::default();
        settings.provider = ProviderChoice::Fixed(ProviderKind::Anthropic);
        let overrides = RuntimeOverrides {
            provider: Some(ProviderChoice::Auto),
            model: Some("claude-x".to_string()),
        };

        let result = apply_overrides(&settings, &overrides);

        assert_eq!(result.provider, ProviderChoice::Auto);
        assert_eq!(result.models, settings.models);
    }
}
