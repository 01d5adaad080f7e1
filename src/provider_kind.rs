//! The fixed set of providers and the `auto` sentinel.
//!
//! Every provider belongs to exactly one capability class: host-based
//! providers run as local network services and need a reachable URL,
//! key-based providers are cloud APIs and need a secret.

use crate::error::UnknownProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a provider is reached and authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Local service addressed by a base URL, no credentials.
    HostBased,
    /// Cloud API authenticated with an API key.
    KeyBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    Ollama,
    LmStudio,
    OpenAi,
    Anthropic,
    Groq,
}

impl ProviderKind {
    /// All providers in auto-detection priority order: local services first.
    pub const PRIORITY: [ProviderKind; 5] = [
        ProviderKind::Ollama,
        ProviderKind::LmStudio,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Groq,
    ];

    /// Name used in settings files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::LmStudio => "lmstudio",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Groq => "groq",
        }
    }

    /// Human-readable label reported back to the user.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "Ollama",
            ProviderKind::LmStudio => "LM Studio",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Groq => "Groq",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            ProviderKind::Ollama | ProviderKind::LmStudio => Capability::HostBased,
            ProviderKind::OpenAi | ProviderKind::Anthropic | ProviderKind::Groq => {
                Capability::KeyBased
            }
        }
    }

    pub fn is_host_based(&self) -> bool {
        self.capability() == Capability::HostBased
    }

    pub fn requires_api_key(&self) -> bool {
        self.capability() == Capability::KeyBased
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "llama3.2",
            ProviderKind::LmStudio => "llama-3.2-3b-instruct",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-haiku-latest",
            ProviderKind::Groq => "llama-3.3-70b-versatile",
        }
    }

    /// Default base URL for host-based providers.
    pub fn default_host(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Ollama => Some("http://localhost:11434"),
            ProviderKind::LmStudio => Some("http://localhost:1234"),
            _ => None,
        }
    }

    /// Fixed API base URL for key-based providers.
    pub fn api_base(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("https://api.openai.com/v1"),
            ProviderKind::Anthropic => Some("https://api.anthropic.com/v1"),
            ProviderKind::Groq => Some("https://api.groq.com/openai/v1"),
            _ => None,
        }
    }

    /// Environment variable that may carry this provider's key or host.
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "OLLAMA_HOST",
            ProviderKind::LmStudio => "LMSTUDIO_HOST",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "lmstudio" | "lm-studio" | "lm_studio" => Ok(ProviderKind::LmStudio),
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "groq" => Ok(ProviderKind::Groq),
            _ => Err(UnknownProvider(s.trim().to_string())),
        }
    }
}

/// The `provider` setting: a concrete provider or auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProviderChoice {
    Auto,
    Fixed(ProviderKind),
}

impl ProviderChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderChoice::Auto => "auto",
            ProviderChoice::Fixed(kind) => kind.as_str(),
        }
    }

    /// The concrete provider, if one is selected.
    pub fn fixed(&self) -> Option<ProviderKind> {
        match self {
            ProviderChoice::Auto => None,
            ProviderChoice::Fixed(kind) => Some(*kind),
        }
    }
}

impl fmt::Display for ProviderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderChoice {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(ProviderChoice::Auto);
        }
        s.parse().map(ProviderChoice::Fixed)
    }
}

impl TryFrom<String> for ProviderChoice {
    type Error = UnknownProvider;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProviderChoice> for String {
    fn from(choice: ProviderChoice) -> Self {
        choice.as_str().to_string()
    }
}
