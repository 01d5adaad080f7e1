//! Intention - turn a free-form goal into a committed three-line intention.
//!
//! This library provides the core functionality behind the `intent` command:
//!
//! - **Provider resolution** across local services (Ollama, LM Studio) and
//!   cloud APIs (OpenAI, Anthropic, Groq), explicit or auto-detected
//! - **Settings** persisted as JSON and merged over compiled-in defaults
//! - **Runtime overrides** of provider and model for a single run
//! - **A dated entry log**, newest entry first
//! - **Interactive setup** and configuration editing
//!
//! # Architecture
//!
//! - [`provider_kind`] - The fixed provider set and the `auto` choice
//! - [`config`] - Settings record and its on-disk store
//! - [`overrides`] - One-shot provider/model overrides
//! - [`http_client`] - HTTP client abstraction
//! - [`llm_generator`] - Per-provider detection and generation
//! - [`provider_resolver`] - Explicit selection or ordered auto-detection
//! - [`model_lister`] - Model listing for interactive choices
//! - [`entry_log`] - Dated entries, prepended to a text file
//! - [`setup_wizard`] - Setup wizard and configuration editor
//! - [`intention_router`] - The main flow from text to log entry
//! - [`providers`] - Shared dependency injection traits
//! - [`error`] - Error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use intention::config::SettingsStore;
//! use intention::http_client::ReqwestHttpClient;
//! use intention::intention_router::IntentionRouter;
//! use intention::overrides::RuntimeOverrides;
//! use intention::provider_resolver::ProviderResolver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = SettingsStore::default_location()?.load()?;
//!     let resolver = ProviderResolver::new(Arc::new(ReqwestHttpClient::new()));
//!     let router = IntentionRouter::new(resolver);
//!
//!     let outcome = router
//!         .process_intention("finally learn to juggle", &settings, &RuntimeOverrides::default())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entry_log;
pub mod error;
pub mod http_client;
pub mod intention_router;
pub mod llm_generator;
pub mod model_lister;
pub mod overrides;
pub mod provider_kind;
pub mod provider_resolver;
pub mod providers;
pub mod setup_wizard;
