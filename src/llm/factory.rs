// src/llm/factory.rs
// Provider factory for managing multiple LLM clients

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::ApiKeys;
use crate::error::AgentError;
use crate::llm::gemini::GeminiClient;
use crate::llm::openai_compat::DeepSeekClient;
use crate::llm::provider::{LlmClient, Provider};

/// Factory for creating and managing LLM provider clients
pub struct ProviderFactory {
    clients: HashMap<Provider, Arc<dyn LlmClient>>,
    default_provider: Option<Provider>,
    fallback_order: Vec<Provider>,
}

impl std::fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .field("default_provider", &self.default_provider)
            .field("fallback_order", &self.fallback_order)
            .finish()
    }
}

impl ProviderFactory {
    /// Create a factory from pre-loaded API keys. Fails when no key is
    /// present - the server cannot do anything without a model.
    pub fn from_api_keys(api_keys: &ApiKeys) -> Result<Self, AgentError> {
        api_keys.require_any()?;

        let mut clients: HashMap<Provider, Arc<dyn LlmClient>> = HashMap::new();

        let default_provider = std::env::var("DEFAULT_LLM_PROVIDER")
            .ok()
            .and_then(|s| Provider::from_str(&s));

        if let Some(ref key) = api_keys.deepseek {
            info!("DeepSeek client initialized");
            clients.insert(
                Provider::DeepSeek,
                Arc::new(DeepSeekClient::new(key.clone())),
            );
        }

        if let Some(ref key) = api_keys.gemini {
            info!("Gemini client initialized");
            clients.insert(Provider::Gemini, Arc::new(GeminiClient::new(key.clone())));
        }

        let available: Vec<_> = clients.keys().map(|p| p.to_string()).collect();
        info!(providers = ?available, "LLM providers available");

        Ok(Self {
            clients,
            default_provider,
            fallback_order: vec![Provider::DeepSeek, Provider::Gemini],
        })
    }

    /// The client every agent uses unless a specific provider is requested.
    /// Priority: configured default -> fallback chain.
    pub fn default_client(&self) -> Arc<dyn LlmClient> {
        if let Some(ref provider) = self.default_provider
            && let Some(client) = self.clients.get(provider)
        {
            return client.clone();
        }

        for provider in &self.fallback_order {
            if let Some(client) = self.clients.get(provider) {
                return client.clone();
            }
        }

        // from_api_keys guarantees at least one client
        unreachable!("provider factory constructed without clients")
    }

    /// Get a specific provider client (if available)
    pub fn get_provider(&self, provider: Provider) -> Option<Arc<dyn LlmClient>> {
        self.clients.get(&provider).cloned()
    }

    /// List all available providers
    pub fn available_providers(&self) -> Vec<Provider> {
        self.clients.keys().copied().collect()
    }

    /// Check if a specific provider is available
    pub fn is_available(&self, provider: Provider) -> bool {
        self.clients.contains_key(&provider)
    }
}
