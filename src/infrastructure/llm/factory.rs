use std::sync::Arc;

use super::anthropic::AnthropicAdapter;
use super::gemini::GeminiAdapter;
use super::http_client::HttpClient;
use super::openai::OpenAiChatAdapter;
use super::openai_responses::OpenAiResponsesAdapter;
use crate::domain::capability::{model_family, ModelFamily};
use crate::domain::completions::{AbortRegistry, TagPairSelector};
use crate::domain::{DomainError, Model, Provider, ProviderType, VendorAdapter, VendorKind};
use crate::infrastructure::services::{CompletionsEngine, EngineConfig};

/// Wire protocol spoken for `model` on `provider`.
///
/// Aggregators proxy several vendors; Claude and Gemini models keep their native protocol,
/// everything else goes through OpenAI chat.
pub fn vendor_for(provider: &Provider, model: &Model) -> VendorKind {
    match provider.provider_type {
        ProviderType::OpenAi => VendorKind::OpenAiChat,
        ProviderType::OpenAiResponse => VendorKind::OpenAiResponses,
        ProviderType::Anthropic => VendorKind::Anthropic,
        ProviderType::Gemini => VendorKind::Gemini,
        ProviderType::Aggregator => match model_family(model) {
            ModelFamily::Claude => VendorKind::Anthropic,
            ModelFamily::Gemini => VendorKind::Gemini,
            _ => VendorKind::OpenAiChat,
        },
    }
}

/// Builds vendor adapters and completion engines for configured providers
#[derive(Debug, Clone)]
pub struct ProviderFactory {
    client: HttpClient,
    registry: Arc<AbortRegistry>,
    engine_config: EngineConfig,
    tag_pairs: TagPairSelector,
}

impl ProviderFactory {
    pub fn new(registry: Arc<AbortRegistry>) -> Self {
        Self::with_client(HttpClient::new(), registry)
    }

    pub fn with_client(client: HttpClient, registry: Arc<AbortRegistry>) -> Self {
        Self {
            client,
            registry,
            engine_config: EngineConfig::default(),
            tag_pairs: TagPairSelector::default(),
        }
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub fn with_tag_pairs(mut self, tag_pairs: TagPairSelector) -> Self {
        self.tag_pairs = tag_pairs;
        self
    }

    pub fn registry(&self) -> &Arc<AbortRegistry> {
        &self.registry
    }

    /// Adapter for `model` on `provider`; chosen once, never switched mid-call
    pub fn create_adapter(&self, provider: &Provider, model: &Model) -> Arc<dyn VendorAdapter> {
        let client = self.client.clone();
        let host = provider.api_host.trim();
        let headers = sorted_headers(provider);

        match vendor_for(provider, model) {
            VendorKind::OpenAiChat => {
                let adapter = if host.is_empty() {
                    OpenAiChatAdapter::new(client)
                } else {
                    OpenAiChatAdapter::with_base_url(client, host)
                };
                Arc::new(adapter.with_headers(headers))
            }
            VendorKind::OpenAiResponses => {
                let adapter = if host.is_empty() {
                    OpenAiResponsesAdapter::new(client)
                } else {
                    OpenAiResponsesAdapter::with_base_url(client, host)
                };
                Arc::new(adapter.with_headers(headers))
            }
            VendorKind::Anthropic => {
                let adapter = if host.is_empty() {
                    AnthropicAdapter::new(client)
                } else {
                    AnthropicAdapter::with_base_url(client, host)
                };
                Arc::new(adapter.with_headers(headers))
            }
            VendorKind::Gemini => {
                let adapter = if host.is_empty() {
                    GeminiAdapter::new(client)
                } else {
                    GeminiAdapter::with_base_url(client, host)
                };
                Arc::new(adapter.with_headers(headers))
            }
        }
    }

    /// Engine serving `model` on `provider`
    pub fn create_engine(
        &self,
        provider: Provider,
        model: &Model,
    ) -> Result<CompletionsEngine, DomainError> {
        if provider.api_keys().is_empty() {
            return Err(DomainError::configuration(format!(
                "Provider {} has no API key configured",
                provider.id
            )));
        }

        let adapter = self.create_adapter(&provider, model);
        tracing::debug!(
            provider = %provider.id,
            model = %model.id(),
            vendor = ?adapter.vendor(),
            "Created vendor adapter"
        );

        Ok(CompletionsEngine::new(adapter, provider, Arc::clone(&self.registry))
            .with_config(self.engine_config.clone())
            .with_tag_pairs(self.tag_pairs.clone()))
    }
}

fn sorted_headers(provider: &Provider) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = provider
        .extra_headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    headers.sort();
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(kind: ProviderType, host: &str) -> Provider {
        Provider::new("test", kind, host).with_api_key("sk-a,sk-b")
    }

    #[test]
    fn test_vendor_per_provider_type() {
        let model = Model::new("gpt-4o", "test");
        assert_eq!(
            vendor_for(&provider(ProviderType::OpenAi, ""), &model),
            VendorKind::OpenAiChat
        );
        assert_eq!(
            vendor_for(&provider(ProviderType::OpenAiResponse, ""), &model),
            VendorKind::OpenAiResponses
        );
        assert_eq!(
            vendor_for(&provider(ProviderType::Anthropic, ""), &model),
            VendorKind::Anthropic
        );
        assert_eq!(
            vendor_for(&provider(ProviderType::Gemini, ""), &model),
            VendorKind::Gemini
        );
    }

    #[test]
    fn test_aggregator_routes_by_model_family() {
        let aggregator = provider(ProviderType::Aggregator, "https://gateway.example.com");
        assert_eq!(
            vendor_for(&aggregator, &Model::new("anthropic/claude-sonnet-4", "test")),
            VendorKind::Anthropic
        );
        assert_eq!(
            vendor_for(&aggregator, &Model::new("gemini-2.5-pro", "test")),
            VendorKind::Gemini
        );
        assert_eq!(
            vendor_for(&aggregator, &Model::new("deepseek-r1", "test")),
            VendorKind::OpenAiChat
        );
    }

    #[test]
    fn test_create_adapter() {
        let factory = ProviderFactory::new(Arc::new(AbortRegistry::new()));
        let adapter = factory.create_adapter(
            &provider(ProviderType::Anthropic, "https://proxy.example.com")
                .with_header("X-Team", "core"),
            &Model::new("claude-sonnet-4-20250514", "test"),
        );
        assert_eq!(adapter.vendor(), VendorKind::Anthropic);
        assert_eq!(adapter.provider_name(), "anthropic");
    }

    #[test]
    fn test_create_engine_requires_key() {
        let factory = ProviderFactory::new(Arc::new(AbortRegistry::new()));
        let keyless = Provider::new("empty", ProviderType::OpenAi, "");

        let result = factory.create_engine(keyless, &Model::new("gpt-4o", "empty"));
        assert!(matches!(result, Err(DomainError::Configuration { .. })));

        let engine = factory
            .create_engine(provider(ProviderType::Gemini, ""), &Model::new("gemini-2.5-flash", "test"))
            .unwrap();
        assert_eq!(engine.provider().id, "test");
    }
}
