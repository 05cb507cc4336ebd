//! Vendor adapters and the transport they share

mod adapter;
mod anthropic;
mod factory;
mod gemini;
mod http_client;
mod key_rotation;
mod openai;
mod openai_responses;

pub use adapter::{adapt_sse, event_name, EventDecoder, ToolCallAccumulator};
pub use anthropic::{AnthropicAdapter, AnthropicStreamDecoder};
pub use factory::{vendor_for, ProviderFactory};
pub use gemini::{GeminiAdapter, GeminiStreamDecoder};
pub use http_client::{ByteStream, HttpClient, HttpClientTrait};
pub use key_rotation::ApiKeyRing;
pub use openai::{ChatStreamDecoder, OpenAiChatAdapter};
pub use openai_responses::{OpenAiResponsesAdapter, ResponsesStreamDecoder};
