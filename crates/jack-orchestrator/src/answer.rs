//! Open-ended question fallback. Canned answers in [`crate::conversation`]
//! cover the high-traffic questions; anything else reaches here as a last
//! resort, so it is kept behind a trait and a default-on `llm` feature —
//! tests never need network access.

use async_trait::async_trait;

/// One piece of cached context handed to the model alongside the prompt.
pub struct AnswerContext<'a> {
    pub system_prompt: &'a str,
    pub rag_context: String,
    pub conversation: String,
    pub user_name: &'a str,
    pub message: &'a str,
}

#[async_trait]
pub trait AnswerModel: Send + Sync {
    async fn answer(&self, ctx: AnswerContext<'_>) -> Option<String>;
}

/// Used when the `llm` feature is disabled, or no endpoint is configured.
/// Always degrades to `None` so the caller falls back to a canned reply.
pub struct NullAnswerModel;

#[async_trait]
impl AnswerModel for NullAnswerModel {
    async fn answer(&self, _ctx: AnswerContext<'_>) -> Option<String> {
        None
    }
}

#[cfg(feature = "llm")]
pub use http_impl::HttpAnswerModel;

#[cfg(feature = "llm")]
mod http_impl {
    use std::time::Duration;

    use async_trait::async_trait;
    use jack_core::config::LlmConfig;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, warn};

    use super::{AnswerContext, AnswerModel};

    #[derive(Serialize)]
    struct GenerateRequest<'a> {
        model: &'a str,
        prompt: String,
    }

    #[derive(Deserialize)]
    struct GenerateResponse {
        #[serde(default)]
        response: String,
    }

    /// Talks to a generic "prompt in, text out" completion endpoint. Modeled
    /// on a single-shot generate call rather than a chat-turn API, since the
    /// caller already folds history into one prompt string.
    pub struct HttpAnswerModel {
        client: reqwest::Client,
        endpoint: String,
        model: String,
        timeout: Duration,
    }

    impl HttpAnswerModel {
        pub fn new(config: &LlmConfig) -> Option<Self> {
            let endpoint = config.endpoint.clone()?;
            Some(Self {
                client: reqwest::Client::new(),
                endpoint,
                model: config.model.clone().unwrap_or_else(|| "default".to_string()),
                timeout: Duration::from_secs(config.timeout_secs),
            })
        }
    }

    #[async_trait]
    impl AnswerModel for HttpAnswerModel {
        async fn answer(&self, ctx: AnswerContext<'_>) -> Option<String> {
            let prompt = format!(
                "{}\n\nUsuario: {}\nContexto: {}\nConversación: {}\nMensaje: {}\n\nResponde brevemente. NO muestres menú.\n\nRespuesta:",
                ctx.system_prompt, ctx.user_name, ctx.rag_context, ctx.conversation, ctx.message
            );

            let body = GenerateRequest {
                model: &self.model,
                prompt,
            };

            let resp = match self
                .client
                .post(&self.endpoint)
                .header("content-type", "application/json")
                .json(&body)
                .timeout(self.timeout)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    debug!(error = %e, "llm fallback unreachable");
                    return None;
                }
            };

            if !resp.status().is_success() {
                warn!(status = %resp.status(), "llm fallback returned an error status");
                return None;
            }

            match resp.json::<GenerateResponse>().await {
                Ok(parsed) if !parsed.response.trim().is_empty() => Some(parsed.response.trim().to_string()),
                _ => None,
            }
        }
    }
}
