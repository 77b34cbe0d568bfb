use std::sync::Arc;

use axum::{routing::post, Router};
use jack_audio::{AudioTranscriber, HttpAudioTranscriber};
use jack_core::JackConfig;
use jack_issuing::{HttpIssuingClient, IssuingClient};
use jack_orchestrator::{AnswerModel, NullAnswerModel, Orchestrator};
use jack_orchestrator::answer::HttpAnswerModel;

/// Central shared state — passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(config: JackConfig) -> Self {
        let issuing: Arc<dyn IssuingClient> = Arc::new(HttpIssuingClient::new(config.issuing.clone()));

        let audio: Option<Arc<dyn AudioTranscriber>> =
            HttpAudioTranscriber::new(&config.audio).map(|t| Arc::new(t) as Arc<dyn AudioTranscriber>);

        let answer: Arc<dyn AnswerModel> = build_answer_model(&config);

        Self {
            orchestrator: Orchestrator::new(&config, issuing, audio, answer),
        }
    }
}

fn build_answer_model(config: &JackConfig) -> Arc<dyn AnswerModel> {
    match HttpAnswerModel::new(&config.llm) {
        Some(model) => Arc::new(model),
        None => Arc::new(NullAnswerModel),
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", axum::routing::get(crate::http::health::health_handler))
        .route("/message", post(crate::http::message::message_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
