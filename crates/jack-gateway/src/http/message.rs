//! Front door — POST /message
//!
//! Single RPC: caller phone, optional text utterance, optional base64 audio
//! + MIME, returning a single reply string. Malformed or empty payloads get
//! a short clarifying reply rather than an HTTP error, since the caller on
//! the other end of this is a chat channel, not a program.

use axum::{extract::State, http::StatusCode, Json};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct MessageRequest {
    pub phone: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub audio_base64: Option<String>,
    #[serde(default)]
    pub audio_mime_type: Option<String>,
}

#[derive(Serialize)]
pub struct MessageReply {
    pub reply: String,
}

#[derive(Serialize)]
pub struct MessageError {
    pub error: String,
}

pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageReply>, (StatusCode, Json<MessageError>)> {
    if req.phone.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(MessageError {
                error: "phone is required".to_string(),
            }),
        ));
    }

    let decoded_audio = match (&req.audio_base64, &req.audio_mime_type) {
        (Some(b64), Some(mime_type)) => match STANDARD.decode(b64) {
            Ok(bytes) => Some((bytes, mime_type.as_str())),
            Err(e) => {
                warn!(error = %e, "audio_base64 did not decode");
                None
            }
        },
        _ => None,
    };

    let reply = state
        .orchestrator
        .handle_message(&req.phone, req.text.as_deref(), decoded_audio.as_ref().map(|(bytes, mime)| (bytes.as_slice(), *mime)))
        .await;

    Ok(Json(MessageReply { reply }))
}
