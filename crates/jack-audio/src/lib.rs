pub mod error;

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use jack_core::config::AudioConfig;
use serde::{Deserialize, Serialize};

pub use error::{AudioError, Result};

/// A single function in spirit: bytes + mime → text. Kept behind a trait so
/// the orchestrator's tests never have to reach the network.
#[async_trait]
pub trait AudioTranscriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String>;
}

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    audio_base64: String,
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: String,
}

pub struct HttpAudioTranscriber {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpAudioTranscriber {
    pub fn new(config: &AudioConfig) -> Option<Self> {
        let endpoint = config.endpoint.clone()?;
        Some(Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl AudioTranscriber for HttpAudioTranscriber {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String> {
        let body = TranscribeRequest {
            audio_base64: STANDARD.encode(audio),
            mime_type,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    AudioError::TransientNetwork(e.to_string())
                } else {
                    AudioError::TranscriptionFailed(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AudioError::TranscriptionFailed(text));
        }

        let parsed: TranscribeResponse = resp
            .json()
            .await
            .map_err(|e| AudioError::TranscriptionFailed(e.to_string()))?;

        if parsed.text.trim().is_empty() {
            return Err(AudioError::TranscriptionFailed("empty transcription".to_string()));
        }

        Ok(post_process_numbers(&parsed.text))
    }
}

/// Joins runs of space-separated spoken digits ("cinco cinco cero...") the
/// upstream speech service sometimes leaves split, e.g. a spoken DNI. Mirrors
/// the number cleanup the original transcription pipeline performed.
fn post_process_numbers(text: &str) -> String {
    const DIGIT_WORDS: &[(&str, &str)] = &[
        ("cero", "0"),
        ("uno", "1"),
        ("dos", "2"),
        ("tres", "3"),
        ("cuatro", "4"),
        ("cinco", "5"),
        ("seis", "6"),
        ("siete", "7"),
        ("ocho", "8"),
        ("nueve", "9"),
    ];

    let mut words: Vec<String> = text.split_whitespace().map(|w| w.to_lowercase()).collect();
    for word in words.iter_mut() {
        for (spoken, digit) in DIGIT_WORDS {
            if word == spoken {
                *word = digit.to_string();
                break;
            }
        }
    }

    let mut out: Vec<String> = Vec::new();
    let mut run = String::new();
    for word in &words {
        if word.len() == 1 && word.chars().all(|c| c.is_ascii_digit()) {
            run.push_str(word);
        } else {
            if run.len() >= 4 {
                out.push(run.clone());
            } else if !run.is_empty() {
                out.extend(run.chars().map(|c| c.to_string()));
            }
            run.clear();
            out.push(word.clone());
        }
    }
    if run.len() >= 4 {
        out.push(run);
    } else if !run.is_empty() {
        out.extend(run.chars().map(|c| c.to_string()));
    }

    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_runs_of_spoken_digits() {
        let result = post_process_numbers("mi dni es uno dos tres cuatro cinco seis siete ocho");
        assert!(result.contains("12345678"));
    }

    #[test]
    fn leaves_short_digit_runs_separate() {
        let result = post_process_numbers("tengo dos productos");
        assert_eq!(result, "tengo 2 productos");
    }
}
