use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("transcription service unreachable: {0}")]
    TransientNetwork(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;
