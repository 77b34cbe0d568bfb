use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("phone number is empty after normalization")]
    EmptyPhone,
}

pub type Result<T> = std::result::Result<T, SessionError>;
