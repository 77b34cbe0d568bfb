use thiserror::Error;

#[derive(Debug, Error)]
pub enum IssuingError {
    /// `identify_ai` returned no `IdEmpresa` — caller is not a registered merchant.
    #[error("not registered with the issuing service")]
    AuthNotRegistered,

    /// Timeout, connection refused, or a 5xx response.
    #[error("issuing service unreachable: {0}")]
    TransientNetwork(String),

    /// `store_agente_api` returned `success != "TRUE"`.
    #[error("issuance rejected: {0}")]
    IssuanceRejected(String),

    #[error("invalid response from issuing service: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, IssuingError>;
