use std::time::Duration;

use async_trait::async_trait;
use jack_core::config::IssuingConfig;
use jack_sessions::{ClientIdentification, HistoryRecord, Product};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{IssuingError, Result};
use crate::wire::{CheckClientRequest, CheckClientResponse, PhoneRequest, StoreRequest, StoreResponse};

/// The five issuing-service RPCs, behind a trait so the orchestrator and its
/// tests can swap in a mock without touching the network.
#[async_trait]
pub trait IssuingClient: Send + Sync {
    async fn identify(&self, phone: &str) -> Result<ClientIdentification>;

    /// Never errors — a connection failure degrades to `(false, <message>)`
    /// the same way the orchestrator would treat a genuine "not found",
    /// matching the upstream contract's non-fatal validation semantics.
    async fn check_client(&self, phone: &str, document_number: &str) -> (bool, String);

    /// Best-effort; degrades to an empty list on any failure.
    async fn products(&self, phone: &str) -> Vec<Product>;
    /// Best-effort; degrades to an empty list on any failure.
    async fn clients(&self, phone: &str) -> Vec<serde_json::Value>;
    /// Best-effort; degrades to an empty list on any failure.
    async fn history(&self, phone: &str) -> Vec<HistoryRecord>;

    async fn store(&self, request: StoreRequest) -> Result<StoreResponse>;
}

pub struct HttpIssuingClient {
    client: reqwest::Client,
    config: IssuingConfig,
}

impl HttpIssuingClient {
    pub fn new(config: IssuingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(&self, url: &str, body: &B, timeout: Duration) -> Result<R> {
        let resp = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| IssuingError::TransientNetwork(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(%status, body = %text, "issuing service returned an error status");
            return Err(IssuingError::TransientNetwork(format!("HTTP {status}: {text}")));
        }

        resp.json::<R>().await.map_err(|e| IssuingError::Parse(e.to_string()))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    fn emission_timeout(&self) -> Duration {
        Duration::from_secs(self.config.emission_timeout_secs)
    }
}

#[async_trait]
impl IssuingClient for HttpIssuingClient {
    #[instrument(skip(self), fields(phone = %phone))]
    async fn identify(&self, phone: &str) -> Result<ClientIdentification> {
        let body = PhoneRequest { telefono: phone };
        let value: serde_json::Value = self
            .post_json(&self.config.identify_url, &body, self.timeout())
            .await?;

        if value.get("IdEmpresa").is_none() {
            return Err(IssuingError::AuthNotRegistered);
        }

        serde_json::from_value(value).map_err(|e| IssuingError::Parse(e.to_string()))
    }

    #[instrument(skip(self), fields(phone = %phone))]
    async fn check_client(&self, phone: &str, document_number: &str) -> (bool, String) {
        let body = CheckClientRequest {
            telefono: phone,
            numero_documento: document_number,
        };
        let response: Result<CheckClientResponse> =
            self.post_json(&self.config.check_client_url, &body, self.timeout()).await;

        match response {
            Ok(map) => {
                if let Some(name) = map.get("01") {
                    (true, name.clone())
                } else if let Some(message) = map.get("00") {
                    (false, message.clone())
                } else if let Some((_, value)) = map.iter().find(|(k, v)| k.as_str() != "00" && v.len() > 2) {
                    (true, value.clone())
                } else {
                    (false, "Respuesta no reconocida del servidor".to_string())
                }
            }
            Err(e) => {
                debug!(error = %e, "check_client failed, treating as not found");
                (false, format!("Error de conexión: {e}"))
            }
        }
    }

    async fn products(&self, phone: &str) -> Vec<Product> {
        let body = PhoneRequest { telefono: phone };
        self.post_json(&self.config.product_list_url, &body, self.timeout())
            .await
            .unwrap_or_default()
    }

    async fn clients(&self, phone: &str) -> Vec<serde_json::Value> {
        let body = PhoneRequest { telefono: phone };
        self.post_json(&self.config.client_list_url, &body, self.timeout())
            .await
            .unwrap_or_default()
    }

    async fn history(&self, phone: &str) -> Vec<HistoryRecord> {
        let body = PhoneRequest { telefono: phone };
        self.post_json(&self.config.history_url, &body, self.timeout())
            .await
            .unwrap_or_default()
    }

    #[instrument(skip(self, request))]
    async fn store(&self, request: StoreRequest) -> Result<StoreResponse> {
        let response: StoreResponse = self
            .post_json(&self.config.store_url, &request, self.emission_timeout())
            .await?;

        if !response.is_successful() {
            return Err(IssuingError::IssuanceRejected(response.mensaje.clone()));
        }
        Ok(response)
    }
}
