use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Top-level config (`jack.toml` + `JACK_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JackConfig {
    pub gateway: GatewayConfig,
    pub issuing: IssuingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for JackConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                port: DEFAULT_PORT,
                bind: DEFAULT_BIND.to_string(),
            },
            issuing: IssuingConfig::default(),
            session: SessionConfig::default(),
            audio: AudioConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Endpoints and timeouts for the external issuing service (the "TinRed"
/// collaborator in the original system). Two timeout classes: ordinary
/// lookups (`timeout_secs`) and the invoice-issuance call, which genuinely
/// takes much longer end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuingConfig {
    pub identify_url: String,
    pub check_client_url: String,
    pub product_list_url: String,
    pub client_list_url: String,
    pub history_url: String,
    pub store_url: String,
    #[serde(default = "default_issuing_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_emission_timeout")]
    pub emission_timeout_secs: u64,
}

impl Default for IssuingConfig {
    fn default() -> Self {
        Self {
            identify_url: String::new(),
            check_client_url: String::new(),
            product_list_url: String::new(),
            client_list_url: String::new(),
            history_url: String::new(),
            store_url: String::new(),
            timeout_secs: default_issuing_timeout(),
            emission_timeout_secs: default_emission_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl_hours")]
    pub ttl_hours: u64,
    #[serde(default = "default_context_ttl_minutes")]
    pub context_ttl_minutes: u64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    #[serde(default = "default_max_items")]
    pub max_items_per_invoice: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_session_ttl_hours(),
            context_ttl_minutes: default_context_ttl_minutes(),
            max_history: default_max_history(),
            max_message_len: default_max_message_len(),
            max_items_per_invoice: default_max_items(),
        }
    }
}

/// Audio transcription collaborator. A `None`/empty `endpoint` disables audio
/// handling entirely — inbound audio payloads get a short clarifying reply
/// instead of an error.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AudioConfig {
    pub endpoint: Option<String>,
    #[serde(default = "default_audio_timeout")]
    pub timeout_secs: u64,
}

/// LLM fallback for open-ended questions the classifier routes to
/// `GeneralQuestion`. Only consulted when the `llm` feature is compiled in
/// and an endpoint is configured; otherwise a canned "I didn't understand"
/// reply is used.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_issuing_timeout() -> u64 {
    30
}
fn default_emission_timeout() -> u64 {
    90
}
fn default_session_ttl_hours() -> u64 {
    24
}
fn default_context_ttl_minutes() -> u64 {
    60
}
fn default_max_history() -> usize {
    20
}
fn default_max_message_len() -> usize {
    5000
}
fn default_max_items() -> usize {
    50
}
fn default_audio_timeout() -> u64 {
    30
}
fn default_llm_timeout() -> u64 {
    20
}

impl JackConfig {
    /// Load config from a TOML file with `JACK_*` env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `./jack.toml`
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.map(String::from).unwrap_or_else(|| "jack.toml".to_string());

        let config: JackConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("JACK_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}
