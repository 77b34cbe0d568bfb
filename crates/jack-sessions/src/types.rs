use chrono::{DateTime, Utc};
use jack_core::types::{Currency, DocumentKind, IdType};
use serde::{Deserialize, Serialize};

/// A single catalogue item fetched from the issuing service's product list.
/// Field names mirror the wire response exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub procod: String,
    #[serde(default)]
    pub pronom: String,
    #[serde(default)]
    pub provun: String,
    #[serde(default)]
    pub promed: String,
}

impl Product {
    pub fn unit_price(&self) -> f64 {
        self.provun.parse().unwrap_or(0.0)
    }
}

/// A single past issuance fetched from the issuing service's history list.
/// Field names mirror the wire response exactly (`cdeXXX` = detail row,
/// `ccaXXX` = header row).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryRecord {
    #[serde(default)]
    pub tdocod: String,
    #[serde(default)]
    pub ccafem: String,
    #[serde(default)]
    pub ccanom: String,
    #[serde(default)]
    pub ccandi: String,
    #[serde(default)]
    pub tdicod: String,
    #[serde(default)]
    pub cdedes: String,
    #[serde(default)]
    pub cdecan: String,
    #[serde(default)]
    pub cdevun: String,
    #[serde(default)]
    pub cdeigv: String,
    #[serde(default)]
    pub cdevve: String,
    #[serde(default)]
    pub cdaser: String,
    #[serde(default)]
    pub cdanum: String,
}

/// The issuing service's `identify_ai` response. Absence of `id_empresa`
/// means the caller is not a registered merchant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIdentification {
    #[serde(rename = "IdEmpresa")]
    pub id_empresa: String,
    #[serde(rename = "IdEstablecimiento", default = "default_establecimiento")]
    pub id_establecimiento: String,
    #[serde(rename = "IdUsuario")]
    pub id_usuario: i64,
    #[serde(rename = "Nombre")]
    pub nombre: Option<String>,
}

fn default_establecimiento() -> String {
    "0001".to_string()
}

/// A single line item on an in-progress or completed invoice. `quantity` and
/// `price` are kept as strings (not parsed numerics) because they round-trip
/// verbatim into the issuing service's wire payload; `subtotal` tolerates
/// malformed input the same way the wire contract does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: String,
    pub price: String,
}

impl InvoiceItem {
    pub fn new(description: impl Into<String>, quantity: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            quantity: quantity.into(),
            price: price.into(),
        }
    }

    pub fn subtotal(&self) -> f64 {
        let quantity: f64 = self.quantity.parse().unwrap_or(0.0);
        let price: f64 = self.price.parse().unwrap_or(0.0);
        quantity * price
    }

    /// Dedup key used when merging newly-parsed items into an emission.
    pub fn dedup_key(&self) -> (String, String) {
        (self.description.to_lowercase(), self.price.clone())
    }
}

/// An item mentioned without a unit price yet, awaiting the follow-up turn
/// that supplies it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingItem {
    pub description: String,
    pub quantity: String,
}

/// The fields the engine progressively fills in while building an invoice.
/// Lives inside a `Session`, reset on cancel, on terminal success, and
/// explicitly by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionData {
    pub document_kind: Option<DocumentKind>,
    pub currency: Currency,
    pub id_type: Option<IdType>,
    pub id_number: Option<String>,
    pub items: Vec<InvoiceItem>,
    /// Items captured without a price yet; non-empty only while the engine
    /// is waiting on "what is the unit price?".
    pub pending_items: Vec<PendingItem>,
    pub client_validated: bool,
    pub client_name: Option<String>,
}

impl Default for EmissionData {
    fn default() -> Self {
        Self {
            document_kind: None,
            currency: Currency::Soles,
            id_type: None,
            id_number: None,
            items: Vec::new(),
            pending_items: Vec::new(),
            client_validated: false,
            client_name: None,
        }
    }
}

impl EmissionData {
    pub fn is_complete(&self) -> bool {
        self.document_kind.is_some()
            && self.id_type.is_some()
            && self.id_number.is_some()
            && !self.items.is_empty()
    }

    /// Names of the slots still missing, in a stable order the orchestrator
    /// uses to decide which targeted question to ask next.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.document_kind.is_none() {
            missing.push("tipo_documento");
        }
        if self.id_type.is_none() || self.id_number.is_none() {
            missing.push("identificacion_cliente");
        }
        if self.items.is_empty() {
            missing.push("productos");
        }
        missing
    }

    pub fn calculate_total(&self) -> f64 {
        self.items.iter().map(InvoiceItem::subtotal).sum()
    }

    /// Set `id_number`, clearing client validation per the invariant that
    /// `client_validated` implies a still-current `id_number`.
    pub fn set_id_number(&mut self, id_number: String) {
        self.id_number = Some(id_number);
        self.client_validated = false;
        self.client_name = None;
    }

    pub fn reset(&mut self) {
        *self = EmissionData::default();
    }
}

/// A completed issuance, appended to `Session::session_emissions` on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub timestamp: DateTime<Utc>,
    pub document_kind: DocumentKind,
    pub serie_numero: String,
    pub client_id: String,
    pub total: f64,
    pub currency: Currency,
    pub pdf_url: String,
    pub items_count: usize,
}

/// Cached catalogue/client-book/history data, fetched once per session and
/// refreshed after the configured TTL.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserContext {
    pub products: Vec<Product>,
    pub clients: Vec<serde_json::Value>,
    pub history: Vec<HistoryRecord>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl UserContext {
    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }

    pub fn is_stale(&self, ttl_minutes: i64, now: DateTime<Utc>) -> bool {
        match self.loaded_at {
            None => true,
            Some(loaded_at) => (now - loaded_at).num_seconds() > ttl_minutes * 60,
        }
    }
}

/// One turn of conversation, kept for the bounded message-history ring and
/// for the LLM fallback's prompt context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// What the last assistant turn was showing the user, used to disambiguate
/// a bare numeric reply on the next turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationContext {
    #[default]
    None,
    Products,
    SearchResults,
    ProductDetail,
    History,
    TodayEmissions,
    Emission,
}

/// Per-caller conversational state. Owned exclusively by the session store;
/// no inner entity outlives its `Session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub phone: String,
    pub user_name: Option<String>,
    pub client_data: Option<ClientIdentification>,
    pub authenticated: bool,
    pub terms_accepted: bool,

    pub emission_data: EmissionData,
    pub awaiting_confirmation: bool,
    pub awaiting_client_reconfirmation: bool,

    pub conversation_context: ConversationContext,
    pub search_results: Vec<Product>,
    pub selected_product: Option<Product>,

    pub context: UserContext,
    pub messages: Vec<ConversationMessage>,
    pub session_emissions: Vec<EmissionRecord>,

    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Message history is bounded to this many entries to keep the LLM prompt
/// finite (invariant I4).
pub const MAX_HISTORY: usize = 20;

impl Session {
    pub fn new(phone: String, now: DateTime<Utc>) -> Self {
        Self {
            phone,
            user_name: None,
            client_data: None,
            authenticated: false,
            terms_accepted: false,
            emission_data: EmissionData::default(),
            awaiting_confirmation: false,
            awaiting_client_reconfirmation: false,
            conversation_context: ConversationContext::None,
            search_results: Vec::new(),
            selected_product: None,
            context: UserContext::default(),
            messages: Vec::new(),
            session_emissions: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// `max_history` is caller-supplied (sourced from `SessionConfig`) rather
    /// than hardcoded, so the retained window is actually configurable; pass
    /// `MAX_HISTORY` to get the default.
    pub fn add_message(&mut self, role: MessageRole, content: impl Into<String>, now: DateTime<Utc>, max_history: usize) {
        self.messages.push(ConversationMessage {
            role,
            content: content.into(),
            timestamp: now,
        });
        if self.messages.len() > max_history {
            let overflow = self.messages.len() - max_history;
            self.messages.drain(0..overflow);
        }
        self.last_activity = now;
    }

    pub fn reset_emission(&mut self) {
        self.emission_data.reset();
        self.awaiting_confirmation = false;
        self.awaiting_client_reconfirmation = false;
        self.selected_product = None;
    }

    pub fn set_context(&mut self, context: ConversationContext) {
        self.conversation_context = context;
        if context != ConversationContext::SearchResults {
            self.search_results.clear();
        }
    }

    pub fn clear_context(&mut self) {
        self.conversation_context = ConversationContext::None;
        self.search_results.clear();
        self.selected_product = None;
    }

    pub fn is_expired(&self, ttl_hours: i64, now: DateTime<Utc>) -> bool {
        (now - self.last_activity).num_seconds() > ttl_hours * 3600
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_message_bounds_history_to_20() {
        let mut session = Session::new("51999".to_string(), Utc::now());
        for i in 0..25 {
            session.add_message(MessageRole::User, format!("msg {i}"), Utc::now(), MAX_HISTORY);
        }
        assert_eq!(session.messages.len(), MAX_HISTORY);
        assert_eq!(session.messages[0].content, "msg 5");
    }

    #[test]
    fn set_id_number_clears_validation() {
        let mut data = EmissionData::default();
        data.client_validated = true;
        data.client_name = Some("Acme".to_string());
        data.set_id_number("12345678".to_string());
        assert!(!data.client_validated);
        assert!(data.client_name.is_none());
        assert_eq!(data.id_number.as_deref(), Some("12345678"));
    }

    #[test]
    fn reset_restores_defaults() {
        let mut data = EmissionData::default();
        data.document_kind = Some(DocumentKind::Boleta);
        data.items.push(InvoiceItem::new("x", "1", "10"));
        data.reset();
        assert!(data.document_kind.is_none());
        assert!(data.items.is_empty());
    }

    #[test]
    fn is_complete_requires_all_fields() {
        let mut data = EmissionData::default();
        assert!(!data.is_complete());
        data.document_kind = Some(DocumentKind::Boleta);
        data.id_type = Some(IdType::Dni);
        data.id_number = Some("12345678".to_string());
        assert!(!data.is_complete());
        data.items.push(InvoiceItem::new("cuaderno", "1", "15"));
        assert!(data.is_complete());
    }
}
