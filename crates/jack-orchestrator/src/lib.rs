pub mod answer;
pub mod cancellation;
mod conversation;
mod emission;

use std::sync::Arc;
use std::sync::OnceLock;

use chrono::Utc;
use jack_audio::AudioTranscriber;
use jack_classifier::Intent;
use jack_core::JackConfig;
use jack_issuing::IssuingClient;
use jack_sessions::{MessageRole, Session, SessionStore};
use regex::Regex;
use tracing::{info, instrument, warn};

pub use answer::{AnswerContext, AnswerModel, NullAnswerModel};

const MAIN_MENU: &str = "📄 Emitir Factura\n🧾 Emitir Boleta\n📦 Ver productos\n📊 Historial";

/// Owns every collaborator the dialogue needs and drives the fixed P1-P8
/// priority pipeline on each inbound message. Constructed once in `main` and
/// shared behind an `Arc` across requests — it holds no per-caller state
/// itself, that all lives in `SessionStore`.
pub struct Orchestrator {
    sessions: SessionStore,
    issuing: Arc<dyn IssuingClient>,
    audio: Option<Arc<dyn AudioTranscriber>>,
    answer: Arc<dyn AnswerModel>,
    context_ttl_minutes: i64,
    max_history: usize,
    max_message_len: usize,
    max_items_per_invoice: usize,
}

impl Orchestrator {
    pub fn new(
        config: &JackConfig,
        issuing: Arc<dyn IssuingClient>,
        audio: Option<Arc<dyn AudioTranscriber>>,
        answer: Arc<dyn AnswerModel>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(config.session.ttl_hours as i64),
            issuing,
            audio,
            answer,
            context_ttl_minutes: config.session.context_ttl_minutes as i64,
            max_history: config.session.max_history,
            max_message_len: config.session.max_message_len,
            max_items_per_invoice: config.session.max_items_per_invoice,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Single entry point: phone, optional text utterance, optional decoded
    /// audio bytes + MIME type. Always returns a reply string — transport
    /// errors are converted to user-facing prose rather than propagated, per
    /// the front-door contract.
    #[instrument(skip(self, message, audio), fields(phone = %phone))]
    pub async fn handle_message(&self, phone: &str, message: Option<&str>, audio: Option<(&[u8], &str)>) -> String {
        let session_arc = match self.sessions.get_or_create(phone) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "could not resolve a session for this phone");
                return "No recibí ningún mensaje. ¿En qué puedo ayudarte?".to_string();
            }
        };
        let mut session = session_arc.lock().await;

        // P1: audio gate.
        let mut text = message.unwrap_or_default().to_string();
        if let Some((bytes, mime_type)) = audio {
            if mime_type.starts_with("audio") {
                match &self.audio {
                    Some(transcriber) => match transcriber.transcribe(bytes, mime_type).await {
                        Ok(transcribed) => text = transcribed,
                        Err(e) => return format!("🎤 {e}"),
                    },
                    None => return "🎤 La transcripción de audio no está disponible en este momento.".to_string(),
                }
            }
        }

        if text.trim().is_empty() {
            return "No recibí ningún mensaje. ¿En qué puedo ayudarte?".to_string();
        }
        let mut text = text.trim().to_string();
        if text.chars().count() > self.max_message_len {
            warn!(len = text.chars().count(), cap = self.max_message_len, "message truncated to configured max length");
            text = text.chars().take(self.max_message_len).collect();
        }

        // P2: auth gate.
        if !session.authenticated {
            return self.authenticate_and_greet(&mut session).await;
        }

        // P3: terms gate.
        if !session.terms_accepted {
            return self.handle_terms_gate(&mut session, &text);
        }

        // P4: context hydration.
        if !session.context.is_loaded() {
            self.load_context(&mut session, false).await;
        }

        let now = Utc::now();
        session.add_message(MessageRole::User, text.clone(), now, self.max_history);

        // P5: client-revalidation branch, highest priority after the gates.
        if session.awaiting_client_reconfirmation {
            let reply = self.handle_reconfirmation(&text, &mut session).await;
            session.add_message(MessageRole::Assistant, reply.clone(), Utc::now(), self.max_history);
            return reply;
        }

        // P6: confirmation branch.
        if session.awaiting_confirmation {
            if jack_classifier::is_confirmation(&text) {
                session.awaiting_confirmation = false;
                let reply = self.execute_emission(&mut session).await;
                session.add_message(MessageRole::Assistant, reply.clone(), Utc::now(), self.max_history);
                return reply;
            }
            if cancellation::is_cancellation(&text) {
                session.awaiting_confirmation = false;
                session.reset_emission();
                let reply = "❌ Cancelado.\n\n¿Qué más necesitas?".to_string();
                session.add_message(MessageRole::Assistant, reply.clone(), Utc::now(), self.max_history);
                return reply;
            }
        }

        // P7: active-emission branch.
        if has_active_emission(&session) || message_has_emission_data(&text) {
            let reply = self.process_emission_message(&text, &mut session).await;
            session.add_message(MessageRole::Assistant, reply.clone(), Utc::now(), self.max_history);
            return reply;
        }

        // P8: classify + route.
        let (intent, confidence) = jack_classifier::classify(&text, &session);
        info!(?intent, confidence, "classified utterance");
        let reply = self.route(&text, intent, &mut session).await;
        session.add_message(MessageRole::Assistant, reply.clone(), Utc::now(), self.max_history);
        reply
    }

    #[instrument(skip(self, session))]
    async fn authenticate_and_greet(&self, session: &mut Session) -> String {
        match self.issuing.identify(&session.phone).await {
            Ok(client) => {
                session.client_data = Some(client.clone());
                session.user_name = client.nombre.clone();
                session.authenticated = true;
                session.terms_accepted = false;

                self.load_context(session, true).await;
                let products_count = session.context.products.len();
                let name = client.nombre.unwrap_or_else(|| "amigo".to_string());

                format!(
                    "¡Hola {name}! 👋\n\nSoy Jack, tu asistente de facturación de TinRed.\n\nTengo {products_count} productos en tu cuenta.\n\nPara continuar, acepta nuestros términos y políticas:\n📋 https://www.tinred.pe/terminos.html\n🔒 https://www.tinred.pe/privacidad.html\n🛡️ https://www.tinred.pe/seguridad_informacion.html\n📜 https://www.tinred.pe/declaracion_seguridad.html\n\n¿Aceptas los términos? Responde \"Sí\"."
                )
            }
            Err(jack_issuing::IssuingError::AuthNotRegistered) => {
                "❌ No encontré tu número en TinRed.\n📧 soporte@tinred.pe".to_string()
            }
            Err(e) => {
                warn!(error = %e, "identify call failed");
                format!("⚠️ No pude verificar tu cuenta en este momento: {e}\n\n¿Puedes intentarlo de nuevo en unos minutos?")
            }
        }
    }

    fn handle_terms_gate(&self, session: &mut Session, text: &str) -> String {
        if jack_classifier::is_confirmation(text) {
            session.terms_accepted = true;
            let name = session.user_name.clone().unwrap_or_else(|| "amigo".to_string());
            return format!("✅ ¡Términos aceptados!\n\n¿Qué necesitas, {name}?\n\n{MAIN_MENU}");
        }
        if jack_classifier::is_cancellation(text) {
            return "Sin aceptar términos no puedo ayudarte. 👋".to_string();
        }
        "Necesito que aceptes los términos. ¿Aceptas? Sí/No".to_string()
    }

    /// Fetches products, clients and history concurrently and installs the
    /// result as a single atomic field write, skipping the round trip
    /// entirely when a cached, non-stale context is already present (L2).
    #[instrument(skip(self, session), fields(phone = %session.phone))]
    async fn load_context(&self, session: &mut Session, force: bool) {
        if !force && session.context.is_loaded() && !session.context.is_stale(self.context_ttl_minutes, Utc::now()) {
            return;
        }

        let phone = session.phone.clone();
        let (products, clients, history) = tokio::join!(
            self.issuing.products(&phone),
            self.issuing.clients(&phone),
            self.issuing.history(&phone),
        );

        info!(products = products.len(), clients = clients.len(), history = history.len(), "context loaded");

        session.context = jack_sessions::UserContext {
            products,
            clients,
            history,
            loaded_at: Some(Utc::now()),
        };
    }

    async fn route(&self, message: &str, intent: Intent, session: &mut Session) -> String {
        match intent {
            Intent::EmitInvoice => self.process_emission_message(message, session).await,
            Intent::Greeting => self.handle_greeting(session),
            Intent::Cancel => {
                session.reset_emission();
                format!("❌ Cancelado.\n\n{MAIN_MENU}")
            }
            Intent::QueryProducts | Intent::QueryClients | Intent::QueryHistory | Intent::GeneralQuestion => {
                self.handle_query(message, intent, session).await
            }
            Intent::Confirmation | Intent::Unknown => {
                if looks_like_emission(message, session) {
                    self.process_emission_message(message, session).await
                } else {
                    let name = session.user_name.clone().unwrap_or_else(|| "amigo".to_string());
                    format!("¿En qué te ayudo, {name}?\n\n{MAIN_MENU}")
                }
            }
        }
    }

    /// Caps `emission_data.items` at the configured per-invoice limit so a
    /// long back-and-forth, or a catalogue-driven add, can't accumulate an
    /// unbounded request.
    fn enforce_item_cap(&self, session: &mut Session) {
        let cap = self.max_items_per_invoice;
        if session.emission_data.items.len() > cap {
            warn!(cap, "invoice item cap exceeded, truncating");
            session.emission_data.items.truncate(cap);
        }
    }
}

/// True once any emission slot is non-empty — the active-emission branch
/// (P7) takes priority over classification as long as this holds.
fn has_active_emission(session: &Session) -> bool {
    let emission = &session.emission_data;
    emission.document_kind.is_some() || emission.id_number.is_some() || !emission.items.is_empty()
}

/// Detects emission-shaped data directly in the current utterance so a
/// message like "Factura RUC 20161541991, 2 laptops a 2500" routes straight
/// to the emission handler instead of through the classifier.
fn message_has_emission_data(message: &str) -> bool {
    let msg_lower = message.to_lowercase();

    if ["factura", "boleta", "emitir", "emite"].iter().any(|w| msg_lower.contains(w)) {
        return true;
    }
    if dni_pattern().is_match(message) {
        return true;
    }
    if ruc_pattern().is_match(message) {
        return true;
    }
    if priced_item_pattern().is_match(&msg_lower) {
        return true;
    }
    false
}

/// When classification yields `CANCEL`/`UNKNOWN`, this checks whether the
/// last few assistant turns were talking about emission and the user just
/// affirmed, so a plain "sí" after a prompt doesn't fall through to the menu.
fn looks_like_emission(message: &str, session: &Session) -> bool {
    let msg_lower = message.to_lowercase();
    if !["confirmo", "si", "sí", "ok"].iter().any(|w| msg_lower == *w) {
        return false;
    }

    session
        .messages
        .iter()
        .rev()
        .take(3)
        .filter(|m| m.role == MessageRole::Assistant)
        .any(|m| {
            let lower = m.content.to_lowercase();
            ["boleta", "factura", "emitir", "confirmas"].iter().any(|w| lower.contains(w))
        })
}

fn dni_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{8}\b").unwrap())
}

fn ruc_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b[12]0\d{9}\b").unwrap())
}

fn priced_item_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+\s+\w+\s+(a|@|por)\s+\d+").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jack_sessions::Session;

    fn session() -> Session {
        Session::new("51999888777".to_string(), Utc::now())
    }

    #[test]
    fn message_has_emission_data_detects_priced_item_phrase() {
        assert!(message_has_emission_data("2 laptops a 2500"));
        assert!(!message_has_emission_data("hola, como estas"));
    }

    #[test]
    fn message_has_emission_data_detects_dni_and_ruc() {
        assert!(message_has_emission_data("mi dni es 12345678"));
        assert!(message_has_emission_data("20161541991"));
    }

    #[test]
    fn looks_like_emission_requires_recent_emission_talk() {
        let mut s = session();
        s.add_message(MessageRole::Assistant, "¿Factura o Boleta?", Utc::now(), jack_sessions::MAX_HISTORY);
        assert!(looks_like_emission("si", &s));

        let mut s2 = session();
        s2.add_message(MessageRole::Assistant, "¿En qué más te ayudo?", Utc::now(), jack_sessions::MAX_HISTORY);
        assert!(!looks_like_emission("si", &s2));
    }
}
