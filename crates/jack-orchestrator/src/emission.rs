//! The invoice-building state machine: collects document kind, client
//! identification and line items across turns, confirms client identity
//! against the issuing service, shows a review screen, and finally submits.

use std::sync::OnceLock;

use chrono::Utc;
use jack_core::types::{DocumentKind, IdType};
use jack_issuing::StoreRequest;
use jack_sessions::{InvoiceItem, Session};
use regex::Regex;
use tracing::{info, warn};

use crate::cancellation;
use crate::Orchestrator;

const BARE_CONFIRMATION_WORDS: &[&str] = &["si", "sí", "ok", "dale", "confirmo", "claro"];

impl Orchestrator {
    /// Entry point for every message while an emission is in progress or the
    /// current utterance itself looks like the start of one.
    pub(crate) async fn process_emission_message(&self, message: &str, session: &mut Session) -> String {
        if cancellation::is_cancellation(message) {
            session.reset_emission();
            return "❌ Emisión cancelada.\n\n¿Qué más necesitas?".to_string();
        }

        if session.awaiting_client_reconfirmation {
            return self.handle_reconfirmation(message, session).await;
        }

        let msg_lower = message.trim().to_lowercase();

        // A bare confirmation word only means something once every field is
        // already present. If it isn't yet, the answer may already be sitting
        // in an earlier turn the engine never acted on — replay recent
        // history before giving up and asking again.
        if BARE_CONFIRMATION_WORDS.contains(&msg_lower.as_str()) {
            if !session.emission_data.is_complete() {
                self.recover_from_history(session);
            }
            if session.emission_data.is_complete() {
                return self.validate_and_continue(session).await;
            }
        }

        // "ruc" / "dni" on their own name the id type but carry no number;
        // recorded so the next targeted question asks for the number only.
        if msg_lower == "ruc" {
            session.emission_data.id_type = Some(IdType::Ruc);
            return "Indícame el número de RUC (11 dígitos).".to_string();
        }
        if msg_lower == "dni" {
            session.emission_data.id_type = Some(IdType::Dni);
            return "Indícame el número de DNI (8 dígitos).".to_string();
        }

        let partial = jack_extractor::extract(message, session);
        jack_extractor::update(&mut session.emission_data, &partial);
        self.enforce_item_cap(session);

        if !partial.items_without_price.is_empty() {
            for pending in partial.items_without_price {
                if !session.emission_data.pending_items.iter().any(|p| p.description == pending.description) {
                    session.emission_data.pending_items.push(pending);
                }
            }
        } else if !session.emission_data.pending_items.is_empty() {
            if let Some(price) = extract_price(message) {
                let pending = std::mem::take(&mut session.emission_data.pending_items);
                for item in pending {
                    session.emission_data.items.push(InvoiceItem::new(item.description, item.quantity, price.clone()));
                }
                self.enforce_item_cap(session);
            }
        }

        if !session.emission_data.pending_items.is_empty() {
            let names: Vec<&str> = session.emission_data.pending_items.iter().map(|p| p.description.as_str()).collect();
            return format!("¿A qué precio unitario están estos productos?\n{}", names.join(", "));
        }

        if session.emission_data.is_complete() {
            return self.validate_and_continue(session).await;
        }

        if is_initial_request(message, &partial) {
            return initial_instructions(&session.emission_data);
        }

        let nothing_extracted = partial.document_kind.is_none()
            && partial.id_number.is_none()
            && partial.items.is_empty()
            && session.emission_data.pending_items.is_empty();

        if nothing_extracted && !crate::has_active_emission(session) {
            return "No logré identificar datos de facturación. ¿Podrías indicarme tipo de documento, identificación del cliente y productos?".to_string();
        }

        request_data(&session.emission_data)
    }

    /// The client provided an ID; confirm it resolves to a known name before
    /// moving on to the review screen, short-circuiting the network call
    /// when the id has already been validated in this same turn sequence.
    async fn validate_and_continue(&self, session: &mut Session) -> String {
        if session.emission_data.client_validated {
            return generate_summary(session);
        }

        let Some(id_number) = session.emission_data.id_number.clone() else {
            return request_data(&session.emission_data);
        };

        let (found, name_or_message) = self.issuing.check_client(&session.phone, &id_number).await;
        if found {
            session.emission_data.client_validated = true;
            session.emission_data.client_name = Some(name_or_message);
            session.awaiting_confirmation = false;
            generate_summary(session)
        } else {
            session.awaiting_client_reconfirmation = true;
            format!(
                "⚠️ No encontré un cliente con el documento {id_number} ({name_or_message}).\n\n¿Puedes confirmarme el número correcto?"
            )
        }
    }

    /// The narrow re-extraction used only while re-asking for a client's
    /// document number — intentionally separate from the general extractor,
    /// since this step tolerates digit-gap typing ("2 0 1 6 1 5...") that the
    /// general extractor does not.
    pub(crate) async fn handle_reconfirmation(&self, message: &str, session: &mut Session) -> String {
        if cancellation::is_cancellation(message) {
            session.reset_emission();
            return "❌ Emisión cancelada.\n\n¿Qué más necesitas?".to_string();
        }

        let Some(id) = extract_document_number(message) else {
            return "No logré identificar un número de documento válido. ¿Puedes indicarlo de nuevo?".to_string();
        };

        session.emission_data.id_type = Some(id.0);
        session.emission_data.set_id_number(id.1);
        session.awaiting_client_reconfirmation = false;
        self.validate_and_continue(session).await
    }

    /// Best-effort recovery when a bare confirmation word arrives before the
    /// emission is actually complete: replays the last 10 message-history
    /// entries through the extractor, in case an earlier turn already carried
    /// the missing field and the engine never merged it in.
    fn recover_from_history(&self, session: &mut Session) {
        let recent: Vec<String> = session.messages.iter().rev().take(10).map(|m| m.content.clone()).collect();
        for content in recent.into_iter().rev() {
            let partial = jack_extractor::extract(&content, session);
            jack_extractor::update(&mut session.emission_data, &partial);
        }
        self.enforce_item_cap(session);
    }

    pub(crate) async fn execute_emission(&self, session: &mut Session) -> String {
        let Some(client) = session.client_data.clone() else {
            return "❌ No pude identificar tu cuenta. Escribe \"hola\" para reiniciar.".to_string();
        };
        let emission = session.emission_data.clone();
        let Some(document_kind) = emission.document_kind else {
            return request_data(&emission);
        };
        let (Some(id_type), Some(id_number)) = (emission.id_type, emission.id_number.clone()) else {
            return request_data(&emission);
        };

        let request = StoreRequest {
            id_empresa: client.id_empresa,
            id_establecimiento: client.id_establecimiento,
            id_usuario: client.id_usuario.to_string(),
            tdocod: document_kind.wire_code().to_string(),
            mondoc: if emission.currency == jack_core::types::Currency::Dolares { "USD" } else { "PEN" }.to_string(),
            tdicod: id_type.wire_code().to_string(),
            clinum: id_number,
            cant: emission.items.iter().map(|i| i.quantity.clone()).collect(),
            detpro: emission.items.iter().map(|i| i.description.clone()).collect(),
            preuni: emission.items.iter().map(|i| i.price.clone()).collect(),
            total: format!("{:.2}", emission.calculate_total()),
        };

        match self.issuing.store(request).await {
            Ok(response) => {
                info!(serie_numero = %response.full_number(), "invoice issued");
                session.session_emissions.push(jack_sessions::EmissionRecord {
                    timestamp: Utc::now(),
                    document_kind,
                    serie_numero: response.full_number(),
                    client_id: emission.id_number.clone().unwrap_or_default(),
                    total: emission.calculate_total(),
                    currency: emission.currency,
                    pdf_url: response.pdf.clone(),
                    items_count: emission.items.len(),
                });
                session.reset_emission();
                format!(
                    "✅ ¡{} emitida!\n\n📄 {}\n💰 Total: S/ {:.2}\n🔗 {}",
                    document_kind,
                    response.full_number(),
                    emission.calculate_total(),
                    response.pdf
                )
            }
            Err(jack_issuing::IssuingError::IssuanceRejected(mensaje)) => {
                warn!(%mensaje, "issuance rejected");
                session.reset_emission();
                format!("⚠️ Error: {mensaje}")
            }
            Err(e) => {
                warn!(error = %e, "issuance call failed");
                format!("❌ No pude emitir el comprobante: {e}\n\n¿Quieres intentarlo de nuevo?")
            }
        }
    }
}

/// Renders the review screen shown right before the user is asked to
/// confirm, or `request_data` if the state turns out not to be complete
/// after all (defensive — callers should have checked already).
fn generate_summary(session: &mut Session) -> String {
    let emission = &session.emission_data;
    if !emission.is_complete() {
        return request_data(emission);
    }

    session.awaiting_confirmation = true;

    let document_kind = emission.document_kind.unwrap();
    let lines: Vec<String> = emission
        .items
        .iter()
        .map(|item| format!("• {} x{} = S/ {:.2}", item.description, item.quantity, item.subtotal()))
        .collect();

    format!(
        "📋 Resumen de {}\n\n👤 Cliente: {} ({})\n\n{}\n\n💰 Total: S/ {:.2}\n\n¿Confirmas la emisión? (Sí/No)",
        document_kind,
        emission.client_name.clone().unwrap_or_default(),
        emission.id_number.clone().unwrap_or_default(),
        lines.join("\n"),
        emission.calculate_total()
    )
}

/// Asks a single targeted question for whichever field is still missing,
/// in a fixed priority order (document kind, then identification, then
/// items) so the conversation never asks for two things at once.
fn request_data(emission: &jack_sessions::EmissionData) -> String {
    let missing = emission.missing_fields();
    match missing.first() {
        Some(&"tipo_documento") => "¿Deseas emitir una Factura o una Boleta?".to_string(),
        Some(&"identificacion_cliente") => "Indícame el RUC (factura) o DNI (boleta) del cliente.".to_string(),
        Some(&"productos") => "¿Qué productos deseas facturar? (ej: 2 laptops a 2500)".to_string(),
        _ => "¿Podrías darme más detalles?".to_string(),
    }
}

/// The opening prompt shown once a document kind is known but nothing else
/// has been provided yet.
fn initial_instructions(emission: &jack_sessions::EmissionData) -> String {
    match emission.document_kind {
        Some(DocumentKind::Factura) => {
            "📄 Factura seleccionada.\n\nNecesito:\n1. RUC del cliente (11 dígitos)\n2. Productos y cantidades (ej: 2 laptops a 2500)".to_string()
        }
        Some(DocumentKind::Boleta) => {
            "🧾 Boleta seleccionada.\n\nNecesito:\n1. DNI del cliente (8 dígitos)\n2. Productos y cantidades (ej: 2 cuadernos a 15)".to_string()
        }
        None => "¿Deseas emitir una Factura o una Boleta?".to_string(),
    }
}

fn is_initial_request(message: &str, partial: &jack_extractor::PartialEmission) -> bool {
    let msg_lower = message.to_lowercase();
    partial.document_kind.is_some()
        && partial.id_number.is_none()
        && partial.items.is_empty()
        && (msg_lower.contains("factura") || msg_lower.contains("boleta"))
}

fn extract_price(message: &str) -> Option<String> {
    let caps = price_pattern().captures(message)?;
    Some(caps[1].replace(',', "."))
}

fn price_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:[.,]\d{1,2})?)").unwrap())
}

/// Reconfirmation-only document number extraction: cleans up digit-gap
/// typing, then prefers a loose RUC over a loose DNI. Deliberately distinct
/// from `jack_extractor::id_extraction::extract_id` — that one looks for an
/// explicit "DNI"/"RUC" prefix first, which the reconfirmation turn's reply
/// ("es el 20161541991") never carries.
fn extract_document_number(message: &str) -> Option<(IdType, String)> {
    let cleaned = digit_gap().replace_all(message, "$1");

    if let Some(caps) = ruc_loose().captures(&cleaned) {
        return Some((IdType::Ruc, caps[1].to_string()));
    }

    for caps in dni_loose().captures_iter(&cleaned) {
        let number = &caps[1];
        if number.parse::<u64>().unwrap_or(0) >= 1_000_000 {
            return Some((IdType::Dni, number.to_string()));
        }
    }

    None
}

fn digit_gap() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d)\s+(?=\d)").unwrap())
}

fn ruc_loose() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([12]0\d{9})\b").unwrap())
}

fn dni_loose() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{8})\b").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_document_number_cleans_digit_gaps_and_prefers_ruc() {
        let (id_type, number) = extract_document_number("es el 2 0 1 6 1 5 4 1 9 9 1").unwrap();
        assert_eq!(id_type, IdType::Ruc);
        assert_eq!(number, "20161541991");
    }

    #[test]
    fn extract_document_number_falls_back_to_dni_above_floor() {
        let (id_type, number) = extract_document_number("mi documento es 12345678").unwrap();
        assert_eq!(id_type, IdType::Dni);
        assert_eq!(number, "12345678");
    }

    #[test]
    fn extract_price_accepts_comma_decimal() {
        assert_eq!(extract_price("a 15,50 cada uno").as_deref(), Some("15.50"));
    }

    #[test]
    fn request_data_asks_for_missing_field_in_priority_order() {
        let emission = jack_sessions::EmissionData::default();
        assert_eq!(request_data(&emission), "¿Deseas emitir una Factura o una Boleta?");
    }
}
