//! Informational intents: product catalogue, client book, emission history,
//! and open-ended questions. None of these mutate `emission_data`; they only
//! read `UserContext` and update `conversation_context` so a bare number on
//! the next turn can be resolved against whatever list was just shown.

use std::sync::OnceLock;

use jack_classifier::Intent;
use jack_sessions::{ConversationContext, Session};
use regex::Regex;

use crate::answer::AnswerContext;
use crate::Orchestrator;

const SYSTEM_PROMPT: &str = "Eres Jack, el asistente de facturación electrónica de TinRed. Responde de forma breve y concreta, en español.";
const PRODUCT_LIST_CAP: usize = 15;
const HISTORY_LIST_CAP: usize = 10;

impl Orchestrator {
    pub(crate) async fn handle_query(&self, message: &str, intent: Intent, session: &mut Session) -> String {
        if let Some(number) = extract_bare_number(message) {
            if let Some(reply) = self.handle_number_selection(number, session).await {
                return reply;
            }
        }

        match intent {
            Intent::QueryProducts => {
                if session.conversation_context == ConversationContext::ProductDetail && jack_classifier::is_confirmation(message) {
                    if let Some(reply) = self.start_emission_with_product(session) {
                        return reply;
                    }
                }
                if is_product_search(message) {
                    if let Some(term) = extract_search_term(message) {
                        return self.search_products(&term, session);
                    }
                }
                self.list_products(session)
            }
            Intent::QueryClients => self.list_clients(session),
            Intent::QueryHistory => {
                if asks_for_today(message) {
                    self.format_today_emissions(session)
                } else if asks_for_last(message) {
                    self.get_history_detail(0, session)
                } else if let Some(n) = extract_detail_number(message) {
                    self.get_history_detail(n.saturating_sub(1), session)
                } else {
                    self.list_history(session)
                }
            }
            Intent::GeneralQuestion => self.handle_general_question(message, session).await,
            _ => self.handle_greeting(session),
        }
    }

    pub(crate) fn handle_greeting(&self, session: &mut Session) -> String {
        session.clear_context();
        let name = session.user_name.clone().unwrap_or_else(|| "amigo".to_string());
        let today_count = session.session_emissions.len();

        if today_count > 0 {
            session.set_context(ConversationContext::TodayEmissions);
            format!(
                "¡Hola de nuevo, {name}! 👋\n\nHoy ya emitiste {today_count} comprobante(s).\n\n📄 Emitir Factura\n🧾 Emitir Boleta\n📦 Ver productos\n📊 Historial"
            )
        } else {
            format!("¡Hola, {name}! 👋\n\n📄 Emitir Factura\n🧾 Emitir Boleta\n📦 Ver productos\n📊 Historial")
        }
    }

    /// Resolves a bare number against whatever the previous turn displayed,
    /// in priority order: an active search result list, then the emission
    /// history, then the full product list, then today's emissions.
    async fn handle_number_selection(&self, number: usize, session: &mut Session) -> Option<String> {
        if !session.search_results.is_empty() {
            let product = session.search_results.get(number.checked_sub(1)?)?.clone();
            return Some(self.show_product_detail(product, session));
        }
        if session.conversation_context == ConversationContext::History {
            return Some(self.get_history_detail(number.checked_sub(1)?, session));
        }
        if session.conversation_context == ConversationContext::Products {
            let product = session.context.products.get(number.checked_sub(1)?)?.clone();
            return Some(self.show_product_detail(product, session));
        }
        if session.conversation_context == ConversationContext::TodayEmissions {
            return Some(self.format_today_emission_detail(number.checked_sub(1)?, session));
        }
        None
    }

    fn show_product_detail(&self, product: jack_sessions::Product, session: &mut Session) -> String {
        session.selected_product = Some(product.clone());
        session.set_context(ConversationContext::ProductDetail);
        format!(
            "📦 {}\n\n💰 Precio: S/ {:.2}\n📏 Unidad: {}\n\n¿Deseas emitir un comprobante con este producto? (Sí/No)",
            product.pronom,
            product.unit_price(),
            product.promed
        )
    }

    pub(crate) fn start_emission_with_product(&self, session: &mut Session) -> Option<String> {
        let product = session.selected_product.take()?;
        session.emission_data.items.push(jack_sessions::InvoiceItem::new(
            product.pronom.clone(),
            "1".to_string(),
            format!("{:.2}", product.unit_price()),
        ));
        self.enforce_item_cap(session);
        session.clear_context();
        Some(format!(
            "Agregué {} a la emisión.\n\n¿Deseas emitir una Factura o una Boleta?",
            product.pronom
        ))
    }

    fn search_products(&self, term: &str, session: &mut Session) -> String {
        let term_lower = term.to_lowercase();
        let matches: Vec<jack_sessions::Product> = session
            .context
            .products
            .iter()
            .filter(|p| p.pronom.to_lowercase().contains(&term_lower))
            .cloned()
            .collect();

        if matches.is_empty() {
            session.clear_context();
            return format!("No encontré productos para \"{term}\".");
        }

        let lines: Vec<String> = matches
            .iter()
            .take(PRODUCT_LIST_CAP)
            .enumerate()
            .map(|(i, p)| format!("{}. {} — S/ {:.2}", i + 1, p.pronom, p.unit_price()))
            .collect();

        session.search_results = matches;
        session.set_context(ConversationContext::SearchResults);
        format!("🔍 Resultados para \"{term}\":\n\n{}", lines.join("\n"))
    }

    fn list_products(&self, session: &mut Session) -> String {
        if session.context.products.is_empty() {
            return "No tienes productos registrados aún.".to_string();
        }

        let lines: Vec<String> = session
            .context
            .products
            .iter()
            .take(PRODUCT_LIST_CAP)
            .enumerate()
            .map(|(i, p)| format!("{}. {} — S/ {:.2}", i + 1, p.pronom, p.unit_price()))
            .collect();

        session.set_context(ConversationContext::Products);
        let truncated = session.context.products.len() > PRODUCT_LIST_CAP;
        let suffix = if truncated { "\n\n(mostrando los primeros 15)" } else { "" };
        format!("📦 Tus productos:\n\n{}{}", lines.join("\n"), suffix)
    }

    fn list_clients(&self, session: &Session) -> String {
        if session.context.clients.is_empty() {
            return "No tienes clientes registrados aún.".to_string();
        }
        format!("👥 Tienes {} cliente(s) registrados.", session.context.clients.len())
    }

    fn list_history(&self, session: &mut Session) -> String {
        let today_lines: Vec<String> = session
            .session_emissions
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. {} {} — S/ {:.2}", i + 1, e.document_kind, e.serie_numero, e.total))
            .collect();

        let history_lines: Vec<String> = session
            .context
            .history
            .iter()
            .take(HISTORY_LIST_CAP)
            .enumerate()
            .map(|(i, h)| {
                format!(
                    "{}. {} {}-{} — {} — S/ {}",
                    today_lines.len() + i + 1,
                    h.tdocod,
                    h.cdaser,
                    h.cdanum,
                    h.ccanom,
                    h.cdevve
                )
            })
            .collect();

        if today_lines.is_empty() && history_lines.is_empty() {
            return "No tienes emisiones registradas aún.".to_string();
        }

        session.set_context(ConversationContext::History);
        format!("📊 Historial:\n\n{}\n{}", today_lines.join("\n"), history_lines.join("\n"))
    }

    fn format_today_emissions(&self, session: &mut Session) -> String {
        if session.session_emissions.is_empty() {
            return "No has emitido comprobantes hoy todavía.".to_string();
        }
        let lines: Vec<String> = session
            .session_emissions
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. {} {} — S/ {:.2}", i + 1, e.document_kind, e.serie_numero, e.total))
            .collect();
        session.set_context(ConversationContext::TodayEmissions);
        format!("📊 Emisiones de hoy:\n\n{}", lines.join("\n"))
    }

    fn format_today_emission_detail(&self, index: usize, session: &mut Session) -> String {
        match session.session_emissions.get(index) {
            Some(e) => format!(
                "📄 {} {}\n💰 Total: S/ {:.2}\n📦 Ítems: {}\n🔗 {}",
                e.document_kind, e.serie_numero, e.total, e.items_count, e.pdf_url
            ),
            None => "No encontré esa emisión. ¿Puedes confirmar el número?".to_string(),
        }
    }

    /// `index` counts only into the issuing service's history list, after
    /// today's in-memory emissions — mirroring how `list_history` numbers
    /// them as one continuous list.
    fn get_history_detail(&self, index: usize, session: &mut Session) -> String {
        if let Some(today) = session.session_emissions.get(index) {
            return format!(
                "📄 {} {}\n💰 Total: S/ {:.2}\n📦 Ítems: {}\n🔗 {}",
                today.document_kind, today.serie_numero, today.total, today.items_count, today.pdf_url
            );
        }

        let history_index = index - session.session_emissions.len();
        match session.context.history.get(history_index) {
            Some(record) => {
                let total: f64 = record.cdevve.parse().unwrap_or(0.0);
                let igv: f64 = record.cdeigv.parse().unwrap_or(0.0);
                let subtotal = total - igv;
                format!(
                    "📄 {} {}-{}\n👤 Cliente: {}\n💰 Subtotal: S/ {:.2}\n💰 IGV: S/ {:.2}\n💰 Total: S/ {:.2}",
                    record.tdocod, record.cdaser, record.cdanum, record.ccanom, subtotal, igv, total
                )
            }
            None => "No encontré esa emisión. ¿Puedes confirmar el número?".to_string(),
        }
    }

    async fn handle_general_question(&self, message: &str, session: &mut Session) -> String {
        let msg_lower = message.to_lowercase();

        if msg_lower.contains("diferencia") && (msg_lower.contains("factura") || msg_lower.contains("boleta")) {
            return explain_invoice_difference();
        }
        if msg_lower.contains("igv") {
            return "El IGV es el Impuesto General a las Ventas (18% en Perú), incluido en el precio total del comprobante.".to_string();
        }
        if msg_lower.contains("cómo emitir") || msg_lower.contains("como emitir") {
            return "Para emitir: dime si quieres Factura o Boleta, el RUC/DNI del cliente, y los productos con cantidad y precio.".to_string();
        }

        let conversation = session
            .messages
            .iter()
            .rev()
            .take(6)
            .rev()
            .map(|m| format!("{:?}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let rag_context = format!(
            "Productos disponibles: {}. Emisiones hoy: {}.",
            session.context.products.len(),
            session.session_emissions.len()
        );

        let ctx = AnswerContext {
            system_prompt: SYSTEM_PROMPT,
            rag_context,
            conversation,
            user_name: session.user_name.as_deref().unwrap_or("amigo"),
            message,
        };

        match self.answer.answer(ctx).await {
            Some(answer) => answer,
            None => "No estoy seguro de cómo ayudarte con eso. ¿Quieres ver el menú? Escribe \"hola\".".to_string(),
        }
    }
}

fn explain_invoice_difference() -> String {
    "📄 Factura: para empresas con RUC, permite crédito fiscal.\n🧾 Boleta: para personas naturales con DNI, consumidor final.".to_string()
}

fn is_product_search(message: &str) -> bool {
    let msg_lower = message.to_lowercase();
    ["busca", "buscar", "encuentra", "encontrar", "filtrar", "hay", "tiene", "tengo", "existe"]
        .iter()
        .any(|w| msg_lower.contains(w))
}

fn extract_search_term(message: &str) -> Option<String> {
    for pattern in search_term_patterns() {
        if let Some(caps) = pattern.captures(message) {
            let term = caps.get(1)?.as_str().trim();
            if !term.is_empty() {
                return Some(term.to_string());
            }
        }
    }
    None
}

fn search_term_patterns() -> &'static Vec<Regex> {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"(?i)busca(?:r)?\s+(.+)",
            r"(?i)encuentra(?:r)?\s+(.+)",
            r"(?i)filtrar?\s+(.+)",
            r"(?i)(?:hay|tienes|tengo)\s+(.+)\??$",
            r"(?i)existe(?:n)?\s+(.+)\??$",
            r"(?i)productos?\s+(?:de|con)\s+(.+)",
            r"(?i)(.+)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn asks_for_last(message: &str) -> bool {
    let msg_lower = message.to_lowercase();
    ["última", "ultima", "último", "ultimo"].iter().any(|w| msg_lower.contains(w))
}

fn asks_for_today(message: &str) -> bool {
    message.to_lowercase().contains("hoy")
}

fn extract_bare_number(message: &str) -> Option<usize> {
    bare_number_pattern().captures(message.trim())?.get(1)?.as_str().parse().ok()
}

fn extract_detail_number(message: &str) -> Option<usize> {
    for pattern in detail_number_patterns() {
        if let Some(caps) = pattern.captures(message) {
            if let Some(m) = caps.get(1) {
                if let Ok(n) = m.as_str().parse() {
                    return Some(n);
                }
            }
        }
    }
    None
}

fn bare_number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})$").unwrap())
}

fn detail_number_patterns() -> &'static Vec<Regex> {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [r"(?i)detalle\s+(?:de\s+)?(?:la\s+|el\s+)?(\d+)", r"(?i)n[uú]mero\s+(\d+)", r"(?i)#\s*(\d+)"]
            .iter()
            .map(|p| Regex::new(p).unwrap())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_search_term_strips_leading_verb() {
        assert_eq!(extract_search_term("busca laptops").as_deref(), Some("laptops"));
        assert_eq!(extract_search_term("tienes cuadernos?").as_deref(), Some("cuadernos"));
    }

    #[test]
    fn extract_bare_number_rejects_longer_numbers() {
        assert_eq!(extract_bare_number("3"), Some(3));
        assert_eq!(extract_bare_number("123"), None);
    }

    #[test]
    fn asks_for_today_and_last_detect_keywords() {
        assert!(asks_for_today("lo de hoy"));
        assert!(asks_for_last("la última factura"));
    }
}
