mod patterns;

use jack_sessions::{ConversationContext, MessageRole, Session};
use serde::{Deserialize, Serialize};

/// What the caller is trying to do, as resolved by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    EmitInvoice,
    QueryProducts,
    QueryClients,
    QueryHistory,
    GeneralQuestion,
    Confirmation,
    Cancel,
    Greeting,
    Unknown,
}

/// Rule-ordered, not ML: rules are tried top to bottom and the first match
/// wins. Confidence is cosmetic (used for logging only); callers must not
/// branch on it.
pub fn classify(utterance: &str, session: &Session) -> (Intent, f64) {
    let text = utterance.trim();
    let text_lower = text.to_lowercase();
    let context = conversation_context(session);

    // 1. Product-detail affirmation.
    if context == ConversationContext::ProductDetail && patterns::is_affirmative(text) {
        return (Intent::QueryProducts, 0.95);
    }

    // 2. Bare small integer, resolved against context.
    if patterns::is_bare_small_number(text) {
        match context {
            ConversationContext::Products | ConversationContext::SearchResults => {
                return (Intent::QueryProducts, 0.95);
            }
            ConversationContext::History | ConversationContext::TodayEmissions => {
                return (Intent::QueryHistory, 0.95);
            }
            _ => {}
        }
    }

    // 3. Search-in-products context.
    if context == ConversationContext::Products
        && (patterns::is_product_search_cue(text) || text.chars().count() > 2)
        && !patterns::is_emission_cue(text)
        && !patterns::is_history_cue(text)
    {
        return (Intent::QueryProducts, 0.9);
    }

    // 4. Pending confirmation.
    if session.awaiting_confirmation {
        if patterns::is_affirmative(text) {
            return (Intent::Confirmation, 0.95);
        }
        if patterns::is_negative(text) {
            return (Intent::Cancel, 0.95);
        }
    }

    // 5. Active emission.
    if has_active_emission(session) {
        if patterns::is_negative(text) && text.chars().count() < 15 {
            return (Intent::Cancel, 0.9);
        }
        if patterns::has_dni(text) || patterns::has_ruc(text) {
            return (Intent::EmitInvoice, 0.85);
        }
        if patterns::has_priced_item_phrase(&text_lower) {
            return (Intent::EmitInvoice, 0.85);
        }
    }

    // 6. History cues.
    if patterns::is_history_cue(text) || patterns::has_detalle_with_reference(&text_lower) {
        return (Intent::QueryHistory, 0.9);
    }

    // 7. General-question cues.
    if (patterns::is_general_question_cue(text) || (text.contains('?') && text.chars().count() > 10))
        && !patterns::is_emission_cue(text)
    {
        return (Intent::GeneralQuestion, 0.9);
    }

    // 8. Short greeting.
    if text.chars().count() < 25 && patterns::is_greeting(text) {
        return (Intent::Greeting, 0.9);
    }

    // 9. Product cues.
    if patterns::is_product_cue(text) {
        return (Intent::QueryProducts, 0.9);
    }
    if patterns::is_product_search_cue(text) && text_lower.contains("producto") {
        return (Intent::QueryProducts, 0.85);
    }

    // 10. Emission cues.
    if patterns::is_emission_cue(text) {
        return (Intent::EmitInvoice, 0.85);
    }

    // 11. Loose DNI/RUC with emission context.
    let has_dni = patterns::has_dni(text);
    let has_ruc = patterns::has_ruc(text);
    if (has_dni || has_ruc)
        && (has_active_emission(session) || text_lower.contains("factura") || text_lower.contains("boleta"))
    {
        return (Intent::EmitInvoice, 0.75);
    }

    // 12. Client cues.
    if patterns::is_client_cue(text) {
        return (Intent::QueryClients, 0.9);
    }

    // 13. Context fallback.
    if context == ConversationContext::Products && !patterns::is_emission_cue(text) {
        return (Intent::QueryProducts, 0.7);
    }
    if context == ConversationContext::History && !patterns::is_emission_cue(text) {
        return (Intent::QueryHistory, 0.7);
    }

    // 14. Fallback.
    if text.contains('?') {
        return (Intent::GeneralQuestion, 0.6);
    }
    (Intent::Unknown, 0.5)
}

pub fn is_confirmation(message: &str) -> bool {
    patterns::is_affirmative(message)
}

pub fn is_cancellation(message: &str) -> bool {
    patterns::is_negative(message)
}

fn has_active_emission(session: &Session) -> bool {
    let emission = &session.emission_data;
    emission.document_kind.is_some() || emission.id_number.is_some() || !emission.items.is_empty()
}

/// Uses the session's stored context first; falls back to inferring it from
/// the last four assistant turns, matching the heuristics the conversation
/// handler's canned replies are written to trigger.
fn conversation_context(session: &Session) -> ConversationContext {
    if session.conversation_context != ConversationContext::None {
        return session.conversation_context;
    }

    for message in session.messages.iter().rev().take(4) {
        if message.role != MessageRole::Assistant {
            continue;
        }
        let content = message.content.to_lowercase();

        if content.contains("tus productos") || (message.content.contains('📦') && has_numbered_line(&message.content, 15)) {
            return ConversationContext::Products;
        }
        if (content.contains("historial") || content.contains("últimas emisiones")) && has_numbered_line(&message.content, 10) {
            return ConversationContext::History;
        }
        if content.contains("emisiones de hoy") {
            return ConversationContext::TodayEmissions;
        }
        if content.contains("resultados para") {
            return ConversationContext::SearchResults;
        }
        if content.contains("producto #") && content.contains("¿deseas emitir") {
            return ConversationContext::ProductDetail;
        }
    }

    ConversationContext::None
}

fn has_numbered_line(content: &str, upto: usize) -> bool {
    (1..=upto).any(|i| content.contains(&format!("{i}.")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jack_sessions::Session;

    fn session() -> Session {
        Session::new("51999888777".to_string(), Utc::now())
    }

    #[test]
    fn greeting_is_short_and_matches_vocabulary() {
        let s = session();
        assert_eq!(classify("Hola", &s).0, Intent::Greeting);
    }

    #[test]
    fn bare_number_in_products_context_queries_products() {
        let mut s = session();
        s.set_context(ConversationContext::Products);
        assert_eq!(classify("3", &s).0, Intent::QueryProducts);
    }

    #[test]
    fn bare_number_in_history_context_queries_history() {
        let mut s = session();
        s.set_context(ConversationContext::History);
        assert_eq!(classify("2", &s).0, Intent::QueryHistory);
    }

    #[test]
    fn awaiting_confirmation_affirmative_confirms() {
        let mut s = session();
        s.awaiting_confirmation = true;
        assert_eq!(classify("si", &s).0, Intent::Confirmation);
        assert_eq!(classify("no", &s).0, Intent::Cancel);
    }

    #[test]
    fn bare_factura_is_emission_cue() {
        let s = session();
        assert_eq!(classify("factura", &s).0, Intent::EmitInvoice);
    }

    #[test]
    fn unknown_when_nothing_matches() {
        let s = session();
        assert_eq!(classify("xyz123abc", &s).0, Intent::Unknown);
    }

    #[test]
    fn history_cue_wins_over_bare_question_mark_fallback() {
        let s = session();
        assert_eq!(classify("ventas?", &s).0, Intent::QueryHistory);
    }
}
