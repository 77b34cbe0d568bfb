mod id_extraction;
mod item_extraction;

use jack_core::types::{Currency, DocumentKind, IdType};
use jack_sessions::{EmissionData, InvoiceItem, PendingItem, Session};

/// What [`extract`] managed to pull out of one utterance. Nothing here is
/// committed to a session until [`update`] merges it in.
#[derive(Debug, Clone, Default)]
pub struct PartialEmission {
    pub document_kind: Option<DocumentKind>,
    pub id_type: Option<IdType>,
    pub id_number: Option<String>,
    pub currency: Option<Currency>,
    pub items: Vec<InvoiceItem>,
    pub items_without_price: Vec<PendingItem>,
}

/// Pure function: parses document kind, ID, currency and line items out of
/// one utterance. Does not look at `session` beyond what's needed to decide
/// whether an inference should apply (currently nothing — kept for symmetry
/// with the classifier's signature and in case future rules need it).
pub fn extract(utterance: &str, _session: &Session) -> PartialEmission {
    let text_lower = utterance.to_lowercase();
    let mut result = PartialEmission::default();

    // 1. Document kind.
    if contains_word(&text_lower, "factura") {
        result.document_kind = Some(DocumentKind::Factura);
    } else if contains_word(&text_lower, "boleta") {
        result.document_kind = Some(DocumentKind::Boleta);
    }

    // 2. Identification, before item parsing so quantities don't get
    // misread as fragments of an ID.
    if let Some(id) = id_extraction::extract_id(utterance) {
        result.id_type = Some(id.id_type);
        result.id_number = Some(id.number.clone());

        // DNI with no explicit document kind implies a receipt.
        if result.document_kind.is_none() && id.id_type == IdType::Dni {
            result.document_kind = Some(DocumentKind::Boleta);
        }
    }

    // 3. Currency.
    result.currency = Some(
        if ["dólar", "dolar", "dolares", "usd", "$"].iter().any(|w| text_lower.contains(w)) {
            Currency::Dolares
        } else {
            Currency::Soles
        },
    );

    // 4. Line items (priced and pending).
    let exclude = result.id_number.as_deref();
    let (items, items_without_price) = item_extraction::extract_items(utterance, exclude);
    result.items = items;
    result.items_without_price = items_without_price;

    result
}

/// Merges a [`PartialEmission`] into `session`'s emission data without
/// overwriting already-populated slots. Idempotent: calling this a second
/// time with the same partial result is a no-op on slots already set (L1).
pub fn update(emission: &mut EmissionData, partial: &PartialEmission) {
    if let Some(kind) = partial.document_kind {
        if emission.document_kind.is_none() {
            emission.document_kind = Some(kind);
        }
    }

    if let (Some(id_type), Some(id_number)) = (partial.id_type, &partial.id_number) {
        if emission.id_type.is_none() {
            emission.id_type = Some(id_type);
            emission.id_number = Some(id_number.clone());
        }
    }

    if let Some(currency) = partial.currency {
        emission.currency = currency;
    }

    if !partial.items.is_empty() {
        let mut seen: std::collections::HashSet<(String, String)> =
            emission.items.iter().map(InvoiceItem::dedup_key).collect();
        for item in &partial.items {
            let key = item.dedup_key();
            if !seen.contains(&key) {
                seen.insert(key);
                emission.items.push(item.clone());
            }
        }
    }
}

fn contains_word(text_lower: &str, word: &str) -> bool {
    text_lower.split(|c: char| !c.is_alphanumeric()).any(|tok| tok == word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session() -> Session {
        Session::new("51999888777".to_string(), Utc::now())
    }

    #[test]
    fn dni_infers_boleta() {
        let p = extract("DNI 12345678", &session());
        assert_eq!(p.document_kind, Some(DocumentKind::Boleta));
        assert_eq!(p.id_type, Some(IdType::Dni));
        assert_eq!(p.id_number.as_deref(), Some("12345678"));
    }

    #[test]
    fn ruc_does_not_infer_document_kind() {
        let p = extract("20161541991", &session());
        assert_eq!(p.document_kind, None);
        assert_eq!(p.id_type, Some(IdType::Ruc));
    }

    #[test]
    fn currency_defaults_to_soles() {
        let p = extract("2 cuadernos a 15", &session());
        assert_eq!(p.currency, Some(Currency::Soles));
    }

    #[test]
    fn dollar_sign_selects_dolares() {
        let p = extract("2 cuadernos a $15", &session());
        assert_eq!(p.currency, Some(Currency::Dolares));
    }

    #[test]
    fn update_does_not_overwrite_populated_slots() {
        let mut emission = EmissionData::default();
        emission.document_kind = Some(DocumentKind::Factura);
        let partial = extract("boleta", &session());
        update(&mut emission, &partial);
        assert_eq!(emission.document_kind, Some(DocumentKind::Factura));
    }

    #[test]
    fn update_is_idempotent_on_repeated_items() {
        let mut emission = EmissionData::default();
        let partial = extract("2 cuadernos a 15, 2 cuadernos a 15", &session());
        update(&mut emission, &partial);
        assert_eq!(emission.items.len(), 1);
        update(&mut emission, &partial);
        assert_eq!(emission.items.len(), 1);
    }
}
