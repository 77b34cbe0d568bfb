use jack_core::types::IdType;
use regex::Regex;
use std::sync::OnceLock;

pub struct ExtractedId {
    pub id_type: IdType,
    pub number: String,
}

/// Explicit prefix wins over a loose match; a loose RUC wins over a loose
/// DNI so an 11-digit RUC embedded in a longer utterance is never split
/// into an 8-digit DNI fragment.
pub fn extract_id(message: &str) -> Option<ExtractedId> {
    let upper = message.to_uppercase();

    if let Some(caps) = dni_explicit().captures(&upper) {
        return Some(ExtractedId {
            id_type: IdType::Dni,
            number: caps[1].to_string(),
        });
    }

    if let Some(caps) = ruc_explicit().captures(&upper) {
        return Some(ExtractedId {
            id_type: IdType::Ruc,
            number: caps[1].to_string(),
        });
    }

    if let Some(caps) = ruc_loose().captures(message) {
        return Some(ExtractedId {
            id_type: IdType::Ruc,
            number: caps[1].to_string(),
        });
    }

    // Loose DNI: exactly 8 digits bordered by non-digits, value >= 1,000,000
    // to rule out trailing-digit collisions with item quantities.
    for caps in dni_loose().captures_iter(message) {
        let number = &caps[1];
        if number.parse::<u64>().unwrap_or(0) >= 1_000_000 {
            return Some(ExtractedId {
                id_type: IdType::Dni,
                number: number.to_string(),
            });
        }
    }

    None
}

fn dni_explicit() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"DNI\s*[:\s]?\s*(\d{8})\b").unwrap())
}

fn ruc_explicit() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"RUC\s*[:\s]?\s*([12]0\d{9})\b").unwrap())
}

fn ruc_loose() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([12]0\d{9})\b").unwrap())
}

fn dni_loose() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\D)(\d{8})(?:\D|$)").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dni_prefix_wins() {
        let id = extract_id("mi DNI: 12345678 gracias").unwrap();
        assert_eq!(id.id_type, IdType::Dni);
        assert_eq!(id.number, "12345678");
    }

    #[test]
    fn loose_ruc_detected() {
        let id = extract_id("factura para 20161541991").unwrap();
        assert_eq!(id.id_type, IdType::Ruc);
        assert_eq!(id.number, "20161541991");
    }

    #[test]
    fn loose_dni_below_floor_is_rejected() {
        assert!(extract_id("00000001").is_none());
    }

    #[test]
    fn no_id_present() {
        assert!(extract_id("2 cuadernos a 15").is_none());
    }
}
