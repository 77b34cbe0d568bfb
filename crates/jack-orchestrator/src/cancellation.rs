//! Cancellation keyword matching, usable at any point in the dialogue.

const CANCELLATION_WORDS: &[&str] = &[
    "cancelar",
    "cancela",
    "cancelalo",
    "cancélalo",
    "no quiero",
    "no deseo",
    "olvida",
    "olvidalo",
    "olvídalo",
    "salir",
    "sal",
    "detener",
    "parar",
    "para",
    "dejalo",
    "déjalo",
    "ya no",
    "mejor no",
    "no gracias",
    "nada",
    "ninguno",
];

/// Words specific enough that a bare substring match is safe without risking
/// false positives on unrelated sentences that merely contain the others.
const HIGH_SIGNAL_SUBSTRINGS: &[&str] = &["cancelar", "cancela", "no quiero", "olvida", "salir"];

pub fn is_cancellation(message: &str) -> bool {
    let text = message.trim().to_lowercase();

    for word in CANCELLATION_WORDS {
        if text == *word || text.starts_with(&format!("{word} ")) || text.starts_with(&format!("{word},")) {
            return true;
        }
    }

    HIGH_SIGNAL_SUBSTRINGS.iter().any(|word| text.contains(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_word_cancels() {
        assert!(is_cancellation("cancelar"));
        assert!(is_cancellation("Salir"));
    }

    #[test]
    fn leading_word_with_trailing_clause_cancels() {
        assert!(is_cancellation("para, ya no quiero seguir"));
        assert!(is_cancellation("nada más gracias"));
    }

    #[test]
    fn unrelated_sentence_does_not_cancel() {
        assert!(!is_cancellation("2 cuadernos a 15"));
        assert!(!is_cancellation("factura para la empresa"));
    }
}
