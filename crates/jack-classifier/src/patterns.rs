use regex::Regex;
use std::sync::OnceLock;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("pattern table is a compile-time constant"))
        .collect()
}

fn matches_any(text: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

pub fn is_affirmative(text: &str) -> bool {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(
        text,
        RE.get_or_init(|| {
            compile(&[
                r"^(si|sí|yes|ok|okey|okay|dale|confirmo|acepto)[\s\.\!\,]*$",
                r"^(adelante|procede|emite|correcto|claro|por supuesto)[\s\.\!\,]*$",
                r"^(está bien|esta bien|de acuerdo|listo|perfecto)[\s\.\!\,]*$",
            ])
        }),
    )
}

pub fn is_negative(text: &str) -> bool {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(
        text,
        RE.get_or_init(|| {
            compile(&[
                r"^(no|nop|nope|cancelar|cancela|olvida)[\s\.\!\,]*$",
                r"\b(mejor no|no quiero|detener|parar|salir)\b",
            ])
        }),
    )
}

pub fn is_emission_cue(text: &str) -> bool {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(
        text,
        RE.get_or_init(|| {
            compile(&[
                r"\b(emitir|generar|crear|hacer|necesito|quiero)\s+(una?\s+)?(factura|boleta)\b",
                r"^(factura|boleta)[\s\.\!\,]*$",
                r"\b(factura|boleta)\s+(para|con|de)\b",
                r"\bemite\s+(una?\s+)?(factura|boleta)\b",
            ])
        }),
    )
}

pub fn is_product_cue(text: &str) -> bool {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(
        text,
        RE.get_or_init(|| {
            compile(&[
                r"\b(producto|productos|catálogo|catalogo|inventario)\b",
                r"\b(mis productos|lista de productos|ver productos)\b",
                r"\b(dame|muestra|ver)\s+(los\s+)?productos\b",
            ])
        }),
    )
}

pub fn is_client_cue(text: &str) -> bool {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(text, RE.get_or_init(|| compile(&[r"\b(cliente|clientes|mis clientes)\b"])))
}

pub fn is_history_cue(text: &str) -> bool {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(
        text,
        RE.get_or_init(|| {
            compile(&[
                r"\b(historial|histórico|historico)\b",
                r"\b(ventas|emisiones)\b",
                r"\b(detalle|detalles|info)\s+(?:de\s+)?(?:la|el)\s+(\d+|última|ultimo|ultima)\b",
                r"\b(última|ultimo|ultima|último)\s+(factura|boleta|emisi[oó]n)?\b",
                r"\b(la|el|mi)\s+(de\s+)?hoy\b",
                r"\b(factura|boleta)\s+(de\s+)?hoy\b",
                r"\b(emitida|generada)\s+hoy\b",
            ])
        }),
    )
}

pub fn is_general_question_cue(text: &str) -> bool {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(
        text,
        RE.get_or_init(|| {
            compile(&[
                r"\b(qué es|que es|cómo funciona|como funciona)\b",
                r"\b(diferencia|diferencias)\b",
                r"\b(ayuda|dudas?|help)\b",
                r"\bigv\b",
                r"\b(explicame|explícame)\b",
                r"\b(cómo|como)\s+(emitir|hacer)\b",
            ])
        }),
    )
}

pub fn is_greeting(text: &str) -> bool {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(
        text,
        RE.get_or_init(|| compile(&[r"^(hola|hey|hi|buenos días|buenas tardes|buenas noches|buenas)[\s\!\.\,]*$"])),
    )
}

pub fn is_product_search_cue(text: &str) -> bool {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(
        text,
        RE.get_or_init(|| compile(&[r"\b(busca|buscar|encuentra|encontrar|filtrar|hay|tiene|tengo|existe)\b"])),
    )
}

pub fn is_bare_small_number(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}$").unwrap()).is_match(text)
}

pub fn has_dni(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{8}\b").unwrap()).is_match(text)
}

pub fn has_ruc(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[12]0\d{9}\b").unwrap()).is_match(text)
}

pub fn has_priced_item_phrase(text_lower: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\s+\w+\s+(a|@|por)\s+\d+").unwrap())
        .is_match(text_lower)
}

pub fn has_detalle_with_reference(text_lower: &str) -> bool {
    static DETALLE: OnceLock<Regex> = OnceLock::new();
    static REF: OnceLock<Regex> = OnceLock::new();
    DETALLE.get_or_init(|| Regex::new(r"detalle").unwrap()).is_match(text_lower)
        && REF
            .get_or_init(|| Regex::new(r"\d+|última|ultimo").unwrap())
            .is_match(text_lower)
}
