use jack_sessions::{InvoiceItem, PendingItem};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

const NUMBER_WORDS: &[(&str, &str)] = &[
    ("un ", "1 "),
    ("uno ", "1 "),
    ("una ", "1 "),
    ("dos ", "2 "),
    ("tres ", "3 "),
    ("cuatro ", "4 "),
    ("cinco ", "5 "),
    ("seis ", "6 "),
    ("siete ", "7 "),
    ("ocho ", "8 "),
    ("nueve ", "9 "),
    ("diez ", "10 "),
];

const ITEM_KEYWORDS: &[&str] = &["factura", "boleta", "dni", "ruc", "para", "cliente", "documento"];
const PENDING_KEYWORDS: &[&str] =
    &["dni", "ruc", "para", "cliente", "boleta", "factura", "soles", "dolares", "documento"];

/// Returns `(priced_items, items_without_price)`, de-duplicated by
/// `(description.lower(), price)` for priced items and by description alone
/// for pending ones. `exclude` is the already-extracted ID number, stripped
/// from the text first so its digits aren't misread as a quantity.
pub fn extract_items(message: &str, exclude: Option<&str>) -> (Vec<InvoiceItem>, Vec<PendingItem>) {
    let text = match exclude {
        Some(number) if !number.is_empty() => message.replace(number, " "),
        _ => message.to_string(),
    };

    let mut normalized = text.to_lowercase();
    for (word, digit) in NUMBER_WORDS {
        normalized = normalized.replace(word, digit);
    }

    let mut items = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    collect_priced(pattern1(), &normalized, &mut items, &mut seen, true);
    collect_priced(pattern2(), &normalized, &mut items, &mut seen, true);
    collect_priced_no_qty(pattern3(), &normalized, &mut items, &mut seen);

    let mut items_without_price = Vec::new();
    if items.is_empty() {
        let mut seen_no_price: HashSet<String> = HashSet::new();
        for caps in pattern_no_price().captures_iter(&normalized) {
            let quantity = caps[1].to_string();
            let description = caps[2].trim().to_string();
            if PENDING_KEYWORDS.contains(&description.to_lowercase().as_str()) {
                continue;
            }
            let key = description.to_lowercase();
            if seen_no_price.insert(key) {
                items_without_price.push(PendingItem { description, quantity });
            }
        }
    }

    (items, items_without_price)
}

fn collect_priced(
    re: &Regex,
    text: &str,
    items: &mut Vec<InvoiceItem>,
    seen: &mut HashSet<(String, String)>,
    validate_qty_len: bool,
) {
    for caps in re.captures_iter(text) {
        let quantity = caps[1].to_string();
        if validate_qty_len && quantity.len() >= 5 {
            continue;
        }
        let description = caps[2].trim().to_string();
        let price = caps[3].replace(',', ".");
        push_if_new(items, seen, description, quantity, price);
    }
}

fn collect_priced_no_qty(
    re: &Regex,
    text: &str,
    items: &mut Vec<InvoiceItem>,
    seen: &mut HashSet<(String, String)>,
) {
    for caps in re.captures_iter(text) {
        let description = caps[1].trim().to_string();
        if ITEM_KEYWORDS.contains(&description.to_lowercase().as_str()) {
            continue;
        }
        let price = caps[2].replace(',', ".");
        push_if_new(items, seen, description, "1".to_string(), price);
    }
}

fn push_if_new(
    items: &mut Vec<InvoiceItem>,
    seen: &mut HashSet<(String, String)>,
    description: String,
    quantity: String,
    price: String,
) {
    if description.is_empty() {
        return;
    }
    let price_value: f64 = price.parse().unwrap_or(0.0);
    if price_value <= 0.0 {
        return;
    }
    let key = (description.to_lowercase(), price.clone());
    if seen.insert(key) {
        items.push(InvoiceItem::new(description, quantity, price));
    }
}

// "N producto a/@ precio" — e.g. "2 laptops a 2500".
fn pattern1() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(\d{1,4})\s*[xX×]?\s*([a-záéíóúñ][a-záéíóúñs\s]{1,30}?)\s*[@a]\s*(?:PEN|USD|S/|s/|\$)?\s*(\d+(?:[.,]\d{1,2})?)",
        )
        .unwrap()
    })
}

// "N producto por precio" — e.g. "2 laptops por 2500".
fn pattern2() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(\d{1,4})\s+([a-záéíóúñ][a-záéíóúñs\s]{1,30}?)\s+(?:por|de)\s+(?:PEN|USD|S/|s/|\$)?\s*(\d+(?:[.,]\d{1,2})?)",
        )
        .unwrap()
    })
}

// "producto a precio" with no quantity — implied quantity of 1.
fn pattern3() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([a-záéíóúñ][a-záéíóúñs]{2,20})\s+(?:a|@|por)\s+(?:PEN|USD|S/|s/|\$)?\s*(\d+(?:[.,]\d{1,2})?)\b")
            .unwrap()
    })
}

// "N producto" with no price at all — captured as a pending item.
fn pattern_no_price() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d{1,3})\s+([a-záéíóúñ][a-záéíóúñs]{2,25})").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_priced_items() {
        let (items, pending) = extract_items("2 cuadernos a 15, 5 lapiceros a 3", None);
        assert_eq!(items.len(), 2);
        assert!(pending.is_empty());
        assert_eq!(items[0].description, "cuadernos");
        assert_eq!(items[0].quantity, "2");
        assert_eq!(items[0].price, "15");
    }

    #[test]
    fn dedups_repeated_item() {
        let (items, _) = extract_items("2 cuadernos a 15, 2 cuadernos a 15", None);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn no_price_yields_pending_item() {
        let (items, pending) = extract_items("3 cuadernos", None);
        assert!(items.is_empty());
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].quantity, "3");
        assert_eq!(pending[0].description, "cuadernos");
    }

    #[test]
    fn number_word_prefix_is_normalized() {
        let (items, _) = extract_items("dos laptops a 2500", None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, "2");
    }

    #[test]
    fn excludes_id_number_from_item_parsing() {
        let (items, _) = extract_items("DNI 12345678, 2 cuadernos a 15", Some("12345678"));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "cuadernos");
    }
}
