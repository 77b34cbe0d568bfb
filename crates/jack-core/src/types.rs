use serde::{Deserialize, Serialize};
use std::fmt;

/// SUNAT document kind. Numeric wire codes come straight from the issuing
/// service's contract (`"01"` factura, `"03"` boleta).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Factura,
    Boleta,
}

impl DocumentKind {
    pub fn wire_code(&self) -> &'static str {
        match self {
            DocumentKind::Factura => "01",
            DocumentKind::Boleta => "03",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Factura => write!(f, "factura"),
            DocumentKind::Boleta => write!(f, "boleta"),
        }
    }
}

/// Identity document type for the invoice's recipient. A DNI recipient can
/// only receive a boleta; a RUC recipient can receive either, but a factura
/// requires RUC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdType {
    Dni,
    Ruc,
}

impl IdType {
    /// Valid digit length for this document type (DNI: 8, RUC: 11).
    pub fn digit_len(&self) -> usize {
        match self {
            IdType::Dni => 8,
            IdType::Ruc => 11,
        }
    }

    /// Wire code for the issuing service's `tdicod` field.
    pub fn wire_code(&self) -> &'static str {
        match self {
            IdType::Dni => "1",
            IdType::Ruc => "6",
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdType::Dni => write!(f, "DNI"),
            IdType::Ruc => write!(f, "RUC"),
        }
    }
}

/// Currency for unit prices within an invoice. Every item in an invoice
/// shares one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    Soles,
    Dolares,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Soles => write!(f, "soles"),
            Currency::Dolares => write!(f, "dólares"),
        }
    }
}
