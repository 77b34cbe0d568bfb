pub mod error;
pub mod store;
pub mod types;

pub use error::SessionError;
pub use store::{normalize_phone, SessionStore};
pub use types::{
    ClientIdentification, ConversationContext, ConversationMessage, EmissionData, EmissionRecord,
    HistoryRecord, InvoiceItem, MessageRole, PendingItem, Product, Session, UserContext, MAX_HISTORY,
};
