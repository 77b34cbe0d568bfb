use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::{Result, SessionError};
use crate::types::Session;

/// Strips a trailing `@...` device suffix and surrounding whitespace/dashes
/// so the same caller always maps to the same key regardless of which
/// channel format delivered the phone number.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let before_at = trimmed.split('@').next().unwrap_or(trimmed);
    before_at.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect()
}

/// In-memory mapping from normalized phone to session. Each session is
/// behind its own `tokio::sync::Mutex` — not `std::sync::Mutex` — because
/// the issuance call holds the lock across an `.await` point that can run
/// for up to 90 seconds; a std mutex guard cannot be held across an await.
///
/// This also gives per-phone serialization for free: two inbound messages
/// from the same caller queue on the same mutex (tokio's mutex is
/// FIFO-fair), while different callers proceed fully in parallel.
pub struct SessionStore {
    sessions: DashMap<String, Arc<Mutex<Session>>>,
    ttl_hours: i64,
}

impl SessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl_hours,
        }
    }

    /// Returns the session for `phone`, creating one if absent. If the
    /// existing session has been idle past the TTL it is replaced atomically
    /// with a fresh one (soft expiry — no background sweeper needed).
    #[instrument(skip(self), fields(phone = %phone))]
    pub fn get_or_create(&self, phone: &str) -> Result<Arc<Mutex<Session>>> {
        let key = normalize_phone(phone);
        if key.is_empty() {
            return Err(SessionError::EmptyPhone);
        }

        if let Some(entry) = self.sessions.get(&key) {
            let expired = {
                let guard = entry.try_lock();
                match guard {
                    Ok(session) => session.is_expired(self.ttl_hours, Utc::now()),
                    // Held by an in-flight turn: definitely not expired.
                    Err(_) => false,
                }
            };
            if !expired {
                return Ok(entry.clone());
            }
            debug!("session expired, replacing");
        }

        let fresh = Arc::new(Mutex::new(Session::new(key.clone(), Utc::now())));
        self.sessions.insert(key, fresh.clone());
        Ok(fresh)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_device_suffix_and_punctuation() {
        assert_eq!(normalize_phone("51999888777@s.whatsapp.net"), "51999888777");
        assert_eq!(normalize_phone(" 51-999-888-777 "), "51999888777");
    }

    #[tokio::test]
    async fn get_or_create_returns_same_session_for_same_phone() {
        let store = SessionStore::new(24);
        let a = store.get_or_create("51999888777").unwrap();
        let b = store.get_or_create("51999888777").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn get_or_create_replaces_expired_session() {
        let store = SessionStore::new(0);
        let a = store.get_or_create("51999888777").unwrap();
        {
            let mut session = a.lock().await;
            session.last_activity = Utc::now() - chrono::Duration::hours(1);
        }
        let b = store.get_or_create("51999888777").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
