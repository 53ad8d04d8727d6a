//! Session token resolution. The token lives in the browsing context's
//! session storage, so every page load in one tab shares it.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::{distributions::Alphanumeric, Rng};

pub const SESSION_STORAGE_KEY: &str = "heatlens_session";
pub const SESSION_TOKEN_LEN: usize = 16;

/// Key/value storage scoped to one browsing context.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-process [`SessionStore`], one per simulated tab.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }
}

pub fn mint_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Return the stored session token, minting and storing one when absent.
pub fn resolve_session(store: &dyn SessionStore) -> String {
    if let Some(token) = store.get(SESSION_STORAGE_KEY).filter(|t| !t.is_empty()) {
        return token;
    }
    let token = mint_session_token();
    store.set(SESSION_STORAGE_KEY, &token);
    token
}
