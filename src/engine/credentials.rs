use std::sync::RwLock;

/// Source of the API key used for generation calls.
pub trait CredentialProvider: Send + Sync {
    fn api_key(&self) -> Option<String>;

    fn has_credential(&self) -> bool {
        self.api_key().is_some()
    }

    /// Stores a key the player entered.
    fn store(&self, key: String);

    /// Drops a key the backend refused.
    fn invalidate(&self);
}

/// In-memory key shared between the engine and the backend client.
#[derive(Debug, Default)]
pub struct SharedCredential {
    key: RwLock<Option<String>>,
}

impl SharedCredential {
    pub fn new(key: Option<String>) -> Self {
        let key = key.filter(|key| !key.trim().is_empty());
        Self {
            key: RwLock::new(key),
        }
    }
}

impl CredentialProvider for SharedCredential {
    fn api_key(&self) -> Option<String> {
        self.key
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn store(&self, key: String) {
        let key = key.trim().to_string();
        let mut slot = self
            .key
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = (!key.is_empty()).then_some(key);
    }

    fn invalidate(&self) {
        *self
            .key
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
