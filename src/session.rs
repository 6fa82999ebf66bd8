use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const USER_DATA_KEY: &str = "user_data";
pub const REMEMBERED_EMAIL_KEY: &str = "remembered_email";
pub const REMEMBER_ME_KEY: &str = "remember_me";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Opaque string store backing the persisted session.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Credentials handed explicitly to every workflow call that reaches the remote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub token: Option<String>,
    pub user: Option<User>,
}

impl SessionContext {
    pub fn authenticated(token: impl Into<String>, user: User) -> Self {
        Self {
            token: Some(token.into()),
            user: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn require_token(&self) -> Result<&str, AppError> {
        self.token
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("not logged in".to_string()))
    }
}

/// Reads and writes the persisted session keys. Nothing else touches the store.
pub struct SessionManager<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> SessionManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load(&self) -> SessionContext {
        let token = self.store.get(AUTH_TOKEN_KEY);
        let user = self
            .store
            .get(USER_DATA_KEY)
            .and_then(|raw| match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!(error = %err, "discarding unreadable cached user data");
                    None
                }
            });

        match (token, user) {
            (Some(token), Some(user)) => SessionContext::authenticated(token, user),
            _ => SessionContext::default(),
        }
    }

    pub fn persist(&self, context: &SessionContext, remember_me: bool) -> Result<(), AppError> {
        let (Some(token), Some(user)) = (&context.token, &context.user) else {
            return Err(AppError::Internal("cannot persist an anonymous session".to_string()));
        };

        let user_json = serde_json::to_string(user)
            .map_err(|err| AppError::Internal(format!("failed to encode user: {err}")))?;

        self.store.set(AUTH_TOKEN_KEY, token.clone());
        self.store.set(USER_DATA_KEY, user_json);
        self.store.set(REMEMBER_ME_KEY, remember_me.to_string());

        if remember_me {
            self.store.set(REMEMBERED_EMAIL_KEY, user.email.clone());
        } else {
            self.store.remove(REMEMBERED_EMAIL_KEY);
        }

        Ok(())
    }

    /// Drops the token and cached user; the remembered email survives.
    pub fn clear(&self) {
        self.store.remove(AUTH_TOKEN_KEY);
        self.store.remove(USER_DATA_KEY);
    }

    pub fn remembered_email(&self) -> Option<String> {
        let remember = self.store.get(REMEMBER_ME_KEY).is_some_and(|v| v == "true");
        if remember {
            self.store.get(REMEMBERED_EMAIL_KEY)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        KeyValueStore, MemoryStore, SessionContext, SessionManager, User, AUTH_TOKEN_KEY,
        USER_DATA_KEY,
    };

    fn user() -> User {
        User {
            id: "d-1".to_string(),
            name: "Sam".to_string(),
            email: "sam@fleet.io".to_string(),
            phone: None,
        }
    }

    #[test]
    fn persisted_session_loads_back() {
        let manager = SessionManager::new(MemoryStore::new());
        let context = SessionContext::authenticated("tok-1", user());

        manager.persist(&context, true).unwrap();

        assert_eq!(manager.load(), context);
        assert_eq!(manager.remembered_email().as_deref(), Some("sam@fleet.io"));
    }

    #[test]
    fn clear_keeps_remembered_email() {
        let manager = SessionManager::new(MemoryStore::new());
        manager
            .persist(&SessionContext::authenticated("tok-1", user()), true)
            .unwrap();

        manager.clear();

        assert!(!manager.load().is_authenticated());
        assert_eq!(manager.remembered_email().as_deref(), Some("sam@fleet.io"));
    }

    #[test]
    fn corrupt_user_data_yields_anonymous_session() {
        let store = MemoryStore::new();
        store.set(AUTH_TOKEN_KEY, "tok".to_string());
        store.set(USER_DATA_KEY, "{not json".to_string());

        let manager = SessionManager::new(store);
        assert_eq!(manager.load(), SessionContext::default());
    }

    #[test]
    fn anonymous_context_has_no_token() {
        assert!(SessionContext::default().require_token().is_err());
    }
}
