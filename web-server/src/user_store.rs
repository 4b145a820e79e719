// web-server/src/user_store.rs
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::{thread_rng, RngCore};

use crate::error::ApiError;

/// Password check against whatever holds the user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// The subject for `username` when `password` matches, otherwise `None`.
    ///
    /// Unknown users and wrong passwords must cost the same. `Err` is reserved
    /// for the store itself failing.
    async fn verify_password(&self, username: &str, password: &str) -> Result<Option<String>, ApiError>;
}

/// User accounts held in memory, passwords stored as argon2 PHC strings.
pub struct InMemoryUserStore {
    users: DashMap<String, String>,
    hasher: Argon2<'static>,
    // Verified against for unknown usernames, so both failure paths do one argon2 verification
    dummy_hash: String,
}

impl InMemoryUserStore {
    pub fn new() -> Result<Self, password_hash::Error> {
        Self::with_params(Params::default())
    }

    pub fn with_params(params: Params) -> Result<Self, password_hash::Error> {
        let hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_password(&hasher, "dummy-password-for-unknown-users")?;

        Ok(Self {
            users: DashMap::new(),
            hasher,
            dummy_hash,
        })
    }

    /// Add or replace a user.
    pub fn add_user(&self, username: &str, password: &str) -> Result<(), password_hash::Error> {
        let hash = hash_password(&self.hasher, password)?;
        self.users.insert(username.to_string(), hash);
        Ok(())
    }

    /// Add a user unless one with that name already exists. Returns whether it was added.
    pub fn seed_user(&self, username: &str, password: &str) -> Result<bool, password_hash::Error> {
        if self.users.contains_key(username) {
            return Ok(false);
        }
        self.add_user(username, password)?;
        Ok(true)
    }
}

fn hash_password(hasher: &Argon2<'_>, password: &str) -> Result<String, password_hash::Error> {
    let mut bytes = [0u8; 16];
    thread_rng().fill_bytes(&mut bytes);
    let salt = SaltString::encode_b64(&bytes)?;

    hasher
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

fn verify_hash(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn verify_password(&self, username: &str, password: &str) -> Result<Option<String>, ApiError> {
        // Copy out so no map guard is held across the await
        let stored = self.users.get(username).map(|entry| entry.value().clone());
        let known = stored.is_some();
        let hash = stored.unwrap_or_else(|| self.dummy_hash.clone());
        let password = password.to_string();

        // argon2 is CPU bound; keep it off the async workers
        let matches = actix_web::web::block(move || verify_hash(&password, &hash))
            .await
            .map_err(|e| ApiError::Internal(format!("password verification failed: {}", e)))?;

        Ok((known && matches).then(|| username.to_string()))
    }
}

#[cfg(test)]
pub(crate) fn fast_params() -> Params {
    Params::new(Params::MIN_M_COST, 1, 1, None).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryUserStore {
        let store = InMemoryUserStore::with_params(fast_params()).unwrap();
        store.add_user("alice", "correct horse").unwrap();
        store
    }

    #[actix_web::test]
    async fn test_verify_password() {
        let store = store();
        assert_eq!(
            store.verify_password("alice", "correct horse").await.unwrap().as_deref(),
            Some("alice")
        );
        assert_eq!(store.verify_password("alice", "wrong").await.unwrap(), None);
        assert_eq!(store.verify_password("mallory", "correct horse").await.unwrap(), None);
        assert_eq!(store.verify_password("", "").await.unwrap(), None);
    }

    #[actix_web::test]
    async fn test_dummy_password_never_matches_unknown_user() {
        let store = store();
        assert_eq!(
            store.verify_password("nobody", "dummy-password-for-unknown-users").await.unwrap(),
            None
        );
    }

    #[test]
    fn test_hashes_are_salted() {
        let store = store();
        store.add_user("bob", "correct horse").unwrap();
        let alice = store.users.get("alice").unwrap().clone();
        let bob = store.users.get("bob").unwrap().clone();
        assert_ne!(alice, bob);
        assert!(alice.starts_with("$argon2id$"));
    }

    #[test]
    fn test_seed_user_keeps_existing() {
        let store = store();
        assert!(!store.seed_user("alice", "other").unwrap());
        assert!(store.seed_user("admin", "admin-pass").unwrap());
        assert_eq!(store.users.len(), 2);
    }
}
