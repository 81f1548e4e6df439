use sha1::{Digest, Sha1};

use crate::store::Store;

const USERNAME_KEY: &str = "username";
const PASSWORD_KEY: &str = "password";

/// SHA-1 hex digests of the raw credential pair. This is what rides on the
/// wire in place of the plaintext values; the server only ever sees these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedCredentials {
    pub username: String,
    pub password: String,
}

/// Owns all credential reads and writes. Nothing else in the crate touches
/// the raw username/password keys in the store.
pub struct CredentialStore {
    store: Store,
    logged_in: bool,
}

impl CredentialStore {
    pub fn new(store: Store) -> CredentialStore {
        let logged_in = store.get(USERNAME_KEY).is_some() && store.get(PASSWORD_KEY).is_some();
        CredentialStore { store, logged_in }
    }

    /// Persist the raw credentials. No validation happens here, the caller
    /// must have already confirmed the pair against the remote API.
    pub fn login(&mut self, username: &str, password: &str) {
        self.store.set(USERNAME_KEY, username.to_owned());
        self.store.set(PASSWORD_KEY, password.to_owned());
        self.logged_in = true;
    }

    pub fn logout(&mut self) {
        self.store.remove(USERNAME_KEY);
        self.store.remove(PASSWORD_KEY);
        self.logged_in = false;
    }

    pub fn is_authenticated(&self) -> bool {
        self.logged_in
    }

    pub fn username(&self) -> Option<&str> {
        self.store.get(USERNAME_KEY)
    }

    /// Digest pair for the stored credentials, or None when there is no
    /// session. Recomputed on every call, deterministic for fixed inputs.
    pub fn hashed_credentials(&self) -> Option<HashedCredentials> {
        let username = self.store.get(USERNAME_KEY)?;
        let password = self.store.get(PASSWORD_KEY)?;
        Some(HashedCredentials {
            username: sha1_hex(username),
            password: sha1_hex(password),
        })
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }
}

pub fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
