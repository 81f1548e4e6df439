use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::CredentialStore;

pub const HOURS_BY_DATE: &str = "hoursByDate";
pub const SELECTED_DATE: &str = "selectedDate";

const TAGS: [&str; 2] = [HOURS_BY_DATE, SELECTED_DATE];

/// Per-user slice of the store. Every key is the purpose tag joined with the
/// hashed credential pair, so two users never collide and switching users
/// never leaks cached data.
///
/// Requires an active session. Calling without one is a programming error:
/// loud in debug builds, a safe no-op in release.
pub struct UserCache<'a> {
    auth: &'a mut CredentialStore,
}

impl<'a> UserCache<'a> {
    pub fn new(auth: &'a mut CredentialStore) -> UserCache<'a> {
        UserCache { auth }
    }

    pub fn save<T: Serialize>(&mut self, tag: &str, value: &T) {
        let key = match self.key(tag) {
            Some(k) => k,
            None => return,
        };
        match serde_json::to_string(value) {
            Ok(serialised) => self.auth.store_mut().set(&key, serialised),
            Err(e) => warn!("Failed to serialise {} for caching: {}", tag, e),
        }
    }

    pub fn load<T: DeserializeOwned>(&self, tag: &str) -> Option<T> {
        let key = self.key(tag)?;
        let serialised = self.auth.store().get(&key)?;
        match serde_json::from_str(serialised) {
            Ok(value) => Some(value),
            Err(e) => {
                // Corrupt payloads count as absent, never as a crash
                warn!("Discarding corrupt cache entry {}: {}", tag, e);
                None
            }
        }
    }

    /// Drop every purpose-tagged key for the current user. The in-memory
    /// view-model is the caller's to reset.
    pub fn clear(&mut self) {
        for tag in TAGS.iter() {
            if let Some(key) = self.key(tag) {
                self.auth.store_mut().remove(&key);
            }
        }
    }

    fn key(&self, tag: &str) -> Option<String> {
        let credentials = self.auth.hashed_credentials();
        debug_assert!(
            credentials.is_some(),
            "per-user cache used without a session"
        );
        let credentials = credentials?;
        Some(format!(
            "{}_{}_{}",
            tag, credentials.username, credentials.password
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn open_auth(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::new(Store::open(dir.path().join("store.json")))
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut auth = open_auth(&dir);
        auth.login("ana", "lozinka123");

        UserCache::new(&mut auth).save(SELECTED_DATE, &"2024-03-04".to_owned());
        let loaded: Option<String> = UserCache::new(&mut auth).load(SELECTED_DATE);
        assert_eq!(loaded.as_deref(), Some("2024-03-04"));
    }

    #[test]
    fn users_never_see_each_others_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut auth = open_auth(&dir);

        auth.login("ana", "lozinka123");
        UserCache::new(&mut auth).save(SELECTED_DATE, &"2024-03-04".to_owned());

        auth.login("ivan", "tajna456");
        let loaded: Option<String> = UserCache::new(&mut auth).load(SELECTED_DATE);
        assert_eq!(loaded, None);

        // The first user's entry is still there under their own key
        auth.login("ana", "lozinka123");
        let loaded: Option<String> = UserCache::new(&mut auth).load(SELECTED_DATE);
        assert_eq!(loaded.as_deref(), Some("2024-03-04"));
    }

    #[test]
    fn distinct_credentials_produce_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut auth = open_auth(&dir);
        let pairs = [
            ("ana", "lozinka123"),
            ("ana", "lozinka124"),
            ("anb", "lozinka123"),
            ("ivan", "tajna456"),
        ];
        let mut keys = std::collections::HashSet::new();
        for (username, password) in pairs.iter() {
            auth.login(username, password);
            let key = UserCache::new(&mut auth).key(HOURS_BY_DATE).unwrap();
            assert!(keys.insert(key), "cache key collision for {}", username);
        }
    }

    #[test]
    fn clear_removes_all_tags_for_the_current_user_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut auth = open_auth(&dir);

        auth.login("ivan", "tajna456");
        UserCache::new(&mut auth).save(SELECTED_DATE, &"2024-03-05".to_owned());

        auth.login("ana", "lozinka123");
        UserCache::new(&mut auth).save(SELECTED_DATE, &"2024-03-04".to_owned());
        UserCache::new(&mut auth).save(HOURS_BY_DATE, &"{}".to_owned());
        UserCache::new(&mut auth).clear();
        assert_eq!(
            UserCache::new(&mut auth).load::<String>(SELECTED_DATE),
            None
        );
        assert_eq!(
            UserCache::new(&mut auth).load::<String>(HOURS_BY_DATE),
            None
        );

        auth.login("ivan", "tajna456");
        let loaded: Option<String> = UserCache::new(&mut auth).load(SELECTED_DATE);
        assert_eq!(loaded.as_deref(), Some("2024-03-05"));
    }

    #[test]
    fn corrupt_entry_loads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut auth = open_auth(&dir);
        auth.login("ana", "lozinka123");

        let key = UserCache::new(&mut auth).key(HOURS_BY_DATE).unwrap();
        auth.store_mut().set(&key, "{broken".to_owned());
        let loaded: Option<serde_json::Value> = UserCache::new(&mut auth).load(HOURS_BY_DATE);
        assert_eq!(loaded, None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "without a session")]
    fn cache_access_without_a_session_panics_in_debug() {
        let dir = tempfile::tempdir().unwrap();
        let mut auth = open_auth(&dir);
        UserCache::new(&mut auth).save(SELECTED_DATE, &"2024-03-04".to_owned());
    }
}
