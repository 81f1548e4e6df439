use anyhow::{Context, Result};
use log::warn;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const STORE_PATH: &str = "~/.config/satnica/store.json";

/// Flat string-to-string persistent store, the localStorage of the app.
/// Unreadable or corrupt files are treated as an empty store so a broken
/// file forces a re-login instead of a crash.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl Store {
    pub fn open_default() -> Result<Store> {
        let path = shellexpand::full(STORE_PATH)
            .with_context(|| format!("Store path {} is invalid", STORE_PATH))?;
        Ok(Store::open(PathBuf::from(path.as_ref())))
    }

    pub fn open(path: PathBuf) -> Store {
        let values = match read_if_found(&path) {
            Ok(Some(contents)) => match serde_json::from_str(&contents) {
                Ok(values) => values,
                Err(e) => {
                    warn!("Corrupt store file {:?}, starting empty: {}", path, e);
                    BTreeMap::new()
                }
            },
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("Unreadable store file {:?}, starting empty: {}", path, e);
                BTreeMap::new()
            }
        };
        Store { path, values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_owned(), value);
        self.persist();
    }

    pub fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.persist();
        }
    }

    fn persist(&self) {
        if let Err(e) = self.write_out() {
            warn!("Failed to persist store file {:?}: {:#}", self.path, e);
        }
    }

    fn write_out(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Error ensuring path {:?} exists", parent))?;
        }
        let contents = serde_json::to_string(&self.values)?;
        std::fs::write(&self.path, contents)
            .with_context(||"Error writing store file")
    }
}

fn read_if_found(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(c) => Ok(Some(c)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("store.json")
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(store_path(&dir));
        store.set("username", "ana".to_owned());

        let store = Store::open(store_path(&dir));
        assert_eq!(store.get("username"), Some("ana"));
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(store_path(&dir));
        assert_eq!(store.get("username"), None);
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(store_path(&dir), "not json at all").unwrap();
        let store = Store::open(store_path(&dir));
        assert_eq!(store.get("username"), None);
    }

    #[test]
    fn remove_deletes_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(store_path(&dir));
        store.set("password", "lozinka123".to_owned());
        store.remove("password");
        assert_eq!(store.get("password"), None);

        let store = Store::open(store_path(&dir));
        assert_eq!(store.get("password"), None);
    }
}
