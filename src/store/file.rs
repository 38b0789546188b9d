//! File-backed medium
//!
//! One JSON object per origin file, `{ "key": "value", ... }`. Every write goes
//! to a fresh temp file in the same directory which is then renamed over the
//! original, so a reader in another process never sees a truncated file.
//! Concurrent writers resolve last-write-wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::KeyValueMedium;
use crate::config::StorageConfig;
use crate::Result;

#[derive(Debug, Clone)]
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.file_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents; a missing or unparseable file reads as empty
    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Storage file is not a JSON object, treating as empty"
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        // each write gets its own temp file so concurrent writers never share one
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl KeyValueMedium for FileMedium {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_entries(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let medium = FileMedium::new(dir.path().join("origin.json"));
        assert_eq!(medium.get("k").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("origin.json");

        FileMedium::new(&path).set("k", "v").unwrap();
        FileMedium::new(&path).set("other", "w").unwrap();

        let reopened = FileMedium::new(&path);
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(reopened.get("other").unwrap().as_deref(), Some("w"));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("origin.json")]);
    }

    #[test]
    fn test_remove_keeps_other_keys() {
        let dir = TempDir::new().unwrap();
        let medium = FileMedium::new(dir.path().join("origin.json"));
        medium.set("a", "1").unwrap();
        medium.set("b", "2").unwrap();

        medium.remove("a").unwrap();
        assert_eq!(medium.get("a").unwrap(), None);
        assert_eq!(medium.get("b").unwrap().as_deref(), Some("2"));

        // removing an absent key is fine
        medium.remove("a").unwrap();
    }

    #[test]
    fn test_garbage_file_reads_empty_and_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("origin.json");
        std::fs::write(&path, "garbage").unwrap();

        let medium = FileMedium::new(&path);
        assert_eq!(medium.get("k").unwrap(), None);

        medium.set("k", "v").unwrap();
        assert_eq!(medium.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_concurrent_writers_all_succeed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("origin.json");

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let medium = FileMedium::new(&path);
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|i| medium.set("k", &format!("{writer}-{i}")).is_err())
                        .count()
                })
            })
            .collect();
        let failed: usize = writers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(failed, 0);

        // whatever won, the file is a complete object
        let value = FileMedium::new(&path).get("k").unwrap().unwrap();
        assert!(value.ends_with("-99"));
    }
}
