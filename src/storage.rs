use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Entry, MasterRecord, Obscured};

pub const BASE_DIR: &str = ".passterm";
pub const STORE_FILE: &str = "passwords.json";
pub const MASTER_FILE: &str = "passrc.json";
pub const CONFIG_FILE: &str = "config.json";
pub const LOG_FILE: &str = "passterm.log";
pub const DEFAULT_VIEWPORT_ROWS: usize = 11;
/// Smallest viewport that can show the title row and one entry.
pub const MIN_VIEWPORT_ROWS: usize = 2;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("store file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Obscured label -> obscured secret, enumerated in insertion/load order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Store {
    order: Vec<Obscured>,
    secrets: HashMap<Obscured, Obscured>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.to_path_buf()));
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(StoreError::Corrupt {
                    path: path.to_path_buf(),
                    source: <serde_json::Error as serde::de::Error>::custom(
                        "file is not valid UTF-8",
                    ),
                });
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let store: Store = serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        info!(entries = store.size(), path = %path.display(), "store loaded");
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let write_err = |source: io::Error| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };
        let data = to_pretty_json(self).map_err(|e| write_err(io::Error::other(e)))?;
        atomic_write(path, data.as_bytes()).map_err(write_err)?;
        restrict_file(path).map_err(write_err)?;
        debug!(entries = self.size(), path = %path.display(), "store saved");
        Ok(())
    }

    /// Insert or overwrite. An existing label keeps its position.
    pub fn insert(&mut self, label: Obscured, secret: Obscured) {
        if self.secrets.insert(label.clone(), secret).is_none() {
            self.order.push(label);
        }
    }

    pub fn remove(&mut self, label: &Obscured) -> bool {
        if self.secrets.remove(label).is_none() {
            return false;
        }
        self.order.retain(|l| l != label);
        true
    }

    pub fn find(&self, label: &Obscured) -> Option<usize> {
        self.order.iter().position(|l| l == label)
    }

    pub fn size(&self) -> usize {
        self.order.len()
    }

    pub fn get(&self, position: usize) -> Option<Entry> {
        let label = self.order.get(position)?;
        let secret = self.secrets.get(label)?;
        Some(Entry {
            label: label.clone(),
            secret: secret.clone(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Obscured, &Obscured)> + '_ {
        self.order
            .iter()
            .filter_map(|label| self.secrets.get(label).map(|secret| (label, secret)))
    }
}

impl Serialize for Store {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.size()))?;
        for (label, secret) in self.iter() {
            map.serialize_entry(label, secret)?;
        }
        map.end()
    }
}

struct StoreVisitor;

impl<'de> Visitor<'de> for StoreVisitor {
    type Value = Store;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of obscured labels to obscured secrets")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Store, A::Error> {
        let mut store = Store::new();
        while let Some((label, secret)) = access.next_entry::<Obscured, Obscured>()? {
            store.insert(label, secret);
        }
        Ok(store)
    }
}

impl<'de> Deserialize<'de> for Store {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(StoreVisitor)
    }
}

/// Four-space indented JSON, followed by a newline.
fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(<serde_json::Error as serde::ser::Error>::custom)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub store_path: Option<String>,
    #[serde(default = "default_viewport_rows")]
    pub viewport_rows: usize,
}

fn default_viewport_rows() -> usize {
    DEFAULT_VIEWPORT_ROWS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            viewport_rows: DEFAULT_VIEWPORT_ROWS,
        }
    }
}

impl Config {
    /// The store file this config points at, relative paths resolved from `base_dir`.
    pub fn resolve_store_path(&self, base_dir: &Path) -> PathBuf {
        match &self.store_path {
            Some(raw) if Path::new(raw).is_absolute() => PathBuf::from(raw),
            Some(raw) => base_dir.join(raw),
            None => base_dir.join(STORE_FILE),
        }
    }
}

pub fn default_base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(BASE_DIR))
}

pub fn load_config(base_dir: &Path) -> Result<Config> {
    let path = base_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let mut cfg: Config = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    if cfg.viewport_rows == 0 {
        cfg.viewport_rows = DEFAULT_VIEWPORT_ROWS;
    }
    cfg.viewport_rows = cfg.viewport_rows.max(MIN_VIEWPORT_ROWS);
    Ok(cfg)
}

pub fn ensure_base_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    restrict_dir(dir)?;
    Ok(())
}

pub fn load_master(path: &Path) -> Result<Option<Obscured>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let record: MasterRecord = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(record.master))
}

pub fn save_master(path: &Path, master: Obscured) -> Result<()> {
    let data = to_pretty_json(&MasterRecord { master })?;
    atomic_write(path, data.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    restrict_file(path)?;
    Ok(())
}

fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent)?;
    }

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn restrict_file(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
    }
    Ok(())
}

fn restrict_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SessionKey;

    fn key() -> SessionKey {
        SessionKey::new(42).unwrap()
    }

    fn ob(text: &str) -> Obscured {
        Obscured::seal(text, &key())
    }

    fn sample() -> Store {
        let mut store = Store::new();
        store.insert(ob("github"), ob("gh-secret"));
        store.insert(ob("mail"), ob("m41l"));
        store.insert(ob("bank"), ob("1234"));
        store
    }

    #[test]
    fn insert_new_label_grows_size() {
        let mut store = sample();
        store.insert(ob("shop"), ob("pw"));
        assert_eq!(store.size(), 4);
        assert_eq!(store.find(&ob("shop")), Some(3));
    }

    #[test]
    fn insert_existing_label_overwrites_in_place() {
        let mut store = sample();
        store.insert(ob("mail"), ob("new"));
        assert_eq!(store.size(), 3);
        assert_eq!(store.find(&ob("mail")), Some(1));
        assert_eq!(store.get(1).unwrap().secret.open(&key()), "new");
    }

    #[test]
    fn remove_reports_whether_anything_went() {
        let mut store = sample();
        assert!(!store.remove(&ob("nope")));
        assert_eq!(store.size(), 3);
        assert!(store.remove(&ob("github")));
        assert_eq!(store.size(), 2);
        assert_eq!(store.find(&ob("mail")), Some(0));
        assert_eq!(store.find(&ob("github")), None);
    }

    #[test]
    fn reinsert_after_remove_appends() {
        let mut store = sample();
        store.remove(&ob("github"));
        store.insert(ob("github"), ob("again"));
        assert_eq!(store.find(&ob("github")), Some(2));
    }

    #[test]
    fn get_out_of_range_is_none() {
        assert!(sample().get(3).is_none());
        assert!(Store::new().get(0).is_none());
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Store::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn load_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Store::load(&path), Err(StoreError::Corrupt { .. })));

        fs::write(&path, "[\"a\", \"b\"]").unwrap();
        assert!(matches!(Store::load(&path), Err(StoreError::Corrupt { .. })));

        fs::write(&path, "{\"a\": 3}").unwrap();
        assert!(matches!(Store::load(&path), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn save_then_load_keeps_order_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STORE_FILE);
        let store = sample();
        store.save(&path).unwrap();

        let loaded = Store::load(&path).unwrap();
        assert_eq!(loaded, store);
        let labels: Vec<String> = loaded.iter().map(|(l, _)| l.open(&key())).collect();
        assert_eq!(labels, ["github", "mail", "bank"]);
    }

    #[test]
    fn load_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STORE_FILE);
        fs::write(&path, "{\"zeta\": \"1\", \"alpha\": \"2\", \"mid\": \"3\"}").unwrap();
        let store = Store::load(&path).unwrap();
        let labels: Vec<&[u8]> = store.iter().map(|(l, _)| l.as_bytes()).collect();
        assert_eq!(labels, [&b"zeta"[..], b"alpha", b"mid"]);
    }

    #[test]
    fn saved_file_is_pretty_and_obscured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STORE_FILE);
        sample().save(&path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("{\n    \""));
        assert!(raw.ends_with("}\n"));
        assert!(!raw.contains("github"));
        assert!(!raw.contains("gh-secret"));
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STORE_FILE);
        sample().save(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn save_below_a_plain_file_fails_with_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = sample().save(&blocker.join("store.json")).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
    }

    #[test]
    fn config_defaults_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(dir.path()).unwrap(), Config::default());

        fs::write(
            dir.path().join(CONFIG_FILE),
            "{\"store_path\": \"other.json\", \"viewport_rows\": 5}",
        )
        .unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.viewport_rows, 5);
        assert_eq!(cfg.resolve_store_path(dir.path()), dir.path().join("other.json"));
    }

    #[test]
    fn tiny_viewport_is_raised() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{\"viewport_rows\": 1}").unwrap();
        assert_eq!(load_config(dir.path()).unwrap().viewport_rows, MIN_VIEWPORT_ROWS);
        fs::write(&path, "{\"viewport_rows\": 0}").unwrap();
        assert_eq!(load_config(dir.path()).unwrap().viewport_rows, DEFAULT_VIEWPORT_ROWS);
    }

    #[test]
    fn master_record_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MASTER_FILE);
        assert!(load_master(&path).unwrap().is_none());
        save_master(&path, ob("letmein")).unwrap();
        assert_eq!(load_master(&path).unwrap().unwrap().open(&key()), "letmein");
    }
}
