//! Column visibility state and its persistence.
//!
//! The state is stored as a JSON object (`{"department": false, ...}`) under
//! a single key of a [`KeyValueStore`]. Persistence never fails the caller:
//! read and write problems are logged and the in-memory state stays
//! authoritative.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, trace, warn};

use crate::domain::StoreError;
use crate::schema::Field;

pub const VISIBILITY_KEY: &str = "datatable-column-visibility";

/// Per-field visibility. Fields without an entry are visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnVisibility {
    fields: BTreeMap<Field, bool>,
}

impl Default for ColumnVisibility {
    fn default() -> Self {
        Self {
            fields: BTreeMap::from([(Field::Department, false), (Field::Location, false)]),
        }
    }
}

impl ColumnVisibility {
    /// Every field visible.
    pub fn all_visible() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    pub fn is_visible(&self, field: Field) -> bool {
        self.fields.get(&field).copied().unwrap_or(true)
    }

    pub fn set(&mut self, field: Field, visible: bool) {
        self.fields.insert(field, visible);
    }

    /// Visible fields in schema order.
    pub fn visible_fields(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .filter(|&&f| self.is_visible(f))
            .copied()
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }

    /// Parse the stored layout. Keys that are not schema fields are ignored.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let map: BTreeMap<String, bool> = serde_json::from_str(json)?;
        let mut fields = BTreeMap::new();
        for (name, visible) in map {
            match name.parse::<Field>() {
                Ok(field) => {
                    fields.insert(field, visible);
                }
                Err(e) => debug!("Ignoring stored visibility entry: {e}"),
            }
        }
        Ok(Self { fields })
    }
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// A JSON file holding `key -> string` entries, the local stand-in for
/// browser storage.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_entries(&self) -> Result<HashMap<String, String>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(StoreError::Read(format!("{}: {e}", self.path.display()))),
        };
        serde_json::from_str(&contents)
            .map_err(|e| StoreError::Read(format!("{}: {e}", self.path.display())))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        // A corrupt file is replaced rather than blocking every later save.
        let mut entries = self.read_entries().unwrap_or_else(|e| {
            warn!("Discarding unreadable store: {e}");
            HashMap::new()
        });
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::Write(e.to_string()))?;
        }
        let contents =
            serde_json::to_string_pretty(&entries).map_err(|e| StoreError::Write(e.to_string()))?;
        fs::write(&self.path, contents)
            .map_err(|e| StoreError::Write(format!("{}: {e}", self.path.display())))
    }
}

/// Keeps entries for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Read("storage disabled".into()));
        }
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write("quota exceeded".into()));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub struct VisibilityPersistence {
    store: Box<dyn KeyValueStore>,
}

impl VisibilityPersistence {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored visibility, or `None` when nothing usable is stored.
    pub fn load(&self) -> Option<ColumnVisibility> {
        let raw = match self.store.get(VISIBILITY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                trace!("No stored column visibility");
                return None;
            }
            Err(e) => {
                warn!("Failed to read column visibility: {e}");
                return None;
            }
        };
        match ColumnVisibility::from_json(&raw) {
            Ok(visibility) => {
                debug!("Loaded column visibility {raw}");
                Some(visibility)
            }
            Err(e) => {
                warn!("Failed to parse column visibility from store: {e}");
                None
            }
        }
    }

    pub fn save(&mut self, visibility: &ColumnVisibility) {
        let json = match visibility.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize column visibility: {e}");
                return;
            }
        };
        match self.store.set(VISIBILITY_KEY, &json) {
            Ok(()) => trace!("Saved column visibility {json}"),
            Err(e) => warn!("Failed to save column visibility: {e}"),
        }
    }
}
