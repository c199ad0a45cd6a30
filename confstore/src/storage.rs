//! Whole-document persistence for the settings tree
//!
//! The store only ever reads the complete document once at startup and
//! overwrites the complete document on flush. [`DocumentStorage`] is the
//! seam for that; [`JsonFileStorage`] keeps the document in a JSON file and
//! [`MemoryStorage`] keeps it in memory.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use confstore_utils::{ensure_parent, Result, StoreError};

use crate::value::ConfigTree;

/// Indentation used when writing the document back
const PRETTY_INDENT: &[u8] = b"    ";

/// Backing storage holding the settings document
pub trait DocumentStorage: Send + Sync {
    /// Where the document lives (used in logs and errors)
    fn location(&self) -> &Path;

    /// Read the whole document, or `None` if it does not exist yet
    fn read(&self) -> Result<Option<ConfigTree>>;

    /// Create the document with its initial contents
    fn create(&self, tree: &ConfigTree) -> Result<()>;

    /// Overwrite the whole document, returning the number of bytes written
    fn write(&self, tree: &ConfigTree) -> Result<usize>;
}

/// Settings document stored as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse a document, requiring an object at the top level
    pub fn parse(content: &str, path: &Path) -> Result<ConfigTree> {
        let value: Value = serde_json::from_str(content).map_err(|e| StoreError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        match value {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::ConfigInvalid {
                path: path.to_path_buf(),
                message: format!("top-level value must be an object, found {}", kind_of(&other)),
            }),
        }
    }

    /// Render a tree with four-space indentation; non-ASCII is kept literal
    pub fn render_pretty(tree: &ConfigTree) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(PRETTY_INDENT);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        tree.serialize(&mut ser)
            .map_err(|e| StoreError::serialize(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| StoreError::serialize(e.to_string()))
    }

    /// Temporary file the document is written to before being renamed over
    /// the target: `.config.json.tmp` next to `config.json`
    pub fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config.json".to_string());
        self.path.with_file_name(format!(".{}.tmp", file_name))
    }

    /// Write atomically: write to temp file, then rename
    ///
    /// A failed write leaves the previous document untouched.
    fn write_file(&self, content: &str) -> Result<()> {
        ensure_parent(&self.path).map_err(|e| StoreError::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;

        let temp_path = self.temp_path();
        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            drop(file);
            std::fs::rename(&temp_path, &self.path)
        })();

        result.map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            StoreError::FileWrite {
                path: self.path.clone(),
                source: e,
            }
        })
    }
}

impl DocumentStorage for JsonFileStorage {
    fn location(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<ConfigTree>> {
        if !self.path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| StoreError::FileRead {
            path: self.path.clone(),
            source: e,
        })?;

        Self::parse(&content, &self.path).map(Some)
    }

    fn create(&self, tree: &ConfigTree) -> Result<()> {
        let content =
            serde_json::to_string(tree).map_err(|e| StoreError::serialize(e.to_string()))?;
        self.write_file(&content)
    }

    fn write(&self, tree: &ConfigTree) -> Result<usize> {
        let content = Self::render_pretty(tree)?;
        self.write_file(&content)?;
        Ok(content.len())
    }
}

/// In-memory document, for embedding without a file and for tests
#[derive(Debug, Default)]
pub struct MemoryStorage {
    location: PathBuf,
    document: Mutex<Option<ConfigTree>>,
    creates: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    /// Create an empty storage (no document yet)
    pub fn new() -> Self {
        Self {
            location: PathBuf::from("memory://config.json"),
            ..Self::default()
        }
    }

    /// Create a storage that already holds a document
    pub fn with_document(tree: ConfigTree) -> Self {
        let storage = Self::new();
        *storage.document.lock() = Some(tree);
        storage
    }

    /// Current document contents
    pub fn document(&self) -> Option<ConfigTree> {
        self.document.lock().clone()
    }

    /// Number of times the initial document was created
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of whole-document writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail with an I/O error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl DocumentStorage for MemoryStorage {
    fn location(&self) -> &Path {
        &self.location
    }

    fn read(&self) -> Result<Option<ConfigTree>> {
        Ok(self.document())
    }

    fn create(&self, tree: &ConfigTree) -> Result<()> {
        *self.document.lock() = Some(tree.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write(&self, tree: &ConfigTree) -> Result<usize> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::FileWrite {
                path: self.location.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure"),
            });
        }

        let bytes = JsonFileStorage::render_pretty(tree)?.len();
        *self.document.lock() = Some(tree.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(bytes)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample() -> ConfigTree {
        match json!({"language": "zh-CN", "window": {"width": 1037}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    // ==================== Read Tests ====================

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("config.json"));
        assert!(storage.read().unwrap().is_none());
    }

    #[test]
    fn test_read_existing_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"theme": "dark", "window": {"x": 1}}"#).unwrap();

        let tree = JsonFileStorage::new(&path).read().unwrap().unwrap();
        assert_eq!(tree.get("theme"), Some(&json!("dark")));
        assert_eq!(tree.get("window"), Some(&json!({"x": 1})));
    }

    #[test]
    fn test_read_malformed_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStorage::new(&path).read().unwrap_err();
        assert!(matches!(err, StoreError::ConfigInvalid { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = JsonFileStorage::parse("[1, 2]", Path::new("config.json")).unwrap_err();
        match err {
            StoreError::ConfigInvalid { message, .. } => {
                assert!(message.contains("an array"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // ==================== Create Tests ====================

    #[test]
    fn test_create_writes_compact_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let storage = JsonFileStorage::new(&path);

        storage.create(&sample()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains('\n'));
        assert_eq!(storage.read().unwrap().unwrap(), sample());
    }

    // ==================== Write Tests ====================

    #[test]
    fn test_write_pretty_four_space_indent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let storage = JsonFileStorage::new(&path);

        let written = storage.write(&sample()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, content.len());
        assert_eq!(
            content,
            "{\n    \"language\": \"zh-CN\",\n    \"window\": {\n        \"width\": 1037\n    }\n}"
        );
    }

    #[test]
    fn test_write_keeps_non_ascii_literal() {
        let mut tree = ConfigTree::new();
        tree.insert("title".into(), json!("边缘优化"));

        let rendered = JsonFileStorage::render_pretty(&tree).unwrap();
        assert!(rendered.contains("边缘优化"));
        assert!(!rendered.contains("\\u"));
    }

    #[test]
    fn test_write_overwrites_whole_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"stale": true, "theme": "light"}"#).unwrap();
        let storage = JsonFileStorage::new(&path);

        let mut tree = ConfigTree::new();
        tree.insert("theme".into(), json!("dark"));
        storage.write(&tree).unwrap();

        let reread = storage.read().unwrap().unwrap();
        assert_eq!(reread, tree);
    }

    #[test]
    fn test_write_into_missing_directory_fails_gracefully() {
        let dir = tempdir().unwrap();
        // A regular file where the parent directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let storage = JsonFileStorage::new(blocker.join("config.json"));

        let err = storage.write(&sample()).unwrap_err();
        assert!(matches!(err, StoreError::FileWrite { .. }));
    }

    #[test]
    fn test_location() {
        let storage = JsonFileStorage::new("/etc/confstore/config.json");
        assert_eq!(storage.location(), Path::new("/etc/confstore/config.json"));
    }

    // ==================== MemoryStorage Tests ====================

    #[test]
    fn test_memory_storage_counts() {
        let storage = MemoryStorage::new();
        assert!(storage.read().unwrap().is_none());

        storage.create(&sample()).unwrap();
        storage.write(&sample()).unwrap();
        storage.write(&sample()).unwrap();

        assert_eq!(storage.create_count(), 1);
        assert_eq!(storage.write_count(), 2);
        assert_eq!(storage.document(), Some(sample()));
    }

    #[test]
    fn test_memory_storage_failing_writes() {
        let storage = MemoryStorage::with_document(ConfigTree::new());
        storage.set_fail_writes(true);

        let err = storage.write(&sample()).unwrap_err();
        assert!(matches!(err, StoreError::FileWrite { .. }));
        assert_eq!(storage.write_count(), 0);
        assert_eq!(storage.document(), Some(ConfigTree::new()));

        storage.set_fail_writes(false);
        storage.write(&sample()).unwrap();
        assert_eq!(storage.write_count(), 1);
    }

    // ==================== Atomic Write Tests ====================

    #[test]
    fn test_temp_path_next_to_target() {
        let storage = JsonFileStorage::new("/srv/app/config.json");
        assert_eq!(storage.temp_path(), PathBuf::from("/srv/app/.config.json.tmp"));
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("config.json"));

        storage.create(&sample()).unwrap();
        storage.write(&sample()).unwrap();

        assert!(!storage.temp_path().exists());
    }

    #[test]
    fn test_failed_write_keeps_previous_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"theme":"dark"}"#).unwrap();
        let storage = JsonFileStorage::new(&path);

        // A directory in the temp file's place makes the write fail
        std::fs::create_dir(storage.temp_path()).unwrap();

        let mut tree = ConfigTree::new();
        tree.insert("theme".into(), json!("x".repeat(20_000)));
        let err = storage.write(&tree).unwrap_err();
        assert!(matches!(err, StoreError::FileWrite { .. }));

        let reread = storage.read().unwrap().unwrap();
        assert_eq!(reread.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn test_failed_create_leaves_no_document() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("config.json"));
        std::fs::create_dir(storage.temp_path()).unwrap();

        assert!(storage.create(&sample()).is_err());
        assert!(storage.read().unwrap().is_none());
    }
}
