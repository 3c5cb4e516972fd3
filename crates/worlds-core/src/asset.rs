//! Asset identifiers and the asset database.
//!
//! Every asset is addressed by an [`AssetId`], a 32-bit FNV-1a hash of its
//! path. The hash includes one trailing zero byte so ids match the ones the
//! engine's tooling writes into asset files.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Identifier of an asset, derived from its path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u32);

impl AssetId {
    /// Hash an asset path into an id.
    ///
    /// Backslashes are treated as forward slashes so the same file gets the
    /// same id regardless of how the path was authored.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let mut hash = FNV_OFFSET_BASIS;
        for byte in path.bytes().map(normalize_separator).chain(std::iter::once(0)) {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        Self(hash)
    }

    /// Raw hash value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

const fn normalize_separator(byte: u8) -> u8 {
    if byte == b'\\' {
        b'/'
    } else {
        byte
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

#[derive(Default)]
struct AssetTables {
    paths: HashMap<AssetId, String>,
    extensions: HashMap<AssetId, String>,
    /// Assets registered from memory rather than disk.
    memory: HashMap<AssetId, Arc<[u8]>>,
}

/// Registry mapping asset ids to paths and asset bytes.
///
/// Files are resolved relative to an optional root directory. Assets can also
/// be mounted from memory, which take precedence over files on disk.
///
/// Provides thread-safe access via `RwLock`.
pub struct AssetDb {
    root: Option<PathBuf>,
    tables: RwLock<AssetTables>,
}

impl AssetDb {
    /// Create a database resolving files relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            tables: RwLock::new(AssetTables::default()),
        }
    }

    /// Create a database with no backing directory.
    ///
    /// Only assets added through [`AssetDb::insert_bytes`] can be read.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            root: None,
            tables: RwLock::new(AssetTables::default()),
        }
    }

    /// Root directory, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Register a path and return its id, or the existing id if already known.
    pub fn add_or_get_existing(&self, path: &str) -> AssetId {
        let id = AssetId::from_path(path);
        if self.tables.read().paths.contains_key(&id) {
            return id;
        }

        let path = normalize_path(path);
        let extension = Path::new(&path)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let mut tables = self.tables.write();
        if !tables.paths.contains_key(&id) {
            trace!(%id, path = %path, "registered asset");
            tables.extensions.insert(id, extension);
            tables.paths.insert(id, path);
        }
        id
    }

    /// Register an in-memory asset under `path`.
    pub fn insert_bytes(&self, path: &str, bytes: impl Into<Arc<[u8]>>) -> AssetId {
        let id = self.add_or_get_existing(path);
        self.tables.write().memory.insert(id, bytes.into());
        id
    }

    /// Whether the id has been registered.
    pub fn exists(&self, id: AssetId) -> bool {
        self.tables.read().paths.contains_key(&id)
    }

    /// Path the id was registered with.
    pub fn path(&self, id: AssetId) -> Option<String> {
        self.tables.read().paths.get(&id).cloned()
    }

    /// File extension (including the leading dot) of the registered path.
    pub fn extension(&self, id: AssetId) -> Option<String> {
        self.tables.read().extensions.get(&id).cloned()
    }

    /// Number of registered assets.
    pub fn len(&self) -> usize {
        self.tables.read().paths.len()
    }

    /// Check if no assets are registered.
    pub fn is_empty(&self) -> bool {
        self.tables.read().paths.is_empty()
    }

    /// Whether bytes can currently be read for this id.
    pub fn is_available(&self, id: AssetId) -> bool {
        let tables = self.tables.read();
        if tables.memory.contains_key(&id) {
            return true;
        }
        match (&self.root, tables.paths.get(&id)) {
            (Some(root), Some(path)) => root.join(path).is_file(),
            _ => false,
        }
    }

    /// Read the full contents of an asset.
    pub fn read(&self, id: AssetId) -> Result<Arc<[u8]>> {
        let path = {
            let tables = self.tables.read();
            if let Some(bytes) = tables.memory.get(&id) {
                return Ok(Arc::clone(bytes));
            }
            tables.paths.get(&id).cloned().ok_or(Error::UnknownAsset(id))?
        };

        let Some(root) = &self.root else {
            return Err(Error::AssetNotFound(path));
        };

        match std::fs::read(root.join(&path)) {
            Ok(bytes) => Ok(bytes.into()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::AssetNotFound(path))
            }
            Err(err) => Err(Error::Io(err)),
        }
    }
}

impl fmt::Debug for AssetDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetDb")
            .field("root", &self.root)
            .field("assets", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv_hash_includes_terminator() {
        // Empty path hashes the single zero byte
        assert_eq!(AssetId::from_path("").raw(), 0x050c_5d1f);
        assert_eq!(AssetId::from_path("a").raw(), 0x2b24_d044);
        assert_eq!(AssetId::from_path("Textures/missing.png").raw(), 0x5a08_9039);
    }

    #[test]
    fn backslashes_hash_like_slashes() {
        assert_eq!(
            AssetId::from_path("Textures\\rock.png"),
            AssetId::from_path("Textures/rock.png")
        );
    }

    #[test]
    fn add_or_get_existing_is_stable() {
        let db = AssetDb::in_memory();
        let a = db.add_or_get_existing("Materials/rock.json");
        let b = db.add_or_get_existing("Materials/rock.json");

        assert_eq!(a, b);
        assert_eq!(db.len(), 1);
        assert_eq!(db.path(a).as_deref(), Some("Materials/rock.json"));
        assert_eq!(db.extension(a).as_deref(), Some(".json"));
    }

    #[test]
    fn memory_assets_are_readable() {
        let db = AssetDb::in_memory();
        let id = db.insert_bytes("Cubemaps/sky.json", b"[]".to_vec());

        assert!(db.is_available(id));
        assert_eq!(&*db.read(id).unwrap(), b"[]");
    }

    #[test]
    fn unknown_and_missing_assets_are_not_found() {
        let db = AssetDb::in_memory();
        let unknown = db.read(AssetId(7)).unwrap_err();
        assert!(unknown.is_not_found());

        let registered = db.add_or_get_existing("Textures/none.png");
        let missing = db.read(registered).unwrap_err();
        assert!(missing.is_not_found());
        assert!(!db.is_available(registered));
    }

    #[test]
    fn reads_files_under_root() {
        let root = std::env::temp_dir().join(format!("worlds-assetdb-{}", std::process::id()));
        std::fs::create_dir_all(root.join("Textures")).unwrap();
        std::fs::write(root.join("Textures/a.bin"), [1u8, 2, 3]).unwrap();

        let db = AssetDb::new(&root);
        let id = db.add_or_get_existing("Textures/a.bin");
        assert_eq!(&*db.read(id).unwrap(), &[1, 2, 3]);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
