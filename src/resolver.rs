//! Resolution of opaque input-sequence identifiers to local files.
//!
//! A resolver is handed to [`crate::ProjectManifest::with_resolver`] and is
//! only consulted when a project lists `inputSequenceIDs`.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Unknown sequence identifier '{0}'")]
    Unknown(String),

    #[error("Sequence identifier '{0}' is not a plain file name")]
    InvalidIdentifier(String),

    #[error("Could not materialize sequence '{id}' at '{}': {source}", .path.display())]
    Io {
        id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resolved path '{}' is not valid UTF-8", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Could not load resolver config '{path}': {message}")]
    Config { path: String, message: String },
}

pub trait SequenceResolver {
    /// Returns a locally readable path for `id`.
    fn resolve(&self, id: &str) -> Result<PathBuf, ResolveError>;
}

impl<F> SequenceResolver for F
where
    F: Fn(&str) -> Result<PathBuf, ResolveError>,
{
    fn resolve(&self, id: &str) -> Result<PathBuf, ResolveError> {
        self(id)
    }
}

/// Fixed identifier table, for projects whose sequences were registered up
/// front.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<String, PathBuf>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, path: impl Into<PathBuf>) {
        self.entries.insert(id.to_string(), path.into());
    }
}

impl<S: Into<String>, P: Into<PathBuf>> FromIterator<(S, P)> for StaticResolver {
    fn from_iter<T: IntoIterator<Item = (S, P)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(id, path)| (id.into(), path.into()))
                .collect(),
        }
    }
}

impl SequenceResolver for StaticResolver {
    fn resolve(&self, id: &str) -> Result<PathBuf, ResolveError> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| ResolveError::Unknown(id.to_string()))
    }
}

/// Content store laid out as one file per identifier under `store_dir`.
/// Resolving copies the file into `cache_dir` once and reuses that copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStoreResolver {
    pub store_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl FileStoreResolver {
    pub fn new(store_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Reads `{"store_dir": ..., "cache_dir": ...}`; relative directories are
    /// taken relative to the JSON file.
    pub fn from_json_file(path: &str) -> Result<Self, ResolveError> {
        let text = fs::read_to_string(path).map_err(|e| ResolveError::Config {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        let mut ret: Self = serde_json::from_str(&text).map_err(|e| ResolveError::Config {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        let base = Path::new(path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if ret.store_dir.is_relative() {
            ret.store_dir = base.join(&ret.store_dir);
        }
        if ret.cache_dir.is_relative() {
            ret.cache_dir = base.join(&ret.cache_dir);
        }
        Ok(ret)
    }

    fn materialize(
        &self,
        id: &str,
        source: &Path,
        destination: &Path,
    ) -> Result<(), ResolveError> {
        let io_err = |path: &Path, source: std::io::Error| ResolveError::Io {
            id: id.to_string(),
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(&self.cache_dir).map_err(|e| io_err(self.cache_dir.as_path(), e))?;
        let mut tmp_os: OsString = destination.as_os_str().to_os_string();
        tmp_os.push(".part");
        let tmp_path = PathBuf::from(tmp_os);
        if let Err(e) = fs::copy(source, &tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_err(tmp_path.as_path(), e));
        }
        fs::rename(&tmp_path, destination).map_err(|e| io_err(destination, e))
    }
}

impl SequenceResolver for FileStoreResolver {
    fn resolve(&self, id: &str) -> Result<PathBuf, ResolveError> {
        if !is_plain_identifier(id) {
            return Err(ResolveError::InvalidIdentifier(id.to_string()));
        }
        let destination = self.cache_dir.join(id);
        if destination.is_file() {
            debug!("Reusing cached sequence '{id}' at {}", destination.display());
            return Ok(destination);
        }
        let source = self.store_dir.join(id);
        if !source.is_file() {
            return Err(ResolveError::Unknown(id.to_string()));
        }
        self.materialize(id, &source, &destination)?;
        debug!("Materialized sequence '{id}' at {}", destination.display());
        Ok(destination)
    }
}

fn is_plain_identifier(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !id.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_static_resolver() {
        let resolver: StaticResolver =
            [("i1", "/data/p1.fa"), ("i2", "/data/p2.fa")].into_iter().collect();
        assert_eq!(resolver.resolve("i2").unwrap(), PathBuf::from("/data/p2.fa"));
        assert!(matches!(
            resolver.resolve("i3"),
            Err(ResolveError::Unknown(id)) if id == "i3"
        ));
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |id: &str| -> Result<PathBuf, ResolveError> {
            Ok(PathBuf::from(format!("/cache/{id}.fa")))
        };
        assert_eq!(resolver.resolve("x").unwrap(), PathBuf::from("/cache/x.fa"));
    }

    #[test]
    fn test_file_store_resolver_copies_once() {
        let td = tempdir().unwrap();
        let store = td.path().join("store");
        fs::create_dir_all(&store).unwrap();
        fs::write(store.join("seq-1"), ">a\nACGT\n").unwrap();

        let resolver = FileStoreResolver::new(&store, td.path().join("cache"));
        let first = resolver.resolve("seq-1").unwrap();
        assert_eq!(first, td.path().join("cache").join("seq-1"));
        assert_eq!(fs::read_to_string(&first).unwrap(), ">a\nACGT\n");

        // the cached copy wins over later store changes
        fs::write(store.join("seq-1"), ">a\nTTTT\n").unwrap();
        let second = resolver.resolve("seq-1").unwrap();
        assert_eq!(fs::read_to_string(second).unwrap(), ">a\nACGT\n");
    }

    #[test]
    fn test_file_store_resolver_rejects_bad_identifiers() {
        let td = tempdir().unwrap();
        let resolver = FileStoreResolver::new(td.path(), td.path().join("cache"));
        for id in ["", "..", "../etc/passwd", "a/b", "a b"] {
            assert!(
                matches!(resolver.resolve(id), Err(ResolveError::InvalidIdentifier(_))),
                "identifier {id:?} should be rejected"
            );
        }
        assert!(matches!(
            resolver.resolve("missing"),
            Err(ResolveError::Unknown(_))
        ));
    }

    #[test]
    fn test_file_store_resolver_from_json_file() {
        let td = tempdir().unwrap();
        let config_path = td.path().join("resolver.json");
        fs::write(
            &config_path,
            r#"{ "store_dir": "store", "cache_dir": "/tmp/cactus-cache" }"#,
        )
        .unwrap();
        let resolver = FileStoreResolver::from_json_file(&config_path.to_string_lossy()).unwrap();
        assert_eq!(resolver.store_dir, td.path().join("store"));
        assert_eq!(resolver.cache_dir, PathBuf::from("/tmp/cactus-cache"));

        fs::write(&config_path, "{").unwrap();
        let err = FileStoreResolver::from_json_file(&config_path.to_string_lossy()).unwrap_err();
        assert!(matches!(err, ResolveError::Config { .. }));
    }
}
