//! Local-filesystem existence checks for derived artifacts.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{PurgeError, PurgeResult};
use crate::invalidation::split_expression;

/// Maps storage schemes onto local directories.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    roots: BTreeMap<String, PathBuf>,
}

impl LocalStorage {
    pub fn new(roots: BTreeMap<String, PathBuf>) -> Self {
        Self { roots }
    }

    /// Resolve a storage URI to a local path.
    pub fn resolve(&self, uri: &str) -> PurgeResult<PathBuf> {
        let (scheme, target) = split_expression(uri).ok_or_else(|| storage_error(
            uri,
            "not a scheme://target URI".to_string(),
        ))?;
        let root = self
            .roots
            .get(scheme)
            .ok_or_else(|| storage_error(uri, format!("no storage root for scheme {:?}", scheme)))?;

        let relative = Path::new(target.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(storage_error(uri, "path escapes storage root".to_string()));
        }
        Ok(root.join(relative))
    }

    /// Whether the artifact behind `uri` exists on disk.
    pub fn exists(&self, uri: &str) -> PurgeResult<bool> {
        let path = self.resolve(uri)?;
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error(
                uri,
                format!("failed to stat {}: {}", path.display(), e),
            )),
        }
    }
}

fn storage_error(uri: &str, message: String) -> PurgeError {
    PurgeError::Expansion {
        rule: "storage".to_string(),
        message: format!("{}: {}", uri, message),
    }
}
