//! Raster identities and their resolution to files.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// RasterId
// =============================================================================

/// Opaque raster identity: an integer or a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RasterId {
    Int(i64),
    Name(String),
}

impl fmt::Display for RasterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterId::Int(id) => write!(f, "{id}"),
            RasterId::Name(name) => f.write_str(name),
        }
    }
}

impl FromStr for RasterId {
    type Err = std::convert::Infallible;

    /// Integers take precedence: `"42"` parses as `Int(42)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map(RasterId::Int)
            .unwrap_or_else(|_| RasterId::Name(s.to_string())))
    }
}

impl From<i64> for RasterId {
    fn from(id: i64) -> Self {
        RasterId::Int(id)
    }
}

impl From<&str> for RasterId {
    fn from(name: &str) -> Self {
        RasterId::Name(name.to_string())
    }
}

impl From<String> for RasterId {
    fn from(name: String) -> Self {
        RasterId::Name(name)
    }
}

// =============================================================================
// RasterLocator Trait
// =============================================================================

/// Resolves raster identities to dataset paths.
///
/// The returned path need not exist; the engine treats a missing file the
/// same as an unknown identity.
#[async_trait]
pub trait RasterLocator: Send + Sync {
    /// Look up the dataset path for `raster_id`.
    ///
    /// # Returns
    /// `Ok(None)` when the identity is unknown, `Err` when the lookup itself
    /// failed.
    async fn resolve_path(&self, raster_id: &RasterId) -> Result<Option<PathBuf>, String>;
}

// =============================================================================
// DirectoryLocator
// =============================================================================

/// Resolves identities to files under a root directory.
///
/// `<root>/<id>` is tried first, then `<root>/<id>.tif`.
#[derive(Debug, Clone)]
pub struct DirectoryLocator {
    root: PathBuf,
}

impl DirectoryLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl RasterLocator for DirectoryLocator {
    async fn resolve_path(&self, raster_id: &RasterId) -> Result<Option<PathBuf>, String> {
        let name = raster_id.to_string();
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Ok(None);
        }

        let exact = self.root.join(&name);
        if tokio::fs::try_exists(&exact).await.unwrap_or(false) {
            return Ok(Some(exact));
        }

        Ok(Some(self.root.join(format!("{name}.tif"))))
    }
}

// =============================================================================
// StaticLocator
// =============================================================================

/// A fixed identity → path table.
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    paths: HashMap<RasterId, PathBuf>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing any previous path for `raster_id`.
    pub fn with(mut self, raster_id: impl Into<RasterId>, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(raster_id.into(), path.into());
        self
    }

    pub fn insert(&mut self, raster_id: impl Into<RasterId>, path: impl Into<PathBuf>) {
        self.paths.insert(raster_id.into(), path.into());
    }
}

#[async_trait]
impl RasterLocator for StaticLocator {
    async fn resolve_path(&self, raster_id: &RasterId) -> Result<Option<PathBuf>, String> {
        Ok(self.paths.get(raster_id).cloned())
    }
}
