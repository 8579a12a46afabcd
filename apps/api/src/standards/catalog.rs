//! Standards catalog: the achievement standards list read from disk.
//!
//! The list is held as an immutable snapshot. Readers clone the `Arc`;
//! `refresh` re-reads the file and swaps the snapshot in one step. A failed
//! refresh leaves the previous snapshot in place.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Code reported when no standard can be matched.
pub const UNKNOWN_CODE: &str = "K-HS-?";
const UNKNOWN_DOMAIN: &str = "일반";
const UNKNOWN_DESCRIPTION: &str = "관련 성취기준을 명확히 찾을 수 없습니다.";

/// One curriculum achievement standard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardRecord {
    pub code: String,
    pub domain: String,
    #[serde(rename = "desc", alias = "description")]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl StandardRecord {
    /// The sentinel returned when neither keywords nor the LLM find a match.
    pub fn unknown() -> Self {
        Self {
            code: UNKNOWN_CODE.to_string(),
            domain: UNKNOWN_DOMAIN.to_string(),
            description: UNKNOWN_DESCRIPTION.to_string(),
            keywords: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.code == UNKNOWN_CODE
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed standards JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid standard: {0}")]
    Invalid(String),

    #[error("catalog has no backing file to refresh from")]
    NoSource,
}

/// Accepts either a bare array or `{"standards": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StandardsFile {
    Wrapped { standards: Vec<StandardRecord> },
    Bare(Vec<StandardRecord>),
}

/// Parses and validates the contents of a standards file.
pub fn parse_catalog(raw: &str) -> Result<Vec<StandardRecord>, CatalogError> {
    let standards = match serde_json::from_str::<StandardsFile>(raw)? {
        StandardsFile::Wrapped { standards } => standards,
        StandardsFile::Bare(standards) => standards,
    };

    let mut seen = HashSet::new();
    for (index, standard) in standards.iter().enumerate() {
        if standard.code.trim().is_empty() {
            return Err(CatalogError::Invalid(format!(
                "entry {index} has an empty code"
            )));
        }
        if standard.code == UNKNOWN_CODE {
            return Err(CatalogError::Invalid(format!(
                "entry {index} uses the reserved code {UNKNOWN_CODE}"
            )));
        }
        if !seen.insert(standard.code.as_str()) {
            // Keyword and code lookups both resolve to the first occurrence.
            warn!("Duplicate standard code {} in catalog", standard.code);
        }
    }

    Ok(standards)
}

fn read_catalog(path: &Path) -> Result<Vec<StandardRecord>, CatalogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&raw)
}

pub struct StandardsCatalog {
    path: Option<PathBuf>,
    standards: RwLock<Arc<Vec<StandardRecord>>>,
}

impl StandardsCatalog {
    /// Loads the catalog from a JSON file. Fails if the file is unreadable or invalid.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let standards = read_catalog(&path)?;
        info!(
            "Loaded {} achievement standards from {}",
            standards.len(),
            path.display()
        );
        Ok(Self {
            path: Some(path),
            standards: RwLock::new(Arc::new(standards)),
        })
    }

    /// Builds an in-memory catalog with no backing file.
    pub fn from_records(standards: Vec<StandardRecord>) -> Self {
        Self {
            path: None,
            standards: RwLock::new(Arc::new(standards)),
        }
    }

    /// Current immutable view of the standards list, in priority order.
    pub fn snapshot(&self) -> Arc<Vec<StandardRecord>> {
        self.standards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-reads the backing file and swaps the snapshot. Returns the new count.
    pub fn refresh(&self) -> Result<usize, CatalogError> {
        let path = self.path.as_deref().ok_or(CatalogError::NoSource)?;
        let standards = read_catalog(path)?;
        let count = standards.len();
        *self
            .standards
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(standards);
        info!("Refreshed standards catalog: {count} entries");
        Ok(count)
    }

    pub fn codes(&self) -> Vec<String> {
        self.snapshot().iter().map(|s| s.code.clone()).collect()
    }
}
