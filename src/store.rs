use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::Catalog;
use crate::error::AggregatorError;

/// Owns the on-disk catalog file. The catalog is only ever replaced whole;
/// the write goes through a temp file and rename so readers never observe a
/// partial document.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: Utf8PathBuf,
}

impl CatalogStore {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.as_std_path().exists()
    }

    pub fn load(&self) -> Result<Catalog, AggregatorError> {
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| AggregatorError::CatalogRead(format!("{}: {err}", self.path)))?;
        serde_json::from_str(&content)
            .map_err(|err| AggregatorError::CatalogRead(format!("{}: {err}", self.path)))
    }

    pub fn save(&self, catalog: &Catalog) -> Result<(), AggregatorError> {
        let content = Self::canonical(catalog)?;
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| AggregatorError::CatalogWrite(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("dataset-json")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| AggregatorError::CatalogWrite(err.to_string()))?;
        temp.write_all(content.as_bytes())
            .map_err(|err| AggregatorError::CatalogWrite(err.to_string()))?;
        if self.path.as_std_path().exists() {
            fs::remove_file(self.path.as_std_path())
                .map_err(|err| AggregatorError::CatalogWrite(err.to_string()))?;
        }
        temp.persist(self.path.as_std_path())
            .map_err(|err| AggregatorError::CatalogWrite(err.to_string()))?;
        Ok(())
    }

    /// The one serialization used both for persisting and for refresh
    /// comparison: 2-space indentation, key order fixed by field order.
    pub fn canonical(catalog: &Catalog) -> Result<String, AggregatorError> {
        serde_json::to_string_pretty(catalog)
            .map_err(|err| AggregatorError::CatalogWrite(err.to_string()))
    }

    /// Raw stored text, for the byte-for-byte refresh comparison.
    pub fn load_raw(&self) -> Result<String, AggregatorError> {
        fs::read_to_string(self.path.as_std_path())
            .map_err(|err| AggregatorError::CatalogRead(format!("{}: {err}", self.path)))
    }
}
