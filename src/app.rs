use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::archive::{self, ArchiveClient};
use crate::domain::{Catalog, DatasetCode, NORMALIZED_CSV_SUFFIX};
use crate::error::AggregatorError;
use crate::store::CatalogStore;
use crate::upstream::CatalogClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Created,
    UpToDate,
    Updated,
}

/// Result of one dataset request: where the extracted CSV lives and whether
/// it came from a previous extraction.
#[derive(Debug, Clone)]
pub struct DatasetCsv {
    pub path: Utf8PathBuf,
    pub cached: bool,
}

pub struct Aggregator<C: CatalogClient, A: ArchiveClient> {
    store: CatalogStore,
    scratch_root: Utf8PathBuf,
    catalog_client: C,
    archive_client: A,
    // One token per dataset code; concurrent requests for the same code are
    // serialized instead of racing on the shared scratch paths.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C: CatalogClient, A: ArchiveClient> Aggregator<C, A> {
    pub fn new(
        store: CatalogStore,
        scratch_root: Utf8PathBuf,
        catalog_client: C,
        archive_client: A,
    ) -> Self {
        Self {
            store,
            scratch_root,
            catalog_client,
            archive_client,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn load_catalog(&self) -> Result<Catalog, AggregatorError> {
        if !self.store.exists() {
            return Err(AggregatorError::CatalogMissing);
        }
        self.store.load()
    }

    /// Fetches the upstream catalog and replaces the stored copy when the
    /// canonical text differs. No retry; failures propagate to the caller.
    pub async fn refresh(&self) -> Result<RefreshOutcome, AggregatorError> {
        info!("checking dataset list against upstream");
        let fetched = self.catalog_client.fetch_catalog().await?;
        fetched.validate()?;

        if !self.store.exists() {
            self.store.save(&fetched)?;
            info!(path = %self.store.path(), "dataset list created");
            return Ok(RefreshOutcome::Created);
        }

        let stored = self.store.load_raw()?;
        let incoming = CatalogStore::canonical(&fetched)?;
        if stored == incoming {
            info!("dataset list is up to date");
            return Ok(RefreshOutcome::UpToDate);
        }

        self.store.save(&fetched)?;
        info!(path = %self.store.path(), "dataset list updated");
        Ok(RefreshOutcome::Updated)
    }

    /// Resolves a dataset code to an extracted normalized CSV on disk,
    /// downloading and unpacking the archive when no previous extraction is
    /// available. The scratch `.zip` never outlives the call.
    pub async fn dataset_csv(&self, code: &DatasetCode) -> Result<DatasetCsv, AggregatorError> {
        let catalog = self.load_catalog()?;
        let entry = catalog
            .find(code)
            .ok_or_else(|| AggregatorError::DatasetNotFound(code.to_string()))?
            .clone();

        let token = self.lock_for(code);
        let _guard = token.lock().await;

        let extract_dir = self.scratch_root.join(code.as_str());
        if let Some(path) = find_extracted_csv(&extract_dir) {
            info!(code = %code, path = %path, "serving previously extracted CSV");
            return Ok(DatasetCsv { path, cached: true });
        }

        let bytes = self.archive_client.fetch(&entry.file_location).await?;
        let zip_path = self.scratch_root.join(format!("{code}.zip"));
        archive::store_archive(&bytes, zip_path.as_std_path())?;

        let files = {
            let zip_path = zip_path.clone();
            let extract_dir = extract_dir.clone();
            tokio::task::spawn_blocking(move || {
                archive::extract_zip_filtered(
                    zip_path.as_std_path(),
                    extract_dir.as_std_path(),
                    |name| name.ends_with(NORMALIZED_CSV_SUFFIX),
                )
            })
            .await
            .map_err(|err| AggregatorError::Extract(err.to_string()))?
        };

        // The archive is spent once extraction has run, matching or not.
        if let Err(err) = fs::remove_file(zip_path.as_std_path()) {
            warn!(path = %zip_path, "failed to remove scratch archive: {err}");
        }

        let files = files?;
        let member = files
            .iter()
            .find(|path| path.as_str().ends_with(NORMALIZED_CSV_SUFFIX))
            .ok_or_else(|| AggregatorError::CsvNotFound(code.to_string()))?;

        Ok(DatasetCsv {
            path: extract_dir.join(member),
            cached: false,
        })
    }

    fn lock_for(&self, code: &DatasetCode) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("dataset lock map poisoned");
        locks
            .entry(code.as_str().to_string())
            .or_default()
            .clone()
    }
}

// Extracted members keep their archive-relative layout, so the scan walks
// subdirectories too. Unreadable directories and non-UTF8 siblings are
// skipped rather than aborting the whole lookup.
fn find_extracted_csv(extract_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut pending = vec![extract_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(dir.as_std_path()) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                continue;
            };
            if path.is_dir() {
                pending.push(path);
            } else if path.as_str().ends_with(NORMALIZED_CSV_SUFFIX) && path.is_file() {
                return Some(path);
            }
        }
    }
    None
}
