use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AggregatorError;

/// Suffix of the one archive member every dataset request materializes.
pub const NORMALIZED_CSV_SUFFIX: &str = "All_Data_(Normalized).csv";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetCode(String);

impl DatasetCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetCode {
    type Err = AggregatorError;

    // Lookup stays case-sensitive, so no normalization beyond trimming.
    // Codes become scratch directory names; a leading dot would turn `.` or
    // `..` into a path component, so dot-prefixed names are not codes.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && !trimmed.starts_with('.')
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
        if !is_valid {
            return Err(AggregatorError::InvalidDatasetCode(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    #[serde(rename = "DatasetCode")]
    pub code: DatasetCode,
    #[serde(rename = "DatasetName", default)]
    pub name: String,
    #[serde(rename = "Topic", default)]
    pub topic: String,
    #[serde(rename = "DatasetDescription", default)]
    pub description: String,
    #[serde(rename = "Contact", default)]
    pub contact: String,
    #[serde(rename = "Email", default)]
    pub email: String,
    #[serde(rename = "DateUpdate", default)]
    pub date_update: String,
    #[serde(rename = "CompressionFormat", default)]
    pub compression_format: String,
    #[serde(rename = "FileType", default)]
    pub file_type: String,
    #[serde(rename = "FileSize", default)]
    pub file_size: String,
    #[serde(rename = "FileRows", default)]
    pub file_rows: i64,
    #[serde(rename = "FileLocation")]
    pub file_location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetList {
    #[serde(rename = "-xmlns:xsi", default, skip_serializing_if = "Option::is_none")]
    pub xmlns_xsi: Option<String>,
    #[serde(rename = "Dataset", default)]
    pub entries: Vec<DatasetEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "Datasets")]
    pub datasets: DatasetList,
}

impl Catalog {
    pub fn find(&self, code: &DatasetCode) -> Option<&DatasetEntry> {
        self.datasets
            .entries
            .iter()
            .find(|entry| entry.code == *code)
    }

    /// Schema validation at the refresh boundary: every entry must carry a
    /// well-formed code and an http(s) file location. Deserialization does
    /// not run the `FromStr` checks, so codes are re-validated here before
    /// upstream data can reach any scratch path.
    pub fn validate(&self) -> Result<(), AggregatorError> {
        for entry in &self.datasets.entries {
            if let Err(err) = entry.code.as_str().parse::<DatasetCode>() {
                return Err(AggregatorError::CatalogInvalid(format!(
                    "entry with malformed DatasetCode: {err}"
                )));
            }
            if !entry.file_location.starts_with("http://")
                && !entry.file_location.starts_with("https://")
            {
                return Err(AggregatorError::CatalogInvalid(format!(
                    "entry {} has a non-http FileLocation: {:?}",
                    entry.code, entry.file_location
                )));
            }
        }
        Ok(())
    }
}
