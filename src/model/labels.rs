//! Label Map - class index to human-readable gesture name

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("Failed to read labels file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid labels file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid class index in labels file: {0:?}")]
    BadIndex(String),
}

/// Accepted on-disk layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum LabelsFile {
    /// `{"0": "hello", "1": "thanks"}`
    Keyed(HashMap<String, String>),
    /// `["hello", "thanks"]`
    Ordered(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    labels: HashMap<usize, String>,
}

impl LabelMap {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, LabelError> {
        let labels = match serde_json::from_str::<LabelsFile>(raw)? {
            LabelsFile::Keyed(map) => map
                .into_iter()
                .map(|(key, label)| {
                    key.trim()
                        .parse::<usize>()
                        .map(|index| (index, label))
                        .map_err(|_| LabelError::BadIndex(key))
                })
                .collect::<Result<HashMap<_, _>, _>>()?,
            LabelsFile::Ordered(list) => list.into_iter().enumerate().collect(),
        };

        Ok(Self { labels })
    }

    pub fn label(&self, index: usize) -> &str {
        self.labels
            .get(&index)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<(usize, String)> for LabelMap {
    fn from_iter<I: IntoIterator<Item = (usize, String)>>(iter: I) -> Self {
        Self { labels: iter.into_iter().collect() }
    }
}
