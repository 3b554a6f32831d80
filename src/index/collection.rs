//! On-disk layout of a collection: `collection.json` plus append-only `entries.jsonl`.

use super::SummaryIndexError;
use super::types::{CollectionManifest, SummaryEntry};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const MANIFEST_FILE: &str = "collection.json";
const ENTRIES_FILE: &str = "entries.jsonl";

#[derive(Debug, Clone)]
pub(crate) struct CollectionFiles {
    dir: PathBuf,
}

impl CollectionFiles {
    pub(crate) async fn create(root: &Path, name: &str) -> Result<Self, SummaryIndexError> {
        let dir = root.join(name);
        fs::create_dir_all(&dir).await.map_err(|error| {
            SummaryIndexError::Unavailable(format!("cannot create {}: {error}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) async fn load_manifest(
        &self,
    ) -> Result<Option<CollectionManifest>, SummaryIndexError> {
        let path = self.dir.join(MANIFEST_FILE);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(SummaryIndexError::Unavailable(format!(
                    "cannot read {}: {error}",
                    path.display()
                )));
            }
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|error| SummaryIndexError::Corrupt(format!("{}: {error}", path.display())))
    }

    /// Write via a temporary file and rename so a crash never leaves a half-written manifest.
    pub(crate) async fn save_manifest(
        &self,
        manifest: &CollectionManifest,
    ) -> Result<(), SummaryIndexError> {
        let path = self.dir.join(MANIFEST_FILE);
        let staging = self.dir.join(format!("{MANIFEST_FILE}.tmp"));
        let body = serde_json::to_vec_pretty(manifest)
            .map_err(|error| SummaryIndexError::Corrupt(error.to_string()))?;
        fs::write(&staging, body)
            .await
            .map_err(SummaryIndexError::IndexWrite)?;
        fs::rename(&staging, &path)
            .await
            .map_err(SummaryIndexError::IndexWrite)
    }

    pub(crate) async fn load_entries(&self) -> Result<Vec<SummaryEntry>, SummaryIndexError> {
        let path = self.dir.join(ENTRIES_FILE);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(SummaryIndexError::Unavailable(format!(
                    "cannot read {}: {error}",
                    path.display()
                )));
            }
        };

        let mut entries = Vec::new();
        let mut offset = 0usize;
        for (number, piece) in raw.split_inclusive('\n').enumerate() {
            let start = offset;
            offset += piece.len();
            let line = piece.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                // Only an unterminated last line can come from an interrupted append.
                Err(error) if !piece.ends_with('\n') => {
                    tracing::warn!(
                        path = %path.display(),
                        line = number + 1,
                        error = %error,
                        "Dropping torn trailing summary entry"
                    );
                    self.truncate_entries(start as u64).await?;
                }
                Err(error) => {
                    return Err(SummaryIndexError::Corrupt(format!(
                        "{} line {}: {error}",
                        path.display(),
                        number + 1
                    )));
                }
            }
        }
        Ok(entries)
    }

    async fn truncate_entries(&self, len: u64) -> Result<(), SummaryIndexError> {
        let file = OpenOptions::new()
            .write(true)
            .open(self.dir.join(ENTRIES_FILE))
            .await
            .map_err(SummaryIndexError::IndexWrite)?;
        file.set_len(len)
            .await
            .map_err(SummaryIndexError::IndexWrite)?;
        file.sync_data().await.map_err(SummaryIndexError::IndexWrite)
    }

    pub(crate) async fn append_entry(&self, entry: &SummaryEntry) -> Result<(), SummaryIndexError> {
        let mut line = serde_json::to_vec(entry)
            .map_err(|error| SummaryIndexError::Corrupt(error.to_string()))?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(ENTRIES_FILE))
            .await
            .map_err(SummaryIndexError::IndexWrite)?;
        file.write_all(&line)
            .await
            .map_err(SummaryIndexError::IndexWrite)?;
        file.sync_data().await.map_err(SummaryIndexError::IndexWrite)
    }
}
