use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tempfile::TempPath;
use tracing::debug;

use crate::error::RelayError;
use crate::prover::ProofResponse;

/// How a proof is handed back to the chat
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Indexed proof values joined into one message
    Text,
    /// The whole payload as a JSON document
    #[default]
    File,
}

/// The deliverable result of a command
#[derive(Debug)]
pub enum DeliveryArtifact {
    Text(String),
    File(ProofFile),
}

/// A proof written to temporary storage.
///
/// The owner must call [`ProofFile::release`] once the upload attempt is over.
/// An unreleased file is still removed when dropped.
#[derive(Debug)]
pub struct ProofFile {
    name: String,
    path: TempPath,
}

impl ProofFile {
    /// File name shown to the recipient
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the backing file.
    pub fn release(self) -> std::io::Result<()> {
        debug!("Releasing proof file {}", self.path.display());
        self.path.close()
    }
}

pub struct ResultFormatter {
    mode: DeliveryMode,
    directory: PathBuf,
}

impl ResultFormatter {
    pub fn new(mode: DeliveryMode, directory: PathBuf) -> Self {
        Self { mode, directory }
    }

    pub fn format(&self, proof: &ProofResponse) -> Result<DeliveryArtifact, RelayError> {
        match self.mode {
            DeliveryMode::Text => Ok(DeliveryArtifact::Text(concatenate_indexed(proof))),
            DeliveryMode::File => self.write_file(proof).map(DeliveryArtifact::File),
        }
    }

    fn write_file(&self, proof: &ProofResponse) -> Result<ProofFile, RelayError> {
        let data = serde_json::to_vec_pretty(proof).map_err(std::io::Error::from)?;

        let prefix = format!("only_members_proof_{}_", chrono::Utc::now().timestamp());
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".json")
            .tempfile_in(&self.directory)?;
        file.write_all(&data)?;
        file.flush()?;

        let path = file.into_temp_path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.json", prefix.trim_end_matches('_')));

        debug!("Wrote {} bytes of proof to {}", data.len(), path.display());
        Ok(ProofFile { name, path })
    }
}

/// Join the values stored under index keys ("0", "1", ...) in numeric order.
///
/// Each index is looked up on its own: gaps are skipped and do not stop the
/// scan. Keys that are not canonical decimal indices are ignored.
pub fn concatenate_indexed(proof: &ProofResponse) -> String {
    let mut indexed: Vec<(u64, &Value)> = proof
        .iter()
        .filter_map(|(key, value)| parse_index(key).map(|i| (i, value)))
        .collect();
    indexed.sort_by_key(|(i, _)| *i);

    indexed
        .into_iter()
        .map(|(_, value)| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

fn parse_index(key: &str) -> Option<u64> {
    let index = key.parse::<u64>().ok()?;
    // Reject "01", "+1" and friends
    (index.to_string() == key).then_some(index)
}
