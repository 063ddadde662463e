use crate::error::DeckError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

pub const MANIFEST_FILE: &str = "deck.manifest.json";

/// Current deck schema version.
const DECK_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
}

/// Hashes of every file written for a deck, stored beside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckManifest {
    pub schema_version: u32,
    pub entries: Vec<ManifestEntry>,
}

impl Default for DeckManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl DeckManifest {
    pub fn new() -> Self {
        Self {
            schema_version: DECK_SCHEMA_VERSION,
            entries: Vec::new(),
        }
    }

    /// Record (or replace) the hash of `filename`.
    pub fn record(&mut self, filename: &str, data: &[u8]) {
        let sha256 = sha256_hex(data);
        match self.entries.iter_mut().find(|e| e.filename == filename) {
            Some(entry) => entry.sha256 = sha256,
            None => self.entries.push(ManifestEntry {
                filename: filename.to_string(),
                sha256,
            }),
        }
    }

    pub fn save(&self, dir: &Path) -> Result<(), DeckError> {
        let path = dir.join(MANIFEST_FILE);
        serde_json::to_writer_pretty(std::fs::File::create(path)?, self)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, DeckError> {
        let path = dir.join(MANIFEST_FILE);
        let manifest: Self = serde_json::from_reader(std::fs::File::open(path)?)?;
        if manifest.schema_version != DECK_SCHEMA_VERSION {
            return Err(DeckError::SchemaMismatch {
                file_version: manifest.schema_version,
                expected_version: DECK_SCHEMA_VERSION,
            });
        }
        Ok(manifest)
    }
}

/// Re-hash every file listed in the manifest under `dir`. Fails closed on
/// the first mismatch or missing file.
pub fn verify_manifest(dir: impl AsRef<Path>) -> Result<DeckManifest, DeckError> {
    let dir = dir.as_ref();
    let manifest = DeckManifest::load(dir)?;
    for entry in &manifest.entries {
        let data = std::fs::read(dir.join(&entry.filename))?;
        let actual = sha256_hex(&data);
        if actual != entry.sha256 {
            return Err(DeckError::IntegrityMismatch {
                filename: entry.filename.clone(),
                expected: entry.sha256.clone(),
                actual,
            });
        }
    }
    tracing::debug!(files = manifest.entries.len(), "deck manifest verified");
    Ok(manifest)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
