//! Binary artifact files
//!
//! Every artifact is a bincode envelope holding metadata, the bincode-encoded
//! payload and an FNV-1a checksum of that payload.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ScorecastError};

/// What an artifact file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Preprocessor,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub kind: ArtifactKind,
    /// Free-form label, e.g. the winning model's name
    pub label: String,
    pub crate_version: String,
    /// RFC 3339 creation time
    pub created_at: String,
}

/// On-disk envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedArtifact {
    pub magic: [u8; 4],
    pub format_version: u32,
    pub metadata: ArtifactMetadata,
    pub payload: Vec<u8>,
    pub checksum: u64,
}

impl SerializedArtifact {
    const MAGIC: [u8; 4] = [b'S', b'C', b'R', b'A'];
    const VERSION: u32 = 1;

    pub fn new(metadata: ArtifactMetadata, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(&payload);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            payload,
            checksum,
        }
    }

    /// FNV-1a
    fn compute_checksum(data: &[u8]) -> u64 {
        const FNV_OFFSET: u64 = 14695981039346656037;
        const FNV_PRIME: u64 = 1099511628211;

        data.iter().fold(FNV_OFFSET, |hash, byte| {
            (hash ^ *byte as u64).wrapping_mul(FNV_PRIME)
        })
    }

    pub fn verify(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(ScorecastError::SerializationError(
                "not a scorecast artifact file".to_string(),
            ));
        }
        if self.format_version != Self::VERSION {
            return Err(ScorecastError::SerializationError(format!(
                "unsupported artifact format version {}",
                self.format_version
            )));
        }
        if Self::compute_checksum(&self.payload) != self.checksum {
            return Err(ScorecastError::SerializationError(
                "artifact checksum mismatch".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serialize `obj` to `path`, creating parent directories.
pub fn save_object<T: Serialize>(
    path: impl AsRef<Path>,
    kind: ArtifactKind,
    label: impl Into<String>,
    obj: &T,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let payload = bincode::serialize(obj)?;
    let metadata = ArtifactMetadata {
        kind,
        label: label.into(),
        crate_version: env!("CARGO_PKG_VERSION").to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    let envelope = SerializedArtifact::new(metadata, payload);

    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, &envelope)?;
    writer.flush()?;

    info!(path = %path.display(), kind = ?kind, "saved object");
    Ok(())
}

/// Read the envelope at `path` without decoding its payload.
pub fn read_artifact(path: impl AsRef<Path>) -> Result<SerializedArtifact> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let envelope: SerializedArtifact = bincode::deserialize_from(reader)?;
    envelope.verify()?;
    Ok(envelope)
}

/// Load an object saved by [`save_object`], checking its kind and checksum.
pub fn load_object<T: DeserializeOwned>(path: impl AsRef<Path>, kind: ArtifactKind) -> Result<T> {
    let path = path.as_ref();
    let envelope = read_artifact(path)?;
    if envelope.metadata.kind != kind {
        return Err(ScorecastError::SerializationError(format!(
            "{} holds a {:?} artifact, expected {:?}",
            path.display(),
            envelope.metadata.kind,
            kind
        )));
    }

    let obj = bincode::deserialize(&envelope.payload)?;
    info!(path = %path.display(), kind = ?kind, "loaded object");
    Ok(obj)
}
