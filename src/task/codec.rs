//! Snapshot envelope
//!
//! ```text
//! magic "DFS1" (4) | format version (1) | crc32 of payload, LE (4) | payload
//! ```
//!
//! The payload is the deflate-compressed JSON of a `FiberSnapshot`.

use crate::error::SnapshotError;
use crate::fiber::FiberSnapshot;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

const MAGIC: &[u8; 4] = b"DFS1";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 9;

/// Serialize, compress and wrap a snapshot
pub fn encode(snapshot: &FiberSnapshot) -> Result<Vec<u8>, SnapshotError> {
    let json = serde_json::to_vec(snapshot)?;

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let payload = encoder.finish()?;

    let mut blob = Vec::with_capacity(HEADER_LEN + payload.len());
    blob.extend_from_slice(MAGIC);
    blob.push(FORMAT_VERSION);
    blob.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    blob.extend_from_slice(&payload);

    tracing::debug!(
        frames = snapshot.frames.len(),
        raw = json.len(),
        compressed = blob.len(),
        "Snapshot encoded"
    );
    Ok(blob)
}

/// Verify, inflate and parse a snapshot blob
pub fn decode(blob: &[u8]) -> Result<FiberSnapshot, SnapshotError> {
    if blob.len() < HEADER_LEN {
        return Err(SnapshotError::Truncated { len: blob.len() });
    }
    let (header, payload) = blob.split_at(HEADER_LEN);
    if header[..4] != MAGIC[..] {
        return Err(SnapshotError::BadMagic);
    }
    if header[4] != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(u32::from(header[4])));
    }
    let stored = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(SnapshotError::Checksum { stored, computed });
    }

    let mut json = Vec::new();
    DeflateDecoder::new(payload).read_to_end(&mut json)?;
    let snapshot: FiberSnapshot = serde_json::from_slice(&json)?;

    tracing::debug!(
        frames = snapshot.frames.len(),
        raw = json.len(),
        compressed = blob.len(),
        "Snapshot decoded"
    );
    Ok(snapshot)
}
