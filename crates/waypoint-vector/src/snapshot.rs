//! Single-file index snapshots.
//!
//! Layout: `MAGIC` | format version (u32 LE) | bincode `Manifest` | bincode payload.
//! The manifest carries a blake3 checksum of the payload bytes and the id of
//! the build that produced it. Files are written to a temporary sibling,
//! fsynced and renamed over the destination. Decoding never reads past the
//! bytes actually present, so a corrupt length prefix fails instead of
//! allocating.
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use bincode::Options;
use serde::{Deserialize, Serialize};
use tracing::debug;

use waypoint_core::types::{DistanceMetric, Meta};
use waypoint_core::{Error, Result};

pub const MAGIC: &[u8; 8] = b"WAYPTIDX";
pub const FORMAT_VERSION: u32 = 2;
const HEADER_LEN: usize = MAGIC.len() + 4;

/// Describes a persisted index without decoding its records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub embedder_id: String,
    pub dim: usize,
    pub metric: DistanceMetric,
    pub record_count: usize,
    /// RFC 3339, UTC.
    pub created_at: String,
    /// blake3 of the payload, hex.
    pub checksum: String,
    /// Shared by indices written together; `None` for a standalone index.
    pub build_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub text: String,
    pub vector: Vec<f32>,
    pub meta: Meta,
}

fn encode_err(path: &Path, e: bincode::Error) -> Error {
    Error::io(path, std::io::Error::new(ErrorKind::InvalidData, e.to_string()))
}

/// Same wire format as `bincode::serialize`, bounded to `limit` input bytes.
fn decoder(limit: usize) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(limit as u64)
}

/// Atomically write `records` to `path`, returning the manifest that was stored.
pub fn write(
    path: &Path,
    embedder_id: &str,
    dim: usize,
    metric: DistanceMetric,
    build_id: Option<&str>,
    records: &[StoredRecord],
) -> Result<Manifest> {
    let payload = bincode::serialize(records).map_err(|e| encode_err(path, e))?;
    let manifest = Manifest {
        embedder_id: embedder_id.to_string(),
        dim,
        metric,
        record_count: records.len(),
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        checksum: blake3::hash(&payload).to_hex().to_string(),
        build_id: build_id.map(str::to_string),
    };
    let header = bincode::serialize(&manifest).map_err(|e| encode_err(path, e))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        w.write_all(MAGIC)
            .and_then(|_| w.write_all(&FORMAT_VERSION.to_le_bytes()))
            .and_then(|_| w.write_all(&header))
            .and_then(|_| w.write_all(&payload))
            .and_then(|_| w.flush())
            .map_err(|e| Error::io(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| Error::io(path, e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    debug!(path = %path.display(), records = records.len(), bytes = payload.len(), "wrote index snapshot");
    Ok(manifest)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::index_not_found(path, "file does not exist"),
        _ => Error::index_not_found(path, format!("unreadable: {e}")),
    })
}

/// Checks magic and version, decodes the manifest and returns it with the payload bytes.
fn split(path: &Path, bytes: &[u8]) -> Result<(Manifest, usize)> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(Error::index_not_found(path, "not a waypoint index (bad magic)"));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(Error::index_not_found(path, format!("unsupported format version {version}")));
    }
    let mut rest = &bytes[HEADER_LEN..];
    let before = rest.len();
    let manifest: Manifest = decoder(before)
        .deserialize_from(&mut rest)
        .map_err(|e| Error::index_not_found(path, format!("corrupt manifest: {e}")))?;
    Ok((manifest, HEADER_LEN + before - rest.len()))
}

pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let bytes = read_bytes(path)?;
    split(path, &bytes).map(|(m, _)| m)
}

/// Read and verify a snapshot. Every decoding failure maps to `IndexNotFound`.
pub fn read(path: &Path) -> Result<(Manifest, Vec<StoredRecord>)> {
    let bytes = read_bytes(path)?;
    let (manifest, offset) = split(path, &bytes)?;
    let payload = &bytes[offset..];
    if blake3::hash(payload).to_hex().as_str() != manifest.checksum {
        return Err(Error::index_not_found(path, "checksum mismatch"));
    }
    let records: Vec<StoredRecord> = decoder(payload.len())
        .deserialize(payload)
        .map_err(|e| Error::index_not_found(path, format!("corrupt payload: {e}")))?;
    if records.len() != manifest.record_count {
        return Err(Error::index_not_found(path, format!("manifest lists {} records, payload has {}", manifest.record_count, records.len())));
    }
    if let Some(bad) = records.iter().find(|r| r.vector.len() != manifest.dim) {
        return Err(Error::index_not_found(path, format!("vector of dimension {} in a {}-d index", bad.vector.len(), manifest.dim)));
    }
    Ok((manifest, records))
}
