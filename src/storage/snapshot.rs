//! Whole-store snapshots: checksum-framed bincode, optionally LZ4
//! compressed.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use bincode::{deserialize, serialize};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::MemoryStore;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("snapshot checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("LZ4 decompression error: {0}")]
    Decompression(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    None,
    Lz4,
}

/// On-disk frame: the store payload plus integrity metadata.
#[derive(Serialize, Deserialize)]
struct SnapshotFrame {
    compression: Compression,
    checksum: u32,
    payload: Vec<u8>,
}

/// Writes `store` to `path`, replacing any existing snapshot. The
/// checksum covers the uncompressed payload.
pub fn save(store: &MemoryStore, path: &Path, compression: Compression) -> Result<(), SnapshotError> {
    let raw = serialize(store)?;
    let checksum = crc32fast::hash(&raw);
    let payload = match compression {
        Compression::None => raw,
        Compression::Lz4 => compress_prepend_size(&raw),
    };

    let frame = SnapshotFrame {
        compression,
        checksum,
        payload,
    };
    let encoded = serialize(&frame)?;

    let mut file = File::create(path)?;
    file.write_all(&encoded)?;
    file.flush()?;
    Ok(())
}

/// Reads a snapshot back, verifying the checksum before the store is
/// decoded.
pub fn load(path: &Path) -> Result<MemoryStore, SnapshotError> {
    let mut buffer = Vec::new();
    File::open(path)?.read_to_end(&mut buffer)?;

    let frame: SnapshotFrame = deserialize(&buffer)?;
    let raw = match frame.compression {
        Compression::None => frame.payload,
        Compression::Lz4 => decompress_size_prepended(&frame.payload)
            .map_err(|e| SnapshotError::Decompression(e.to_string()))?,
    };

    let computed = crc32fast::hash(&raw);
    if computed != frame.checksum {
        return Err(SnapshotError::ChecksumMismatch {
            stored: frame.checksum,
            computed,
        });
    }

    Ok(deserialize(&raw)?)
}
