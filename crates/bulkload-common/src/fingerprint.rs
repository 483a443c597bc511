//! SHA-256 fingerprints for queued source files
//!
//! A queue item remembers the fingerprint of the file it was created from.
//! Resuming a paused upload skips the chunks that were already sent, which
//! is only sound if the file still has the same contents.

use crate::error::{BulkError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Fingerprint any readable source
pub fn fingerprint_reader<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Fingerprint a file on disk
pub fn fingerprint_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    fingerprint_reader(&mut file)
}

/// Fail with [`BulkError::FingerprintMismatch`] if the file no longer matches
pub fn verify_fingerprint(path: impl AsRef<Path>, expected: &str) -> Result<()> {
    let actual = fingerprint_file(path)?;
    if actual == expected {
        Ok(())
    } else {
        Err(BulkError::FingerprintMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}
