//! Output and input digests
//!
//! Output files get CRC32 (IEEE) in the `crc32:xxxxxxxx` form; the input
//! bundle gets SHA-256.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use super::errors::{ProvenanceError, ProvenanceResult};

pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

pub fn format_crc32(checksum: u32) -> String {
    format!("crc32:{:08x}", checksum)
}

/// CRC32 of a file, streamed
pub fn file_crc32(path: &Path) -> ProvenanceResult<u32> {
    let file = File::open(path).map_err(|e| ProvenanceError::io_at(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = crc32fast::Hasher::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = reader
            .read(&mut buffer)
            .map_err(|e| ProvenanceError::io_at(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_crc32_known_value() {
        // IEEE check value
        assert_eq!(crc32(b"123456789"), 0xcbf4_3926);
        assert_eq!(format_crc32(0xcbf4_3926), "crc32:cbf43926");
    }

    #[test]
    fn test_file_crc32_matches_buffer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"epochs").unwrap();
        assert_eq!(file_crc32(file.path()).unwrap(), crc32(b"epochs"));
    }

    #[test]
    fn test_sha256_empty() {
        let digest = sha256(b"");
        assert_eq!(
            super::super::types::hex(&digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
