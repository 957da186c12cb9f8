//! SHA-256 verification of a finished output file.
//!
//! Runs on demand after assembly, never inline with the chunk workers.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// SHA-256 of a file as lowercase hex. Reads in bounded chunks.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compares the file digest with `expected_hex` (case-insensitive, surrounding whitespace ignored).
pub fn verify_sha256(path: &Path, expected_hex: &str) -> Result<bool> {
    let actual = sha256_path(path)?;
    Ok(actual.eq_ignore_ascii_case(expected_hex.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HELLO_DIGEST: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[test]
    fn sha256_of_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(
            sha256_path(f.path()).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn verify_accepts_uppercase_and_rejects_mismatch() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        assert!(verify_sha256(f.path(), &HELLO_DIGEST.to_uppercase()).unwrap());
        assert!(verify_sha256(f.path(), &format!(" {HELLO_DIGEST}\n")).unwrap());
        assert!(!verify_sha256(f.path(), "00").unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sha256_path(&dir.path().join("absent")).is_err());
    }
}
