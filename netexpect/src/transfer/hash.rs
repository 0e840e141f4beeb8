//! Digests of local data, matching what devices print.

use std::fmt::Write;
use std::path::Path;

use md5::Md5;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{Result, TransferError};

/// Digest algorithm computed on the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl HashAlgorithm {
    /// Lowercase hex digest of `data`.
    pub fn digest(self, data: &[u8]) -> String {
        match self {
            HashAlgorithm::Md5 => md5_hex(data),
            HashAlgorithm::Sha256 => sha256_hex(data),
        }
    }

    /// Lowercase hex digest of a local file.
    pub async fn file_digest(self, path: impl AsRef<Path>) -> Result<String> {
        let data = tokio::fs::read(path).await.map_err(TransferError::Io)?;
        Ok(self.digest(&data))
    }
}

/// MD5 of `data` as lowercase hex.
pub fn md5_hex(data: &[u8]) -> String {
    hex(&Md5::digest(data))
}

/// SHA-256 of `data` as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex(&Sha256::digest(data))
}

/// MD5 of a local file.
pub async fn file_md5(path: impl AsRef<Path>) -> Result<String> {
    HashAlgorithm::Md5.file_digest(path).await
}

/// SHA-256 of a local file.
pub async fn file_sha256(path: impl AsRef<Path>) -> Result<String> {
    HashAlgorithm::Sha256.file_digest(path).await
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
