//! Description of one file copy.

use super::hash::HashAlgorithm;

/// Which way the file moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Local file to the device.
    Put,

    /// Device file to the local disk.
    Get,
}

/// How the bytes reach the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferMethod {
    /// Classic SCP over a second SSH channel.
    #[default]
    Scp,

    /// Paste a text file through the on-box TCL shell.
    InlineTcl,
}

/// A file copy and its verification state.
///
/// For `Put`, `source` is a local path and `dest` a remote file name; for
/// `Get` it is the other way round. Remote names are relative to
/// `file_system`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferJob {
    pub source: String,
    pub dest: String,

    /// Remote file system; the dialect default when `None`.
    pub file_system: Option<String>,

    pub direction: TransferDirection,

    /// Size of the file being copied, once known.
    pub size: Option<u64>,

    /// Digest of the source, once computed.
    pub source_hash: Option<String>,

    /// Digest of the destination, once computed.
    pub dest_hash: Option<String>,

    /// Digest algorithm; the dialect's when `None`.
    pub hash_algorithm: Option<HashAlgorithm>,

    pub method: TransferMethod,

    /// Replace a destination whose content differs.
    pub overwrite: bool,

    /// Compare digests after the copy.
    pub verify_file: bool,

    /// Permission bits sent with SCP uploads.
    pub file_mode: u32,
}

impl FileTransferJob {
    fn new(source: impl Into<String>, dest: impl Into<String>, direction: TransferDirection) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            file_system: None,
            direction,
            size: None,
            source_hash: None,
            dest_hash: None,
            hash_algorithm: None,
            method: TransferMethod::default(),
            overwrite: false,
            verify_file: true,
            file_mode: 0o644,
        }
    }

    /// Upload local `source` as remote `dest`.
    pub fn put(source: impl Into<String>, dest: impl Into<String>) -> Self {
        Self::new(source, dest, TransferDirection::Put)
    }

    /// Download remote `source` to local `dest`.
    pub fn get(source: impl Into<String>, dest: impl Into<String>) -> Self {
        Self::new(source, dest, TransferDirection::Get)
    }

    pub fn with_file_system(mut self, file_system: impl Into<String>) -> Self {
        self.file_system = Some(file_system.into());
        self
    }

    pub fn with_method(mut self, method: TransferMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = Some(algorithm);
        self
    }

    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn verify_file(mut self, verify: bool) -> Self {
        self.verify_file = verify;
        self
    }

    /// File name on the device.
    pub fn remote_file(&self) -> &str {
        match self.direction {
            TransferDirection::Put => &self.dest,
            TransferDirection::Get => &self.source,
        }
    }

    /// Path on the local disk.
    pub fn local_file(&self) -> &str {
        match self.direction {
            TransferDirection::Put => &self.source,
            TransferDirection::Get => &self.dest,
        }
    }
}

/// What [`FileTransfer::run`](super::FileTransfer::run) did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    /// The destination existed before the copy.
    pub exists: bool,

    /// Bytes were copied.
    pub transferred: bool,

    /// Source and destination digests matched.
    pub verified: bool,
}
