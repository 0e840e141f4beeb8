//! File transfer with existence, space, and digest checks.
//!
//! ```text
//! check_file_exists ─▶ verify_space_available ─▶ transfer_file ─▶ verify_file
//! ```
//!
//! Device-side questions (does the file exist, how large is it, how much
//! space is free, what is its digest) are answered by CLI commands on the
//! interactive session. The bytes themselves travel over a secondary
//! channel opened by the transport, or through `tclsh` for small text
//! files on IOS.

mod hash;
mod inline;
mod job;

use std::time::Duration;

use log::{debug, info};
use regex::Regex;

use crate::driver::{Connection, SendCommandOptions};
use crate::error::{Result, TransferError};
use crate::platform::TransferProfile;

pub use hash::{HashAlgorithm, file_md5, file_sha256, md5_hex, sha256_hex};
pub use job::{FileTransferJob, TransferDirection, TransferMethod, TransferOutcome};

/// Read timeout for on-device digests of large images.
const HASH_TIMEOUT: Duration = Duration::from_secs(300);

/// Read timeout for an inline TCL write.
const INLINE_TIMEOUT: Duration = Duration::from_secs(60);

/// A file copy bound to an open connection.
#[derive(Debug)]
pub struct FileTransfer<'a> {
    conn: &'a mut Connection,
    job: FileTransferJob,
    profile: TransferProfile,
    file_system: String,
    algorithm: HashAlgorithm,
    local_data: Option<Vec<u8>>,
}

impl<'a> FileTransfer<'a> {
    /// Bind `job` to `conn`; fails when the dialect has no transfer profile.
    pub fn new(conn: &'a mut Connection, job: FileTransferJob) -> Result<Self> {
        let profile = conn
            .capabilities()
            .transfer
            .clone()
            .ok_or(TransferError::Unsupported)?;
        let file_system = job.file_system.clone().unwrap_or_else(|| profile.file_system.clone());
        let algorithm = job.hash_algorithm.unwrap_or(profile.hash_algorithm);
        Ok(Self {
            conn,
            job,
            profile,
            file_system,
            algorithm,
            local_data: None,
        })
    }

    /// The job with every size and digest computed so far.
    pub fn job(&self) -> &FileTransferJob {
        &self.job
    }

    /// Full remote path: file system joined with the file name.
    pub fn remote_path(&self) -> String {
        let file = self.job.remote_file();
        let fs = self.file_system.as_str();
        if fs.is_empty() || fs.ends_with('/') || fs.ends_with(':') {
            format!("{fs}{file}")
        } else {
            format!("{fs}/{file}")
        }
    }

    fn render(&self, template: &str) -> String {
        template
            .replace("{path}", &self.remote_path())
            .replace("{file_system}", &self.file_system)
            .replace("{file}", self.job.remote_file())
    }

    async fn run_command(&mut self, command: &str, timeout: Option<Duration>) -> Result<String> {
        let mut opts = SendCommandOptions::default();
        opts.read_timeout = timeout;
        Ok(self.conn.send_command_with(command, &opts).await?.result)
    }

    async fn local_data(&mut self) -> Result<&[u8]> {
        if self.local_data.is_none() {
            let data = tokio::fs::read(self.job.local_file()).await.map_err(TransferError::Io)?;
            self.job.size = Some(data.len() as u64);
            self.local_data = Some(data);
        }
        Ok(self.local_data.as_deref().unwrap_or_default())
    }

    /// Whether the destination already exists.
    pub async fn check_file_exists(&mut self) -> Result<bool> {
        match self.job.direction {
            TransferDirection::Put => {
                let listing = self.remote_listing().await?;
                Ok(listing.is_some())
            }
            TransferDirection::Get => Ok(tokio::fs::try_exists(self.job.local_file())
                .await
                .map_err(TransferError::Io)?),
        }
    }

    /// Directory listing of the remote file, `None` when it is absent.
    async fn remote_listing(&mut self) -> Result<Option<String>> {
        let command = self.render(&self.profile.dir_command);
        let output = self.run_command(&command, None).await?;
        let missing = Regex::new(&self.profile.missing_file_pattern)?;
        if missing.is_match(&output) || !output.contains(self.job.remote_file()) {
            debug!("{} not found on device", self.remote_path());
            return Ok(None);
        }
        Ok(Some(output))
    }

    /// Size of the remote file in bytes.
    pub async fn remote_file_size(&mut self) -> Result<u64> {
        let command = self.render(&self.profile.dir_command);
        let Some(listing) = self.remote_listing().await? else {
            return Err(TransferError::UnparsableOutput {
                command,
                output: format!("{} not found", self.remote_path()),
            }
            .into());
        };

        let pattern = self
            .profile
            .file_size_pattern
            .replace("{file}", &regex::escape(self.job.remote_file()));
        capture(&pattern, "size", &listing)?
            .and_then(|size| size.parse().ok())
            .ok_or_else(|| TransferError::UnparsableOutput { command, output: listing }.into())
    }

    /// Free bytes on the remote file system.
    pub async fn remote_space_available(&mut self) -> Result<u64> {
        let Some(template) = self.profile.space_command.clone() else {
            return Err(TransferError::Unsupported.into());
        };
        let command = self.render(&template);
        let output = self.run_command(&command, None).await?;
        let free: Option<u64> = capture(&self.profile.space_pattern, "free", &output)?.and_then(|v| v.parse().ok());
        match free {
            Some(free) => Ok(free.saturating_mul(self.profile.space_multiplier)),
            None => Err(TransferError::UnparsableOutput { command, output }.into()),
        }
    }

    /// Whether the destination can hold the file.
    ///
    /// Downloads and dialects without a free-space command are not checked.
    pub async fn verify_space_available(&mut self) -> Result<bool> {
        if self.job.direction == TransferDirection::Get || self.profile.space_command.is_none() {
            return Ok(true);
        }
        let needed = self.local_data().await?.len() as u64;
        let available = self.remote_space_available().await?;
        debug!("{} bytes needed, {} available", needed, available);
        Ok(available >= needed)
    }

    /// Copy the bytes.
    pub async fn transfer_file(&mut self) -> Result<()> {
        let remote_path = self.remote_path();
        match (self.job.method, self.job.direction) {
            (TransferMethod::Scp, TransferDirection::Put) => {
                let mode = self.job.file_mode;
                let data = self.local_data().await?.to_vec();
                let mut channel = self.conn.channel_mut().open_file_channel().await?;
                channel.put(&data, &remote_path, mode).await?;
            }
            (TransferMethod::Scp, TransferDirection::Get) => {
                let mut channel = self.conn.channel_mut().open_file_channel().await?;
                let data = channel.get(&remote_path).await?;
                self.job.size = Some(data.len() as u64);
                tokio::fs::write(self.job.local_file(), &data)
                    .await
                    .map_err(TransferError::Io)?;
            }
            (TransferMethod::InlineTcl, TransferDirection::Put) if self.profile.inline_tcl => {
                let data = self.local_data().await?.to_vec();
                inline::put_inline(self.conn, &remote_path, &data, INLINE_TIMEOUT).await?;
            }
            (TransferMethod::InlineTcl, _) => return Err(TransferError::Unsupported.into()),
        }
        info!("transferred {} ({:?})", remote_path, self.job.direction);
        Ok(())
    }

    /// Digest of the remote file as printed by the device.
    pub async fn remote_hash(&mut self) -> Result<String> {
        let command = self.render(&self.profile.hash_command);
        let output = self.run_command(&command, Some(HASH_TIMEOUT)).await?;
        match capture(&self.profile.hash_pattern, "hash", &output)? {
            Some(hash) => Ok(hash.to_ascii_lowercase()),
            None => Err(TransferError::UnparsableOutput { command, output }.into()),
        }
    }

    /// Digest of the local side.
    pub async fn local_hash(&mut self) -> Result<String> {
        match self.job.direction {
            TransferDirection::Put => {
                let algorithm = self.algorithm;
                Ok(algorithm.digest(self.local_data().await?))
            }
            TransferDirection::Get => self.algorithm.file_digest(self.job.local_file()).await,
        }
    }

    /// Compute both digests, record them on the job, and compare.
    pub async fn compare_hash(&mut self) -> Result<bool> {
        let local = self.local_hash().await?;
        let remote = self.remote_hash().await?;
        let (source, dest) = match self.job.direction {
            TransferDirection::Put => (local, remote),
            TransferDirection::Get => (remote, local),
        };
        let same = source == dest;
        self.job.source_hash = Some(source);
        self.job.dest_hash = Some(dest);
        Ok(same)
    }

    /// Whether the destination matches the source.
    pub async fn verify_file(&mut self) -> Result<bool> {
        self.compare_hash().await
    }

    /// Run the whole transfer.
    ///
    /// An existing destination with matching content is left alone. A
    /// differing one is replaced only when `overwrite` is set.
    pub async fn run(&mut self) -> Result<TransferOutcome> {
        let exists = self.check_file_exists().await?;
        if exists {
            if self.compare_hash().await? {
                info!("{} already up to date", self.remote_path());
                return Ok(TransferOutcome {
                    exists,
                    transferred: false,
                    verified: true,
                });
            }
            if !self.job.overwrite {
                let path = match self.job.direction {
                    TransferDirection::Put => self.remote_path(),
                    TransferDirection::Get => self.job.local_file().to_string(),
                };
                return Err(TransferError::FileExists { path }.into());
            }
        }

        if !self.verify_space_available().await? {
            let needed = self.job.size.unwrap_or_default();
            let available = self.remote_space_available().await?;
            return Err(TransferError::InsufficientSpace { needed, available }.into());
        }

        self.transfer_file().await?;

        if self.job.direction == TransferDirection::Put && !self.check_file_exists().await? {
            return Err(TransferError::MissingAfterTransfer {
                path: self.remote_path(),
            }
            .into());
        }

        let verified = if self.job.verify_file {
            if !self.compare_hash().await? {
                let (local, remote) = self.hashes();
                return Err(TransferError::HashMismatch { local, remote }.into());
            }
            true
        } else {
            false
        };

        Ok(TransferOutcome {
            exists,
            transferred: true,
            verified,
        })
    }

    /// Local and remote digests from the last comparison.
    fn hashes(&self) -> (String, String) {
        let source = self.job.source_hash.clone().unwrap_or_default();
        let dest = self.job.dest_hash.clone().unwrap_or_default();
        match self.job.direction {
            TransferDirection::Put => (source, dest),
            TransferDirection::Get => (dest, source),
        }
    }
}

/// Run `job` on `conn`.
pub async fn file_transfer(conn: &mut Connection, job: FileTransferJob) -> Result<TransferOutcome> {
    FileTransfer::new(conn, job)?.run().await
}

/// First match of the named group `name`.
fn capture(pattern: &str, name: &str, text: &str) -> Result<Option<String>> {
    let regex = Regex::new(pattern)?;
    Ok(regex
        .captures(text)
        .and_then(|caps| caps.name(name))
        .map(|m| m.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::testing::{FakeDevice, connection_with};

    fn local_file(content: &[u8]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), content).unwrap();
        file
    }

    fn path_of(file: &tempfile::NamedTempFile) -> String {
        file.path().to_string_lossy().into_owned()
    }

    #[test]
    fn test_capture() {
        let out = "Directory of flash:/\n\n123456 bytes total (654321 bytes free)";
        let free = capture(r"\(?(?P<free>\d+) bytes free\)?", "free", out).unwrap();
        assert_eq!(free.as_deref(), Some("654321"));
        assert_eq!(capture(r"(?P<x>zzz)", "x", out).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_path_joins_file_system() {
        let device = FakeDevice::cisco();
        let mut conn = connection_with(&device, "cisco_ios").await;

        let transfer = FileTransfer::new(&mut conn, FileTransferJob::put("/tmp/a", "a.bin")).unwrap();
        assert_eq!(transfer.remote_path(), "flash:a.bin");

        let job = FileTransferJob::put("/tmp/a", "a.bin").with_file_system("/var/tmp");
        let transfer = FileTransfer::new(&mut conn, job).unwrap();
        assert_eq!(transfer.remote_path(), "/var/tmp/a.bin");
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_transfers_and_verifies() {
        let device = FakeDevice::cisco();
        let mut conn = connection_with(&device, "cisco_ios").await;
        let local = local_file(b"hostname core1\n");

        let job = FileTransferJob::put(path_of(&local), "core1.cfg");
        let outcome = file_transfer(&mut conn, job).await.unwrap();

        assert_eq!(
            outcome,
            TransferOutcome {
                exists: false,
                transferred: true,
                verified: true
            }
        );
        assert_eq!(device.file("flash:core1.cfg").as_deref(), Some(&b"hostname core1\n"[..]));
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_skips_identical_file() {
        let device = FakeDevice::cisco();
        device.add_file("flash:core1.cfg", b"hostname core1\n");
        let mut conn = connection_with(&device, "cisco_ios").await;
        let local = local_file(b"hostname core1\n");

        let mut transfer = FileTransfer::new(&mut conn, FileTransferJob::put(path_of(&local), "core1.cfg")).unwrap();
        let outcome = transfer.run().await.unwrap();
        assert!(outcome.exists);
        assert!(!outcome.transferred);
        assert!(outcome.verified);
        assert_eq!(transfer.job().source_hash, transfer.job().dest_hash);
        assert_eq!(device.uploads(), 0);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_refuses_to_overwrite() {
        let device = FakeDevice::cisco();
        device.add_file("flash:core1.cfg", b"old\n");
        let mut conn = connection_with(&device, "cisco_ios").await;
        let local = local_file(b"new\n");

        let err = file_transfer(&mut conn, FileTransferJob::put(path_of(&local), "core1.cfg"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transfer(TransferError::FileExists { .. })));

        let job = FileTransferJob::put(path_of(&local), "core1.cfg").overwrite(true);
        let outcome = file_transfer(&mut conn, job).await.unwrap();
        assert!(outcome.exists && outcome.transferred && outcome.verified);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hash_mismatch_after_transfer() {
        let device = FakeDevice::cisco();
        device.corrupt_uploads();
        let mut conn = connection_with(&device, "cisco_ios").await;
        let local = local_file(b"hostname core1\n");

        let mut transfer = FileTransfer::new(&mut conn, FileTransferJob::put(path_of(&local), "core1.cfg")).unwrap();
        transfer.transfer_file().await.unwrap();
        assert!(!transfer.verify_file().await.unwrap());

        let err = transfer.run().await.unwrap_err();
        match err {
            Error::Transfer(TransferError::FileExists { .. }) => {}
            other => panic!("unexpected error {other:?}"),
        }

        let job = FileTransferJob::put(path_of(&local), "fresh.cfg");
        let err = file_transfer(&mut conn, job).await.unwrap_err();
        match err {
            Error::Transfer(TransferError::HashMismatch { local, remote }) => {
                assert_eq!(local, md5_hex(b"hostname core1\n"));
                assert_ne!(local, remote);
            }
            other => panic!("unexpected error {other:?}"),
        }
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_insufficient_space() {
        let device = FakeDevice::cisco();
        device.set_free_space(4);
        let mut conn = connection_with(&device, "cisco_ios").await;
        let local = local_file(b"hostname core1\n");

        let err = file_transfer(&mut conn, FileTransferJob::put(path_of(&local), "core1.cfg"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer(TransferError::InsufficientSpace { needed: 15, available: 4 })
        ));
        assert_eq!(device.uploads(), 0);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_file_size() {
        let device = FakeDevice::cisco();
        device.add_file("flash:ios.bin", &[0u8; 2048]);
        let mut conn = connection_with(&device, "cisco_ios").await;

        let mut transfer = FileTransfer::new(&mut conn, FileTransferJob::get("ios.bin", "/tmp/unused")).unwrap();
        assert_eq!(transfer.remote_file_size().await.unwrap(), 2048);

        let mut transfer = FileTransfer::new(&mut conn, FileTransferJob::get("absent.bin", "/tmp/unused")).unwrap();
        assert!(transfer.remote_file_size().await.is_err());
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_downloads_and_verifies() {
        let device = FakeDevice::cisco();
        device.add_file("flash:startup.cfg", b"version 15.2\n");
        let mut conn = connection_with(&device, "cisco_ios").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("startup.cfg");

        let job = FileTransferJob::get("startup.cfg", dest.to_string_lossy());
        let outcome = file_transfer(&mut conn, job).await.unwrap();
        assert!(!outcome.exists);
        assert!(outcome.transferred && outcome.verified);
        assert_eq!(std::fs::read(&dest).unwrap(), b"version 15.2\n");
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_tcl_upload() {
        let device = FakeDevice::cisco();
        let mut conn = connection_with(&device, "cisco_ios").await;
        let local = local_file(b"banner line 1\nbanner line 2\n");

        let job = FileTransferJob::put(path_of(&local), "motd.txt").with_method(TransferMethod::InlineTcl);
        let outcome = file_transfer(&mut conn, job).await.unwrap();
        assert!(outcome.transferred && outcome.verified);
        assert_eq!(
            device.file("flash:motd.txt").as_deref(),
            Some(&b"banner line 1\nbanner line 2\n"[..])
        );
        assert!(device.received("tclquit"));
        assert_eq!(conn.mode(), crate::driver::SessionMode::Enable);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_tcl_needs_dialect_support() {
        let device = FakeDevice::cisco();
        let mut conn = connection_with(&device, "cisco_xe").await;
        let local = local_file(b"text\n");

        let job = FileTransferJob::put(path_of(&local), "motd.txt").with_method(TransferMethod::InlineTcl);
        let mut transfer = FileTransfer::new(&mut conn, job).unwrap();
        let err = transfer.transfer_file().await.unwrap_err();
        assert!(matches!(err, Error::Transfer(TransferError::Unsupported)));
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dialect_without_transfer_profile() {
        let device = FakeDevice::cisco();
        let mut conn = connection_with(&device, "generic").await;
        let err = FileTransfer::new(&mut conn, FileTransferJob::put("/tmp/a", "a")).unwrap_err();
        assert!(matches!(err, Error::Transfer(TransferError::Unsupported)));
        conn.disconnect().await.unwrap();
    }
}
