//! File transfer abstraction.
//!
//! Defines the `FileTransfer` trait for pushing files to the device,
//! allowing different implementations (FTP, mock).

use std::path::Path;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Not connected")]
    NotConnected,

    #[error("Failed to connect to {addr}: {message}")]
    ConnectFailed { addr: String, message: String },

    #[error("Remote directory not found: {path}")]
    RemoteDirNotFound { path: String },

    #[error("Upload of {path} failed: {message}")]
    UploadFailed { path: String, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract file transfer session.
///
/// Paths passed to the primitives are single directory or file names
/// relative to the current remote directory.
pub trait FileTransfer {
    /// Open a session.
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransferError>;

    /// Enter `dir`. Fails with `RemoteDirNotFound` if it does not exist.
    fn cwd(&mut self, dir: &str) -> Result<(), TransferError>;

    /// Create `dir`.
    fn mkdir(&mut self, dir: &str) -> Result<(), TransferError>;

    /// Go to the parent directory.
    fn cdup(&mut self) -> Result<(), TransferError>;

    /// Store `data` as `name`, replacing any existing file.
    fn put(&mut self, name: &str, data: &[u8]) -> Result<(), TransferError>;

    /// End the session.
    fn close(&mut self) -> Result<(), TransferError>;

    /// Mirror the local directory `local` into the current remote directory.
    /// `on_file` is called after each uploaded file. Returns the file count.
    fn upload_dir(
        &mut self,
        local: &Path,
        on_file: &mut dyn FnMut(&Path),
    ) -> Result<usize, TransferError> {
        let mut entries = std::fs::read_dir(local)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();

        let mut count = 0;
        for path in entries {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if path.is_dir() {
                // Existing directories make mkdir fail; cwd decides.
                if let Err(e) = self.mkdir(&name) {
                    debug!(dir = %name, error = %e, "mkdir failed, assuming it exists");
                }
                self.cwd(&name)?;
                count += self.upload_dir(&path, on_file)?;
                self.cdup()?;
            } else {
                let data = std::fs::read(&path)?;
                self.put(&name, &data)?;
                on_file(&path);
                count += 1;
            }
        }
        Ok(count)
    }
}
