//! suppaftp-based file transfer implementation.

use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::{debug, info, instrument};

use super::transfer::{FileTransfer, TransferError};

/// FTP session to the device's FTP server. The server accepts any
/// credentials, so the session logs in anonymously.
#[derive(Default)]
pub struct FtpTransfer {
    stream: Option<FtpStream>,
}

impl FtpTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&mut self) -> Result<&mut FtpStream, TransferError> {
        self.stream.as_mut().ok_or(TransferError::NotConnected)
    }
}

fn protocol(e: FtpError) -> TransferError {
    TransferError::Protocol(e.to_string())
}

impl FileTransfer for FtpTransfer {
    #[instrument(skip(self))]
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransferError> {
        let addr = format!("{host}:{port}");
        let connect_failed = |e: FtpError| TransferError::ConnectFailed {
            addr: addr.clone(),
            message: e.to_string(),
        };

        let mut stream = FtpStream::connect(addr.as_str()).map_err(connect_failed)?;
        stream
            .login("anonymous", "anonymous")
            .map_err(connect_failed)?;
        stream
            .transfer_type(FileType::Binary)
            .map_err(connect_failed)?;

        info!(addr = %addr, "FTP session open");
        self.stream = Some(stream);
        Ok(())
    }

    fn cwd(&mut self, dir: &str) -> Result<(), TransferError> {
        self.stream()?.cwd(dir).map_err(|e| match e {
            FtpError::UnexpectedResponse(_) => TransferError::RemoteDirNotFound {
                path: dir.to_string(),
            },
            other => protocol(other),
        })?;
        debug!(dir, "cwd");
        Ok(())
    }

    fn mkdir(&mut self, dir: &str) -> Result<(), TransferError> {
        self.stream()?.mkdir(dir).map_err(protocol)
    }

    fn cdup(&mut self) -> Result<(), TransferError> {
        self.stream()?.cdup().map_err(protocol)
    }

    #[instrument(skip(self, data), fields(len = data.len()))]
    fn put(&mut self, name: &str, data: &[u8]) -> Result<(), TransferError> {
        let mut reader = data;
        self.stream()?
            .put_file(name, &mut reader)
            .map_err(|e| TransferError::UploadFailed {
                path: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransferError> {
        if let Some(mut stream) = self.stream.take() {
            stream.quit().map_err(protocol)?;
            debug!("FTP session closed");
        }
        Ok(())
    }
}
