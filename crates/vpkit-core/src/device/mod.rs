//! Device communication: command socket and file transfer.

pub mod command;
pub mod ftp;
pub mod mock;
pub mod transfer;

pub use command::{
    CommandError, DESTROY_COMMAND, DeviceCommander, RetryPolicy, TcpCommander, launch_command,
    send_command,
};
pub use ftp::FtpTransfer;
pub use mock::{MockCommander, MockTransfer};
pub use transfer::{FileTransfer, TransferError};
