//! Remote command socket client.
//!
//! The device listens for one plaintext command per connection
//! (`launch <id>`, `destroy`), newline terminated, with no reply.

use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::ProjectConfig;

/// Upper bound for a single connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Closes the running app.
pub const DESTROY_COMMAND: &str = "destroy";

/// Command that starts the app with title id `id`.
pub fn launch_command(id: &str) -> String {
    format!("launch {id}")
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Device address (ip) is not configured")]
    DeviceAddressMissing,

    #[error("Could not connect to {addr} after {attempts} attempt(s): {source}")]
    ConnectFailed {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection retry behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries until a connection succeeds.
    pub max_attempts: Option<u32>,
    /// Delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            delay,
        }
    }

    /// Retry forever. Only used when explicitly configured.
    pub fn forever(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bounded(
            crate::config::DEFAULT_RETRY_ATTEMPTS,
            Duration::from_secs(crate::config::DEFAULT_RETRY_DELAY_SECS),
        )
    }
}

/// Sends single-line commands to the device.
pub trait DeviceCommander: Send + Sync {
    fn send_command(&self, command: &str) -> Result<(), CommandError>;
}

/// TCP implementation of [`DeviceCommander`].
#[derive(Debug, Clone)]
pub struct TcpCommander {
    addr: String,
    retry: RetryPolicy,
    connect_timeout: Duration,
}

impl TcpCommander {
    pub fn new(host: &str, port: u16, retry: RetryPolicy) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            retry,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Commander for the configured device, or `DeviceAddressMissing`.
    pub fn from_config(config: &ProjectConfig) -> Result<Self, CommandError> {
        let host = config
            .device_address
            .as_deref()
            .ok_or(CommandError::DeviceAddressMissing)?;
        Ok(Self::new(host, config.ports.cmd, config.retry))
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// One attempt: resolve the address and try each result in turn.
    fn try_connect(&self) -> std::io::Result<TcpStream> {
        let addrs: Vec<SocketAddr> = self.addr.to_socket_addrs()?.collect();
        let mut last = std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "address resolved to nothing",
        );
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    fn connect(&self) -> Result<TcpStream, CommandError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.try_connect() {
                Ok(stream) => {
                    debug!(attempts, "Command socket connected");
                    return Ok(stream);
                }
                Err(e) if self.retry.exhausted(attempts) => {
                    return Err(CommandError::ConnectFailed {
                        addr: self.addr.clone(),
                        attempts,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        addr = %self.addr,
                        attempts,
                        error = %e,
                        "Connect failed, retrying in {}s",
                        self.retry.delay.as_secs_f32()
                    );
                    thread::sleep(self.retry.delay);
                }
            }
        }
    }
}

impl DeviceCommander for TcpCommander {
    #[instrument(skip(self), fields(addr = %self.addr))]
    fn send_command(&self, command: &str) -> Result<(), CommandError> {
        let mut stream = self.connect()?;
        stream.write_all(format!("{command}\n").as_bytes())?;
        stream.flush()?;
        stream.shutdown(Shutdown::Both)?;
        info!(command, "Command sent");
        Ok(())
    }
}

/// Send `command` to the device named in `config`.
pub fn send_command(config: &ProjectConfig, command: &str) -> Result<(), CommandError> {
    TcpCommander::from_config(config)?.send_command(command)
}
