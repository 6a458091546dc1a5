//! vpkit-core: build and deploy homebrew `.vpk` packages.
//!
//! # Architecture
//!
//! - **Config**: descriptor loading, default merging and validation
//! - **Sources**: mandatory file checks on the source directory
//! - **Tools**: external binaries (`vita-mksfoex`, `pngquant`) behind a trait
//! - **Assets / Metadata / Package**: image processing, `param.sfo`, `.vpk` archive
//! - **Device**: command socket and file transfer (FTP, mock)
//! - **Events**: observer pattern for UI decoupling
//! - **Deploy**: the stage / stop / upload / launch pipeline
//! - **Watch**: re-run work when sources change
//!
//! # Example
//!
//! ```no_run
//! use vpkit_core::{config, package, tools::SystemTools};
//!
//! let config = config::load(None).expect("bad config");
//! let tools = SystemTools::new(&config.tools);
//! let vpk = package::build(&config, &tools).expect("build failed");
//! println!("wrote {}", vpk.display());
//! ```

pub mod assets;
pub mod config;
pub mod deploy;
pub mod device;
pub mod events;
pub mod metadata;
pub mod package;
pub mod sources;
pub mod tools;
pub mod watch;

// Re-exports for convenience
pub use assets::FileEntry;
pub use config::{ConfigError, ProjectConfig};
pub use deploy::{DeploySession, deploy};
pub use device::{CommandError, DeviceCommander, FileTransfer, RetryPolicy, TransferError};
pub use events::{DeployEvent, DeployObserver, DeployPhase, LogLevel, TracingObserver};
pub use sources::SourceError;
pub use tools::{ExternalTools, SystemTools, ToolError};
