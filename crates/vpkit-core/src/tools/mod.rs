//! External tool layer module.

pub mod mock;
pub mod system;
pub mod traits;

pub use mock::MockTools;
pub use system::SystemTools;
pub use traits::{ExternalTools, ToolError};
