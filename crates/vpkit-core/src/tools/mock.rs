//! Mock tools for testing packaging and deploy without real binaries.

use std::path::Path;
use std::sync::{Arc, Mutex};

use super::traits::{ExternalTools, ToolError};

/// Prefix the mock puts in front of every recompressed image.
pub const MOCK_QUANT_PREFIX: &[u8] = b"quant:";

/// Mock tools that record every call.
///
/// `generate_sfo` writes `SFO:<id>:<title>` to the output path;
/// `recompress_image` prefixes the data with [`MOCK_QUANT_PREFIX`].
#[derive(Clone, Default)]
pub struct MockTools {
    sfo_calls: Arc<Mutex<Vec<(String, String)>>>,
    image_calls: Arc<Mutex<Vec<String>>>,
    fail_sfo: bool,
}

impl MockTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock whose metadata tool always fails.
    pub fn failing_sfo() -> Self {
        Self {
            fail_sfo: true,
            ..Self::default()
        }
    }

    /// `(id, title)` pairs passed to `generate_sfo`.
    pub fn sfo_calls(&self) -> Vec<(String, String)> {
        self.sfo_calls.lock().unwrap().clone()
    }

    /// Names passed to `recompress_image`.
    pub fn image_calls(&self) -> Vec<String> {
        self.image_calls.lock().unwrap().clone()
    }
}

impl ExternalTools for MockTools {
    fn generate_sfo(&self, id: &str, title: &str, out: &Path) -> Result<(), ToolError> {
        self.sfo_calls
            .lock()
            .unwrap()
            .push((id.to_string(), title.to_string()));
        if self.fail_sfo {
            return Err(ToolError::Failed {
                tool: "mock-mksfoex".into(),
                status: "exit status: 1".into(),
                stderr: "mock failure".into(),
            });
        }
        std::fs::write(out, format!("SFO:{id}:{title}"))?;
        Ok(())
    }

    fn recompress_image(&self, name: &str, data: &[u8]) -> Result<Vec<u8>, ToolError> {
        self.image_calls.lock().unwrap().push(name.to_string());
        let mut out = MOCK_QUANT_PREFIX.to_vec();
        out.extend_from_slice(data);
        Ok(out)
    }
}
