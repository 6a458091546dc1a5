//! Tools backed by real binaries on the system PATH.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::{debug, instrument};

use super::traits::{ExternalTools, ToolError};
use crate::config::ToolPaths;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// pngquant: conversion would make the file larger.
const PNGQUANT_LARGER: i32 = 98;
/// pngquant: result below the requested quality.
const PNGQUANT_QUALITY_TOO_LOW: i32 = 99;

/// `vita-mksfoex` + `pngquant`.
#[derive(Debug, Clone)]
pub struct SystemTools {
    mksfoex: String,
    pngquant: String,
}

impl SystemTools {
    pub fn new(paths: &ToolPaths) -> Self {
        Self {
            mksfoex: paths.mksfoex.clone(),
            pngquant: paths.pngquant.clone(),
        }
    }
}

fn spawn_error(tool: &str, e: std::io::Error) -> ToolError {
    match e.kind() {
        std::io::ErrorKind::NotFound => ToolError::NotFound {
            tool: tool.to_string(),
        },
        _ => ToolError::Io(e),
    }
}

fn failed(tool: &str, output: &Output) -> ToolError {
    ToolError::Failed {
        tool: tool.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

pub(crate) fn is_png(data: &[u8]) -> bool {
    data.starts_with(PNG_SIGNATURE)
}

impl ExternalTools for SystemTools {
    #[instrument(skip(self), fields(tool = %self.mksfoex))]
    fn generate_sfo(&self, id: &str, title: &str, out: &Path) -> Result<(), ToolError> {
        let output = Command::new(&self.mksfoex)
            .arg("-s")
            .arg(format!("TITLE_ID={id}"))
            .arg(title)
            .arg(out)
            .output()
            .map_err(|e| spawn_error(&self.mksfoex, e))?;

        if !output.status.success() {
            return Err(failed(&self.mksfoex, &output));
        }
        if !out.is_file() {
            return Err(ToolError::MissingOutput {
                tool: self.mksfoex.clone(),
                path: out.to_path_buf(),
            });
        }
        debug!(out = %out.display(), "param.sfo generated");
        Ok(())
    }

    #[instrument(skip(self, data), fields(len = data.len()))]
    fn recompress_image(&self, name: &str, data: &[u8]) -> Result<Vec<u8>, ToolError> {
        // pngquant only understands PNG
        if !is_png(data) {
            debug!("Not a PNG, kept as is");
            return Ok(data.to_vec());
        }

        let mut child = Command::new(&self.pngquant)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.pngquant, e))?;

        let stdin = child.stdin.take();
        let output = std::thread::scope(|s| {
            s.spawn(move || {
                // A write error here means pngquant exited early; its status decides.
                if let Some(mut stdin) = stdin {
                    let _ = stdin.write_all(data);
                }
            });
            child.wait_with_output()
        })?;

        match output.status.code() {
            Some(0) => {
                debug!(before = data.len(), after = output.stdout.len(), "Image quantized");
                Ok(output.stdout)
            }
            Some(PNGQUANT_LARGER | PNGQUANT_QUALITY_TOO_LOW) => {
                debug!("pngquant skipped image, keeping original");
                Ok(data.to_vec())
            }
            _ => Err(failed(&self.pngquant, &output)),
        }
    }
}
