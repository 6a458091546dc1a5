//! Deploy session - pushes the processed sources to a running device.
//!
//! The pipeline is fixed and strictly sequential:
//! stage -> stop app -> connect -> navigate -> upload -> close -> launch -> clean up.
//! The first failing step aborts the rest.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::assets;
use crate::config::ProjectConfig;
use crate::device::command::{DESTROY_COMMAND, launch_command};
use crate::device::{
    CommandError, DeviceCommander, FileTransfer, FtpTransfer, TcpCommander, TransferError,
};
use crate::events::{DeployEvent, DeployObserver, DeployPhase, LogLevel, TracingObserver};
use crate::sources;
use crate::tools::ExternalTools;

/// Deploy session over a file transfer backend `F` and command socket `C`.
pub struct DeploySession<'a, F: FileTransfer, C: DeviceCommander, O: DeployObserver> {
    config: &'a ProjectConfig,
    tools: &'a dyn ExternalTools,
    transfer: F,
    commander: C,
    observer: Arc<O>,
    phase: DeployPhase,
    app_stopped: bool,
}

impl<'a> DeploySession<'a, FtpTransfer, TcpCommander, TracingObserver> {
    /// Session over FTP and the TCP command socket of the configured device.
    pub fn new(
        config: &'a ProjectConfig,
        tools: &'a dyn ExternalTools,
    ) -> Result<Self, CommandError> {
        let commander = TcpCommander::from_config(config)?;
        Ok(Self::with_parts(
            config,
            tools,
            FtpTransfer::new(),
            commander,
            Arc::new(TracingObserver),
        ))
    }
}

impl<'a, F: FileTransfer, C: DeviceCommander, O: DeployObserver> DeploySession<'a, F, C, O> {
    pub fn with_parts(
        config: &'a ProjectConfig,
        tools: &'a dyn ExternalTools,
        transfer: F,
        commander: C,
        observer: Arc<O>,
    ) -> Self {
        Self {
            config,
            tools,
            transfer,
            commander,
            observer,
            phase: DeployPhase::Idle,
            app_stopped: false,
        }
    }

    pub fn phase(&self) -> DeployPhase {
        self.phase
    }

    fn emit(&self, event: DeployEvent) {
        self.observer.on_event(&event);
    }

    fn enter(&mut self, to: DeployPhase) {
        let from = self.phase;
        self.phase = to;
        self.emit(DeployEvent::PhaseChanged { from, to });
    }

    /// Run the whole pipeline.
    #[instrument(skip(self), fields(id = %self.config.id))]
    pub fn run(&mut self) -> Result<()> {
        let host = self
            .config
            .device_address
            .clone()
            .ok_or(CommandError::DeviceAddressMissing)?;
        sources::check(self.config)?;

        match self.run_steps(&host) {
            Ok(()) => {
                self.enter(DeployPhase::Done);
                self.emit(DeployEvent::Complete);
                Ok(())
            }
            Err(e) => {
                let failed_in = self.phase;
                self.emit(DeployEvent::Error {
                    phase: failed_in,
                    message: format!("{e:#}"),
                });
                if self.app_stopped && failed_in != DeployPhase::Starting {
                    self.relaunch_after_failure();
                }
                self.enter(DeployPhase::Failed);
                Err(e)
            }
        }
    }

    fn run_steps(&mut self, host: &str) -> Result<()> {
        self.enter(DeployPhase::Staging);
        let total = self.stage()?;

        self.enter(DeployPhase::Stopping);
        self.commander
            .send_command(DESTROY_COMMAND)
            .context("Failed to stop the app")?;
        self.app_stopped = true;

        self.enter(DeployPhase::Connecting);
        self.transfer.connect(host, self.config.ports.ftp)?;

        self.enter(DeployPhase::Navigating);
        self.navigate()?;

        self.enter(DeployPhase::Uploading);
        self.upload(total)?;

        self.enter(DeployPhase::Closing);
        self.transfer.close()?;

        self.enter(DeployPhase::Starting);
        self.commander
            .send_command(&launch_command(&self.config.id))
            .context("Failed to launch the app")?;
        self.app_stopped = false;

        self.enter(DeployPhase::CleaningUp);
        std::fs::remove_dir_all(&self.config.tmp_dir).with_context(|| {
            format!("Failed to remove {}", self.config.tmp_dir.display())
        })?;
        Ok(())
    }

    /// Write processed sources to the staging directory. Existing contents
    /// are overwritten, not cleared.
    fn stage(&mut self) -> Result<usize> {
        let files = assets::collect_source_files(&self.config.src_dir)
            .with_context(|| format!("Failed to read {}", self.config.src_dir.display()))?;
        let files = assets::process_images(files, self.tools).context("Image processing failed")?;
        assets::write_entries(&files, &self.config.tmp_dir)
            .with_context(|| format!("Failed to stage into {}", self.config.tmp_dir.display()))?;
        info!(files = files.len(), dir = %self.config.tmp_dir.display(), "Staged");
        Ok(files.len())
    }

    fn navigate(&mut self) -> Result<(), TransferError> {
        let remote = self.config.remote_app_dir();
        let mut walked = Vec::new();
        for segment in remote.split('/').filter(|s| !s.is_empty()) {
            walked.push(segment);
            self.transfer.cwd(segment).map_err(|e| match e {
                TransferError::RemoteDirNotFound { .. } => TransferError::RemoteDirNotFound {
                    path: walked.join("/"),
                },
                other => other,
            })?;
        }
        Ok(())
    }

    fn upload(&mut self, total: usize) -> Result<usize, TransferError> {
        let root = self.config.tmp_dir.clone();
        let observer = Arc::clone(&self.observer);
        let mut current = 0;
        let uploaded = self.transfer.upload_dir(&root, &mut |path: &Path| {
            current += 1;
            let file = path.strip_prefix(&root).unwrap_or(path);
            observer.on_event(&DeployEvent::Progress {
                file: file.display().to_string(),
                current,
                total: total.max(current),
            });
        })?;
        info!(uploaded, "Upload finished");
        Ok(uploaded)
    }

    fn relaunch_after_failure(&mut self) {
        if !self.config.relaunch_on_failure {
            self.emit(DeployEvent::Log {
                level: LogLevel::Warn,
                message: "App was stopped and is left closed".into(),
            });
            return;
        }
        match self.commander.send_command(&launch_command(&self.config.id)) {
            Ok(()) => self.emit(DeployEvent::Relaunched),
            Err(e) => warn!(error = %e, "Relaunch after failure did not succeed"),
        }
    }
}

/// Deploy to the configured device over FTP.
pub fn deploy(config: &ProjectConfig, tools: &dyn ExternalTools) -> Result<()> {
    DeploySession::new(config, tools)?.run()
}
