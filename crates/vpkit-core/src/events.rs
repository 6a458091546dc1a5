//! Event system for UI decoupling.
//!
//! Lets the CLI (or any other front end) follow a deploy without the
//! orchestration code knowing how progress is displayed.

use std::fmt;
use std::sync::Mutex;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Deploy pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    Idle,
    /// Writing processed files to the local staging directory.
    Staging,
    /// Asking the device to close the running app.
    Stopping,
    /// Opening the file transfer session.
    Connecting,
    /// Entering `ux0:/app/<id>` one segment at a time.
    Navigating,
    Uploading,
    Closing,
    /// Asking the device to launch the app.
    Starting,
    /// Removing the staging directory.
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployPhase::Idle => write!(f, "Idle"),
            DeployPhase::Staging => write!(f, "Staging"),
            DeployPhase::Stopping => write!(f, "Stopping App"),
            DeployPhase::Connecting => write!(f, "Connecting"),
            DeployPhase::Navigating => write!(f, "Navigating"),
            DeployPhase::Uploading => write!(f, "Uploading"),
            DeployPhase::Closing => write!(f, "Closing"),
            DeployPhase::Starting => write!(f, "Starting App"),
            DeployPhase::CleaningUp => write!(f, "Cleaning Up"),
            DeployPhase::Done => write!(f, "Done"),
            DeployPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Events emitted by a deploy session.
#[derive(Debug, Clone, PartialEq)]
pub enum DeployEvent {
    PhaseChanged { from: DeployPhase, to: DeployPhase },
    /// A file finished uploading.
    Progress {
        file: String,
        current: usize,
        total: usize,
    },
    Log { level: LogLevel, message: String },
    /// The app was relaunched after a failed deploy.
    Relaunched,
    Error { phase: DeployPhase, message: String },
    Complete,
}

/// Observer trait for receiving deploy events.
pub trait DeployObserver: Send + Sync {
    fn on_event(&self, event: &DeployEvent);
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl DeployObserver for TracingObserver {
    fn on_event(&self, event: &DeployEvent) {
        match event {
            DeployEvent::PhaseChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Phase changed");
            }
            DeployEvent::Progress {
                file,
                current,
                total,
            } => {
                tracing::debug!(file = %file, progress = %format!("{}/{}", current, total), "Uploaded");
            }
            DeployEvent::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            DeployEvent::Relaunched => {
                tracing::warn!("App relaunched after failed deploy");
            }
            DeployEvent::Error { phase, message } => {
                tracing::error!(phase = %phase, "Error: {}", message);
            }
            DeployEvent::Complete => {
                tracing::info!("Deploy complete");
            }
        }
    }
}

/// Observer that keeps every event, for tests and post-mortems.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<DeployEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeployEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Phases entered, in order.
    pub fn phases(&self) -> Vec<DeployPhase> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                DeployEvent::PhaseChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }
}

impl DeployObserver for RecordingObserver {
    fn on_event(&self, event: &DeployEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
