//! Mock device endpoints for testing deploy logic.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use super::command::{CommandError, DeviceCommander};
use super::transfer::{FileTransfer, TransferError};

/// Mock command socket that records every command.
#[derive(Clone, Default)]
pub struct MockCommander {
    commands: Arc<Mutex<Vec<String>>>,
    refuse: Arc<Mutex<bool>>,
}

impl MockCommander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Simulate an unreachable device.
    pub fn refuse_connections(&self) {
        *self.refuse.lock().unwrap() = true;
    }
}

impl DeviceCommander for MockCommander {
    fn send_command(&self, command: &str) -> Result<(), CommandError> {
        if *self.refuse.lock().unwrap() {
            return Err(CommandError::ConnectFailed {
                addr: "mock".into(),
                attempts: 1,
                source: std::io::ErrorKind::ConnectionRefused.into(),
            });
        }
        self.commands.lock().unwrap().push(command.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct RemoteState {
    connected: bool,
    closed: bool,
    cwd: Vec<String>,
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    fail_put: Option<String>,
}

impl RemoteState {
    fn path_of(&self, name: &str) -> String {
        let mut parts = self.cwd.clone();
        parts.push(name.to_string());
        parts.join("/")
    }
}

/// Mock file transfer with an in-memory remote tree.
///
/// Remote paths are stored without a leading slash, e.g.
/// `ux0:/app/TESTGAME1/index.lua`.
#[derive(Clone, Default)]
pub struct MockTransfer {
    state: Arc<Mutex<RemoteState>>,
}

impl MockTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock whose remote tree already contains `path` and its parents.
    pub fn with_dir(path: &str) -> Self {
        let mock = Self::new();
        {
            let mut state = mock.state.lock().unwrap();
            let mut prefix = Vec::new();
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                prefix.push(segment);
                state.dirs.insert(prefix.join("/"));
            }
        }
        mock
    }

    /// Make `put` fail for the file called `name`.
    pub fn fail_put_on(&self, name: &str) {
        self.state.lock().unwrap().fail_put = Some(name.to_string());
    }

    /// Uploaded files by remote path.
    pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
        self.state.lock().unwrap().files.clone()
    }

    /// Current remote directory.
    pub fn current_dir(&self) -> String {
        self.state.lock().unwrap().cwd.join("/")
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

impl FileTransfer for MockTransfer {
    fn connect(&mut self, _host: &str, _port: u16) -> Result<(), TransferError> {
        let mut state = self.state.lock().unwrap();
        state.connected = true;
        state.closed = false;
        state.cwd.clear();
        Ok(())
    }

    fn cwd(&mut self, dir: &str) -> Result<(), TransferError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(TransferError::NotConnected);
        }
        let target = state.path_of(dir);
        if !state.dirs.contains(&target) {
            return Err(TransferError::RemoteDirNotFound {
                path: dir.to_string(),
            });
        }
        state.cwd.push(dir.to_string());
        Ok(())
    }

    fn mkdir(&mut self, dir: &str) -> Result<(), TransferError> {
        let mut state = self.state.lock().unwrap();
        let target = state.path_of(dir);
        if !state.dirs.insert(target) {
            return Err(TransferError::Protocol(format!("550 {dir}: exists")));
        }
        Ok(())
    }

    fn cdup(&mut self) -> Result<(), TransferError> {
        self.state.lock().unwrap().cwd.pop();
        Ok(())
    }

    fn put(&mut self, name: &str, data: &[u8]) -> Result<(), TransferError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(TransferError::NotConnected);
        }
        if state.fail_put.as_deref() == Some(name) {
            return Err(TransferError::UploadFailed {
                path: name.to_string(),
                message: "mock failure".into(),
            });
        }
        let target = state.path_of(name);
        state.files.insert(target, data.to_vec());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransferError> {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_mock_navigation() {
        let mut mock = MockTransfer::with_dir("ux0:/app/TESTGAME1");
        mock.connect("host", 1337).unwrap();
        mock.cwd("ux0:").unwrap();
        mock.cwd("app").unwrap();
        assert!(matches!(
            mock.cwd("OTHERGAME"),
            Err(TransferError::RemoteDirNotFound { .. })
        ));
        mock.cwd("TESTGAME1").unwrap();
        assert_eq!(mock.current_dir(), "ux0:/app/TESTGAME1");
    }

    #[test]
    fn test_mock_upload_dir() {
        let local = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(local.path().join("gfx")).unwrap();
        std::fs::write(local.path().join("index.lua"), "lua").unwrap();
        std::fs::write(local.path().join("gfx/a.png"), "png").unwrap();

        let mut mock = MockTransfer::with_dir("ux0:/app/TESTGAME1/gfx");
        mock.connect("host", 1337).unwrap();
        for segment in ["ux0:", "app", "TESTGAME1"] {
            mock.cwd(segment).unwrap();
        }

        let mut seen = Vec::new();
        let count = mock
            .upload_dir(local.path(), &mut |p: &Path| seen.push(p.to_path_buf()))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen.len(), 2);

        let files = mock.files();
        assert_eq!(files["ux0:/app/TESTGAME1/index.lua"], b"lua");
        assert_eq!(files["ux0:/app/TESTGAME1/gfx/a.png"], b"png");
        assert_eq!(mock.current_dir(), "ux0:/app/TESTGAME1");
    }

    #[test]
    fn test_mock_commander() {
        let commander = MockCommander::new();
        commander.send_command("destroy").unwrap();
        assert_eq!(commander.commands(), vec!["destroy".to_string()]);

        commander.refuse_connections();
        assert!(commander.send_command("launch X").is_err());
        assert_eq!(commander.commands().len(), 1);
    }
}
