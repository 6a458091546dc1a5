//! Project configuration: loading, merging and validation.
//!
//! The descriptor file (`vpkit.toml` by default) is parsed into a
//! [`ConfigFile`] where every key is optional, merged over
//! [`ConfigFile::defaults`] with [`merge`], and then validated into an
//! immutable [`ProjectConfig`].
//!
//! ```toml
//! id = "TESTGAME1"
//! title = "Test Game"
//! ip = "192.168.1.42"
//! srcDir = "src"
//! outDir = "dist"
//!
//! [ports]
//! ftp = 1337
//! cmd = 1338
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::device::RetryPolicy;

/// Descriptor filename looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "vpkit.toml";

/// Length of a console package identifier (e.g. `VITA00001`).
pub const TITLE_ID_LEN: usize = 9;

pub const DEFAULT_FTP_PORT: u16 = 1337;
pub const DEFAULT_CMD_PORT: u16 = 1338;
pub const DEFAULT_SRC_DIR: &str = "src";
pub const DEFAULT_OUT_DIR: &str = "dist";
pub const DEFAULT_TMP_DIR: &str = "tmp";
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_MKSFOEX: &str = "vita-mksfoex";
pub const DEFAULT_PNGQUANT: &str = "pngquant";

/// Extension of the installable package archive.
pub const PACKAGE_EXT: &str = "vpk";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", path.display())]
    ConfigMissing { path: PathBuf },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid id {id:?}: must be exactly 9 characters")]
    InvalidId { id: Option<String> },

    #[error("Invalid title: must be set, non-empty and free of path separators")]
    InvalidTitle,

    #[error("Staging directory {} must not be inside the source directory {}", tmp_dir.display(), src_dir.display())]
    StagingInsideSources { tmp_dir: PathBuf, src_dir: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Port table of the descriptor file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct PortsFile {
    pub ftp: Option<u16>,
    pub cmd: Option<u16>,
}

/// Retry table of the descriptor file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryFile {
    pub attempts: Option<u32>,
    pub delay_secs: Option<u64>,
    pub forever: Option<bool>,
}

/// External tool table of the descriptor file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolsFile {
    pub mksfoex: Option<String>,
    pub pngquant: Option<String>,
}

/// Raw descriptor contents. Every key is optional until validated.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "deviceAddress")]
    pub ip: Option<String>,
    pub src_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub tmp_dir: Option<PathBuf>,
    pub relaunch_on_failure: Option<bool>,
    #[serde(default)]
    pub ports: PortsFile,
    #[serde(default)]
    pub retry: RetryFile,
    #[serde(default)]
    pub tools: ToolsFile,
}

impl ConfigFile {
    /// The built-in default record.
    pub fn defaults() -> Self {
        Self {
            id: None,
            title: None,
            ip: None,
            src_dir: Some(PathBuf::from(DEFAULT_SRC_DIR)),
            out_dir: Some(PathBuf::from(DEFAULT_OUT_DIR)),
            tmp_dir: Some(PathBuf::from(DEFAULT_TMP_DIR)),
            relaunch_on_failure: Some(false),
            ports: PortsFile {
                ftp: Some(DEFAULT_FTP_PORT),
                cmd: Some(DEFAULT_CMD_PORT),
            },
            retry: RetryFile {
                attempts: Some(DEFAULT_RETRY_ATTEMPTS),
                delay_secs: Some(DEFAULT_RETRY_DELAY_SECS),
                forever: Some(false),
            },
            tools: ToolsFile {
                mksfoex: Some(DEFAULT_MKSFOEX.to_string()),
                pngquant: Some(DEFAULT_PNGQUANT.to_string()),
            },
        }
    }

    /// Load a descriptor from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::ConfigMissing {
                path: path.to_path_buf(),
            },
            _ => ConfigError::Io(e),
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Merge `overrides` over `defaults`. Values present in `overrides` win key
/// by key; nested tables merge field by field.
pub fn merge(defaults: &ConfigFile, overrides: ConfigFile) -> ConfigFile {
    ConfigFile {
        id: overrides.id.or_else(|| defaults.id.clone()),
        title: overrides.title.or_else(|| defaults.title.clone()),
        ip: overrides.ip.or_else(|| defaults.ip.clone()),
        src_dir: overrides.src_dir.or_else(|| defaults.src_dir.clone()),
        out_dir: overrides.out_dir.or_else(|| defaults.out_dir.clone()),
        tmp_dir: overrides.tmp_dir.or_else(|| defaults.tmp_dir.clone()),
        relaunch_on_failure: overrides.relaunch_on_failure.or(defaults.relaunch_on_failure),
        ports: PortsFile {
            ftp: overrides.ports.ftp.or(defaults.ports.ftp),
            cmd: overrides.ports.cmd.or(defaults.ports.cmd),
        },
        retry: RetryFile {
            attempts: overrides.retry.attempts.or(defaults.retry.attempts),
            delay_secs: overrides.retry.delay_secs.or(defaults.retry.delay_secs),
            forever: overrides.retry.forever.or(defaults.retry.forever),
        },
        tools: ToolsFile {
            mksfoex: overrides.tools.mksfoex.or_else(|| defaults.tools.mksfoex.clone()),
            pngquant: overrides
                .tools
                .pngquant
                .or_else(|| defaults.tools.pngquant.clone()),
        },
    }
}

/// Check the identity fields. The first violation wins.
pub fn validate(file: &ConfigFile) -> Result<(), ConfigError> {
    match file.id.as_deref() {
        Some(id) if id.chars().count() == TITLE_ID_LEN => {}
        other => {
            return Err(ConfigError::InvalidId {
                id: other.map(str::to_owned),
            });
        }
    }
    match file.title.as_deref() {
        Some(title) if !title.trim().is_empty() && !title.contains(['/', '\\']) => Ok(()),
        _ => Err(ConfigError::InvalidTitle),
    }
}

/// Whether `inner` is `outer` or lies below it. Relative paths are resolved
/// against the working directory; neither path has to exist.
fn is_within(inner: &Path, outer: &Path) -> Result<bool, ConfigError> {
    Ok(std::path::absolute(inner)?.starts_with(std::path::absolute(outer)?))
}

/// Network ports on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    pub ftp: u16,
    pub cmd: u16,
}

/// Names (or paths) of the external binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub mksfoex: String,
    pub pngquant: String,
}

/// Validated, immutable project configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    pub id: String,
    pub title: String,
    pub device_address: Option<String>,
    pub ports: Ports,
    pub src_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Local staging directory used by deploy.
    pub tmp_dir: PathBuf,
    pub retry: RetryPolicy,
    /// Send `launch <id>` again if deploy fails after the app was stopped.
    pub relaunch_on_failure: bool,
    pub tools: ToolPaths,
}

impl TryFrom<ConfigFile> for ProjectConfig {
    type Error = ConfigError;

    /// Expects a record already merged over [`ConfigFile::defaults`].
    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        validate(&file)?;

        let retry = if file.retry.forever.unwrap_or(false) {
            RetryPolicy::forever(Duration::from_secs(
                file.retry.delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS),
            ))
        } else {
            RetryPolicy::bounded(
                file.retry.attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS),
                Duration::from_secs(file.retry.delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS)),
            )
        };

        let src_dir = file.src_dir.unwrap_or_else(|| DEFAULT_SRC_DIR.into());
        let tmp_dir = file.tmp_dir.unwrap_or_else(|| DEFAULT_TMP_DIR.into());
        if is_within(&tmp_dir, &src_dir)? {
            return Err(ConfigError::StagingInsideSources { tmp_dir, src_dir });
        }

        Ok(Self {
            id: file.id.unwrap_or_default(),
            title: file.title.unwrap_or_default(),
            device_address: file.ip.filter(|ip| !ip.trim().is_empty()),
            ports: Ports {
                ftp: file.ports.ftp.unwrap_or(DEFAULT_FTP_PORT),
                cmd: file.ports.cmd.unwrap_or(DEFAULT_CMD_PORT),
            },
            src_dir,
            out_dir: file.out_dir.unwrap_or_else(|| DEFAULT_OUT_DIR.into()),
            tmp_dir,
            retry,
            relaunch_on_failure: file.relaunch_on_failure.unwrap_or(false),
            tools: ToolPaths {
                mksfoex: file.tools.mksfoex.unwrap_or_else(|| DEFAULT_MKSFOEX.into()),
                pngquant: file.tools.pngquant.unwrap_or_else(|| DEFAULT_PNGQUANT.into()),
            },
        })
    }
}

impl ProjectConfig {
    /// Minimal config with default ports and directories.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Result<Self, ConfigError> {
        let file = ConfigFile {
            id: Some(id.into()),
            title: Some(title.into()),
            ..Default::default()
        };
        Self::try_from(merge(&ConfigFile::defaults(), file))
    }

    /// Install directory of this application on the device.
    pub fn remote_app_dir(&self) -> String {
        format!("ux0:/app/{}", self.id)
    }

    /// File name of the package archive, `<title>.vpk`.
    pub fn package_file_name(&self) -> String {
        format!("{}.{}", self.title, PACKAGE_EXT)
    }

    /// Full output path of the package archive.
    pub fn package_path(&self) -> PathBuf {
        self.out_dir.join(self.package_file_name())
    }
}

/// Read, merge and validate the descriptor. `None` uses
/// [`DEFAULT_CONFIG_FILE`] in the working directory.
#[instrument]
pub fn load(path: Option<&Path>) -> Result<ProjectConfig, ConfigError> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    info!(path = %path.display(), "Reading configuration");
    let overrides = ConfigFile::load_from_file(&path)?;
    debug!(?overrides, "Parsed descriptor");

    let config = ProjectConfig::try_from(merge(&ConfigFile::defaults(), overrides))?;
    info!(id = %config.id, title = %config.title, "Configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: Option<&str>, title: Option<&str>) -> ConfigFile {
        ConfigFile {
            id: id.map(str::to_owned),
            title: title.map(str::to_owned),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_overrides_win() {
        let overrides = ConfigFile {
            src_dir: Some("game".into()),
            ports: PortsFile {
                ftp: Some(2000),
                cmd: None,
            },
            ..Default::default()
        };
        let merged = merge(&ConfigFile::defaults(), overrides);
        assert_eq!(merged.src_dir, Some(PathBuf::from("game")));
        assert_eq!(merged.out_dir, Some(PathBuf::from(DEFAULT_OUT_DIR)));
        assert_eq!(merged.ports.ftp, Some(2000));
        assert_eq!(merged.ports.cmd, Some(DEFAULT_CMD_PORT));
    }

    #[test]
    fn test_merge_does_not_touch_defaults() {
        let defaults = ConfigFile::defaults();
        let _ = merge(&defaults, file(Some("TESTGAME1"), Some("Test")));
        assert_eq!(defaults, ConfigFile::defaults());
        assert!(defaults.id.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_id_lengths() {
        for id in ["", "SHORT", "TESTGAME", "TESTGAME12", "WAYTOOLONGID"] {
            let err = validate(&file(Some(id), Some("Title"))).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidId { .. }), "id {id:?}");
        }
        let err = validate(&file(None, Some("Title"))).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidId { id: None }));
    }

    #[test]
    fn test_validate_rejects_missing_title() {
        assert!(matches!(
            validate(&file(Some("TESTGAME1"), None)),
            Err(ConfigError::InvalidTitle)
        ));
        assert!(matches!(
            validate(&file(Some("TESTGAME1"), Some("  "))),
            Err(ConfigError::InvalidTitle)
        ));
    }

    #[test]
    fn test_validate_id_checked_before_title() {
        let err = validate(&file(Some("BAD"), None)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidId { .. }));
    }

    #[test]
    fn test_project_config_defaults() {
        let config = ProjectConfig::new("TESTGAME1", "Test Game").unwrap();
        assert_eq!(config.ports.ftp, 1337);
        assert_eq!(config.ports.cmd, 1338);
        assert_eq!(config.src_dir, PathBuf::from("src"));
        assert_eq!(config.out_dir, PathBuf::from("dist"));
        assert!(config.device_address.is_none());
        assert!(!config.relaunch_on_failure);
        assert_eq!(config.retry.max_attempts, Some(DEFAULT_RETRY_ATTEMPTS));
        assert_eq!(config.package_path(), PathBuf::from("dist/Test Game.vpk"));
        assert_eq!(config.remote_app_dir(), "ux0:/app/TESTGAME1");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let err = load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigMissing { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "id = \"TESTGAME1\"\ntitle = [unterminated").unwrap();
        let err = load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_full_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
id = "TESTGAME1"
title = "Test Game"
deviceAddress = "10.0.0.7"
outDir = "build"
relaunchOnFailure = true

[ports]
cmd = 9000

[retry]
forever = true
delaySecs = 1
"#,
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.id, "TESTGAME1");
        assert_eq!(config.device_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(config.out_dir, PathBuf::from("build"));
        assert_eq!(config.src_dir, PathBuf::from("src"));
        assert_eq!(config.ports, Ports { ftp: 1337, cmd: 9000 });
        assert!(config.relaunch_on_failure);
        assert_eq!(config.retry.max_attempts, None);
        assert_eq!(config.retry.delay, Duration::from_secs(1));
    }

    #[test]
    fn test_validate_rejects_path_separators_in_title() {
        for title in ["Test/Game", "Test\\Game", "../escape"] {
            assert!(
                matches!(
                    validate(&file(Some("TESTGAME1"), Some(title))),
                    Err(ConfigError::InvalidTitle)
                ),
                "title {title:?}"
            );
        }
        assert!(validate(&file(Some("TESTGAME1"), Some("Test: Game v1.0"))).is_ok());
    }

    #[test]
    fn test_staging_inside_sources_rejected() {
        for tmp in ["src/tmp", "src", "./src/stage"] {
            let mut record = merge(&ConfigFile::defaults(), file(Some("TESTGAME1"), Some("T")));
            record.tmp_dir = Some(tmp.into());
            let err = ProjectConfig::try_from(record).unwrap_err();
            assert!(
                matches!(err, ConfigError::StagingInsideSources { .. }),
                "tmp {tmp:?}"
            );
        }

        let mut record = merge(&ConfigFile::defaults(), file(Some("TESTGAME1"), Some("T")));
        record.tmp_dir = Some("src-staging".into());
        assert!(ProjectConfig::try_from(record).is_ok());
    }

    #[test]
    fn test_try_from_converts_merged_record() {
        let mut record = merge(&ConfigFile::defaults(), file(Some("TESTGAME1"), Some("T")));
        record.out_dir = Some("build".into());
        record.ports.cmd = Some(4000);
        let config = ProjectConfig::try_from(record).unwrap();
        assert_eq!(config.out_dir, PathBuf::from("build"));
        assert_eq!(config.ports, Ports { ftp: 1337, cmd: 4000 });
        assert_eq!(config, {
            let mut expected = ProjectConfig::new("TESTGAME1", "T").unwrap();
            expected.out_dir = "build".into();
            expected.ports.cmd = 4000;
            expected
        });
    }
}
