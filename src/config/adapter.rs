use crate::utils::error::{Result, StorageError};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_required_field, Validate,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_FTP_PORT: u16 = 21;
pub const DEFAULT_SFTP_PORT: u16 = 22;
pub const DEFAULT_FTP_TIMEOUT_SECS: u64 = 90;
pub const DEFAULT_SFTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Local,
    Ftp,
    Sftp,
}

impl AdapterKind {
    pub const ALL: [AdapterKind; 3] = [AdapterKind::Local, AdapterKind::Ftp, AdapterKind::Sftp];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Local => "local",
            AdapterKind::Ftp => "ftp",
            AdapterKind::Sftp => "sftp",
        }
    }

    pub fn supported() -> String {
        Self::ALL
            .iter()
            .map(AdapterKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for AdapterKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StorageError::UnsupportedAdapterError {
                kind: s.to_string(),
                supported: Self::supported(),
            })
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter settings as written in the configuration file.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AdapterSettings {
    #[serde(rename = "type")]
    pub kind: String,
    pub root: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub private_key_passphrase: Option<String>,
    pub timeout: Option<u64>,
    pub passive: Option<bool>,
    pub ssl: Option<bool>,
    pub retry_attempts: Option<u32>,
}

impl AdapterSettings {
    pub fn local(root: impl Into<String>) -> Self {
        Self {
            kind: AdapterKind::Local.as_str().to_string(),
            root: root.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for AdapterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterSettings")
            .field("kind", &self.kind)
            .field("root", &self.root)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key)
            .field("timeout", &self.timeout)
            .field("passive", &self.passive)
            .field("ssl", &self.ssl)
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub root: PathBuf,
}

#[derive(Clone, PartialEq, Eq)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub root: String,
    pub timeout: Duration,
    pub passive: bool,
    pub ssl: bool,
    pub retry_attempts: u32,
}

#[derive(Clone, PartialEq, Eq)]
pub enum SftpCredential {
    Password(String),
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credential: SftpCredential,
    pub root: String,
    pub timeout: Duration,
    pub retry_attempts: u32,
}

impl fmt::Debug for FtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("root", &self.root)
            .field("timeout", &self.timeout)
            .field("passive", &self.passive)
            .field("ssl", &self.ssl)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for SftpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth = match &self.credential {
            SftpCredential::Password(_) => "password".to_string(),
            SftpCredential::PrivateKey { path, .. } => format!("key {}", path.display()),
        };
        f.debug_struct("SftpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("auth", &auth)
            .field("root", &self.root)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Validated, kind-specific adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterConfig {
    Local(LocalConfig),
    Ftp(FtpConfig),
    Sftp(SftpConfig),
}

impl AdapterConfig {
    pub fn kind(&self) -> AdapterKind {
        match self {
            AdapterConfig::Local(_) => AdapterKind::Local,
            AdapterConfig::Ftp(_) => AdapterKind::Ftp,
            AdapterConfig::Sftp(_) => AdapterKind::Sftp,
        }
    }
}

impl TryFrom<&AdapterSettings> for AdapterConfig {
    type Error = StorageError;

    fn try_from(settings: &AdapterSettings) -> Result<Self> {
        let config = match settings.kind.parse::<AdapterKind>()? {
            AdapterKind::Local => AdapterConfig::Local(LocalConfig {
                root: expand_home(&settings.root),
            }),
            AdapterKind::Ftp => AdapterConfig::Ftp(FtpConfig {
                host: validate_required_field("host", &settings.host)?.clone(),
                port: settings.port.unwrap_or(DEFAULT_FTP_PORT),
                username: validate_required_field("username", &settings.username)?.clone(),
                password: validate_required_field("password", &settings.password)?.clone(),
                root: settings.root.clone(),
                timeout: Duration::from_secs(settings.timeout.unwrap_or(DEFAULT_FTP_TIMEOUT_SECS)),
                passive: settings.passive.unwrap_or(true),
                ssl: settings.ssl.unwrap_or(false),
                retry_attempts: settings.retry_attempts.unwrap_or(0),
            }),
            AdapterKind::Sftp => {
                // 私鑰優先於密碼
                let credential = match (&settings.private_key, &settings.password) {
                    (Some(path), _) => SftpCredential::PrivateKey {
                        path: expand_home(path),
                        passphrase: settings.private_key_passphrase.clone(),
                    },
                    (None, Some(password)) => SftpCredential::Password(password.clone()),
                    (None, None) => {
                        return Err(StorageError::MissingConfigError {
                            field: "password or private_key".to_string(),
                        })
                    }
                };
                AdapterConfig::Sftp(SftpConfig {
                    host: validate_required_field("host", &settings.host)?.clone(),
                    port: settings.port.unwrap_or(DEFAULT_SFTP_PORT),
                    username: validate_required_field("username", &settings.username)?.clone(),
                    credential,
                    root: settings.root.clone(),
                    timeout: Duration::from_secs(
                        settings.timeout.unwrap_or(DEFAULT_SFTP_TIMEOUT_SECS),
                    ),
                    retry_attempts: settings.retry_attempts.unwrap_or(0),
                })
            }
        };

        config.validate()?;
        Ok(config)
    }
}

impl Validate for AdapterConfig {
    fn validate(&self) -> Result<()> {
        match self {
            AdapterConfig::Local(local) => {
                validate_path("root", &local.root.to_string_lossy())?;
            }
            AdapterConfig::Ftp(ftp) => {
                validate_non_empty_string("host", &ftp.host)?;
                validate_non_empty_string("username", &ftp.username)?;
                validate_path("root", &ftp.root)?;
                validate_range("port", ftp.port, 1, u16::MAX)?;
                validate_range("timeout", ftp.timeout.as_secs(), 1, 3600)?;
                validate_range("retry_attempts", ftp.retry_attempts, 0, 10)?;
            }
            AdapterConfig::Sftp(sftp) => {
                validate_non_empty_string("host", &sftp.host)?;
                validate_non_empty_string("username", &sftp.username)?;
                validate_path("root", &sftp.root)?;
                validate_range("port", sftp.port, 1, u16::MAX)?;
                validate_range("timeout", sftp.timeout.as_secs(), 1, 3600)?;
                validate_range("retry_attempts", sftp.retry_attempts, 0, 10)?;
            }
        }
        Ok(())
    }
}

/// Get the user's home directory, preferring `$HOME` over the passwd entry.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
}

/// 展開 `~/` 開頭的路徑
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
