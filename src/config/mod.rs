pub mod adapter;
#[cfg(feature = "cli")]
pub mod cli;

pub use adapter::{
    AdapterConfig, AdapterKind, AdapterSettings, FtpConfig, LocalConfig, SftpConfig,
    SftpCredential,
};

use crate::formatters::FormatterKind;
use crate::utils::error::{Result, StorageError};
use crate::utils::validation::{validate_positive_number, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".keystash";
pub const CONFIG_FILE: &str = "keystash.toml";

/// Written when no configuration file exists yet.
pub const DEFAULT_CONFIG: &str = r#"# keystash configuration
#
# Every value may reference environment variables with ${NAME}.

[storage]
# Keep the previous version of a file before overwriting it on the master.
enable_backup = true
# Number of backup generations to keep per file. Remove to keep them all.
# backup_retention = 10

# Derived layouts for other services. Supported: nginxproxy
formatters = []

# The master storage is the source of truth: everything is read from it.
[storage.master]
type = "local"
root = "~/.keystash/master"

# Slaves receive a copy of every write, on a best-effort basis.
# [[storage.slaves]]
# type = "sftp"
# host = "backup.example.com"
# port = 22
# username = "acme"
# password = "${KEYSTASH_SFTP_PASSWORD}"
# # private_key = "~/.ssh/id_ed25519"
# root = "/srv/keystash"
# timeout = 10

# [[storage.slaves]]
# type = "ftp"
# host = "ftp.example.com"
# username = "acme"
# password = "${KEYSTASH_FTP_PASSWORD}"
# root = "/keystash"
# passive = true
# ssl = false
"#;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub enable_backup: bool,
    #[serde(default)]
    pub backup_retention: Option<usize>,
    pub master: AdapterSettings,
    #[serde(default)]
    pub slaves: Vec<AdapterSettings>,
    #[serde(default)]
    pub formatters: Vec<String>,
}

impl StorageConfig {
    pub fn new(master: AdapterSettings) -> Self {
        Self {
            enable_backup: true,
            backup_retention: None,
            master,
            slaves: Vec::new(),
            formatters: Vec::new(),
        }
    }
}

impl Validate for StorageConfig {
    fn validate(&self) -> Result<()> {
        AdapterConfig::try_from(&self.master).map_err(|e| in_section("storage.master", e))?;

        for (index, slave) in self.slaves.iter().enumerate() {
            AdapterConfig::try_from(slave)
                .map_err(|e| in_section(&format!("storage.slaves[{}]", index), e))?;
        }

        for name in &self.formatters {
            name.parse::<FormatterKind>()?;
        }

        if let Some(retention) = self.backup_retention {
            validate_positive_number("storage.backup_retention", retention, 1)?;
        }

        Ok(())
    }
}

fn in_section(section: &str, err: StorageError) -> StorageError {
    match err {
        StorageError::MissingConfigError { field } => StorageError::MissingConfigError {
            field: format!("{}.{}", section, field),
        },
        StorageError::InvalidConfigValueError {
            field,
            value,
            reason,
        } => StorageError::InvalidConfigValueError {
            field: format!("{}.{}", section, field),
            value,
            reason,
        },
        other => other,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
}

impl AppConfig {
    /// 預設設定檔路徑 (~/.keystash/keystash.toml)
    pub fn default_path() -> Result<PathBuf> {
        adapter::home_dir()
            .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
            .ok_or_else(|| StorageError::ConfigError {
                message: "Could not determine home directory".to_string(),
            })
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 載入配置，檔案不存在時以預設值建立。回傳值的第二項表示是否新建。
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            return Ok((Self::from_file(path)?, false));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::ConfigError {
                message: format!(
                    "Configuration file {} is not writable: {}",
                    path.display(),
                    e
                ),
            })?;
        }
        std::fs::write(path, DEFAULT_CONFIG).map_err(|e| StorageError::ConfigError {
            message: format!(
                "Configuration file {} is not writable: {}",
                path.display(),
                e
            ),
        })?;
        tracing::info!("Created default configuration at {}", path.display());

        Ok((Self::from_toml_str(DEFAULT_CONFIG)?, true))
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${KEYSTASH_SFTP_PASSWORD})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| StorageError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.storage.validate()
    }
}
