use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Type of adapter \"{kind}\" is not supported (supported: {supported})")]
    UnsupportedAdapterError { kind: String, supported: String },

    #[error("Type of formatter \"{name}\" is not supported (supported: {supported})")]
    UnsupportedFormatterError { name: String, supported: String },

    #[error("Backend {backend} unavailable: {message}")]
    BackendUnavailable { backend: String, message: String },

    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Invalid storage key \"{key}\": {reason}")]
    InvalidKeyError { key: String, reason: String },

    #[error("Invalid key material for {key}: {reason}")]
    InvalidMaterialError { key: String, reason: String },

    #[error("Backup of {key} failed: {message}")]
    BackupError { key: String, message: String },

    #[error("Formatter {formatter} failed: {message}")]
    FormatError { formatter: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Backend,
    NotFound,
    Backup,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl StorageError {
    pub fn not_found(key: impl Into<String>) -> Self {
        StorageError::NotFound { key: key.into() }
    }

    pub fn backend(backend: impl Into<String>, message: impl std::fmt::Display) -> Self {
        StorageError::BackendUnavailable {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound { .. } => true,
            StorageError::IoError(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StorageError::ConfigError { .. }
            | StorageError::MissingConfigError { .. }
            | StorageError::InvalidConfigValueError { .. }
            | StorageError::UnsupportedAdapterError { .. }
            | StorageError::UnsupportedFormatterError { .. }
            | StorageError::TomlError(_) => ErrorCategory::Configuration,
            StorageError::BackendUnavailable { .. } | StorageError::IoError(_) => {
                ErrorCategory::Backend
            }
            StorageError::NotFound { .. } => ErrorCategory::NotFound,
            StorageError::BackupError { .. } => ErrorCategory::Backup,
            StorageError::InvalidKeyError { .. }
            | StorageError::InvalidMaterialError { .. }
            | StorageError::FormatError { .. }
            | StorageError::SerializationError(_) => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Backup => ErrorSeverity::Low,
            ErrorCategory::NotFound | ErrorCategory::Backend => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the [storage] section of the configuration file"
            }
            ErrorCategory::Backend => {
                "Check that the storage backend is reachable and writable, then retry"
            }
            ErrorCategory::NotFound => "Import or generate the missing key material first",
            ErrorCategory::Backup => "Check free space and permissions on the master storage",
            ErrorCategory::Data => "Check that the provided files are valid PEM documents",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            StorageError::NotFound { key } => format!("Nothing is stored at {}", key),
            StorageError::BackendUnavailable { backend, .. } => {
                format!("Storage backend {} could not be reached", backend)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
