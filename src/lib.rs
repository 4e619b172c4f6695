pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod formatters;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, Command};

pub use adapters::{AdapterFactory, FtpAdapter, LocalAdapter, SftpAdapter};
pub use config::{AdapterConfig, AdapterKind, AdapterSettings, AppConfig, StorageConfig};
pub use core::{
    create_storage, Adapter, DomainCertificate, Formatter, ItemSet, KeyPair, Storage,
    StorageBuilder, StoredItem, WriteReport,
};
pub use formatters::{FormatterFactory, FormatterKind};
pub use utils::error::{Result, StorageError};
