// Adapters layer: concrete storage backends behind the `Adapter` port.

pub mod ftp;
pub mod local;
mod remote;
pub mod sftp;

pub use ftp::FtpAdapter;
pub use local::LocalAdapter;
pub use sftp::SftpAdapter;

use crate::config::{AdapterConfig, AdapterSettings};
use crate::domain::ports::Adapter;
use crate::utils::error::Result;

/// Builds adapters from configuration. No adapter touches disk or network here.
pub struct AdapterFactory;

impl AdapterFactory {
    pub fn create(config: &AdapterConfig) -> Box<dyn Adapter> {
        match config {
            AdapterConfig::Local(local) => Box::new(LocalAdapter::new(local.root.clone())),
            AdapterConfig::Ftp(ftp) => Box::new(FtpAdapter::new(ftp.clone())),
            AdapterConfig::Sftp(sftp) => Box::new(SftpAdapter::new(sftp.clone())),
        }
    }

    /// Resolves the `type` field and builds the adapter, failing on unknown kinds.
    pub fn from_settings(settings: &AdapterSettings) -> Result<Box<dyn Adapter>> {
        let config = AdapterConfig::try_from(settings)?;
        tracing::debug!("Creating {} adapter", config.kind());
        Ok(Self::create(&config))
    }
}
