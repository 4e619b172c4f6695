use crate::domain::model::{ItemSet, StoredItem};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Uniform access to one storage backend.
///
/// Keys are relative `/`-separated paths under the adapter's root.
/// `read` on a missing key fails with `StorageError::NotFound`.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Human readable location, safe to log (no credentials).
    fn describe(&self) -> String;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Replaces the payload at `key`. Readers never observe a partial payload
    /// unless the backend cannot rename atomically (plain FTP).
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Every key starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Derives alternate artifacts from the canonical item set.
///
/// Every output key must start with [`Formatter::output_prefix`]; that is how
/// outputs are told apart from canonical items.
pub trait Formatter: Send + Sync {
    fn name(&self) -> &'static str;

    fn output_prefix(&self) -> String {
        format!("{}/", self.name())
    }

    fn format(&self, items: &ItemSet) -> Result<Vec<StoredItem>>;
}
