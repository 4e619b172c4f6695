pub mod backup;
pub mod factory;
mod material;
pub mod report;
pub mod storage;

pub use crate::domain::model::{DomainCertificate, ItemSet, KeyPair, StoredItem};
pub use crate::domain::ports::{Adapter, Formatter};
pub use crate::utils::error::Result;
pub use backup::BackupPolicy;
pub use factory::create_storage;
pub use report::{BackupWarning, FailureTarget, ReplicationFailure, WriteReport};
pub use storage::{Storage, StorageBuilder};
