use crate::core::backup::{self, BackupPolicy};
use crate::core::report::WriteReport;
use crate::domain::layout;
use crate::domain::model::{ItemSet, StoredItem};
use crate::domain::ports::{Adapter, Formatter};
use crate::formatters::FormatterKind;
use crate::utils::error::{Result, StorageError};
use tokio::sync::Mutex;

/// Collects the topology of a [`Storage`]: one master, then slaves and
/// formatters in the order they are added.
pub struct StorageBuilder {
    master: Box<dyn Adapter>,
    slaves: Vec<Box<dyn Adapter>>,
    formatters: Vec<Box<dyn Formatter>>,
    backup: BackupPolicy,
}

impl StorageBuilder {
    pub fn new(master: Box<dyn Adapter>, backup_enabled: bool) -> Self {
        Self {
            master,
            slaves: Vec::new(),
            formatters: Vec::new(),
            backup: BackupPolicy::new(backup_enabled),
        }
    }

    pub fn add_slave(mut self, slave: Box<dyn Adapter>) -> Self {
        self.slaves.push(slave);
        self
    }

    pub fn add_formatter(mut self, formatter: Box<dyn Formatter>) -> Self {
        self.formatters.push(formatter);
        self
    }

    pub fn backup_retention(mut self, retention: Option<usize>) -> Self {
        self.backup.retention = retention;
        self
    }

    pub fn build(self) -> Storage {
        // Outputs of registered formatters stay derived even when the formatter
        // is no longer configured.
        let mut output_prefixes: Vec<String> = FormatterKind::ALL
            .iter()
            .map(FormatterKind::output_prefix)
            .collect();
        for formatter in &self.formatters {
            let prefix = formatter.output_prefix();
            if !output_prefixes.contains(&prefix) {
                output_prefixes.push(prefix);
            }
        }

        tracing::debug!(
            "Storage ready: master {}, {} slave(s), {} formatter(s), backup {}",
            self.master.describe(),
            self.slaves.len(),
            self.formatters.len(),
            if self.backup.enabled { "on" } else { "off" }
        );
        Storage {
            master: self.master,
            slaves: self.slaves,
            formatters: self.formatters,
            backup: self.backup,
            output_prefixes,
            write_lock: Mutex::new(()),
        }
    }
}

/// Replicated key material storage.
///
/// Reads only ever hit the master. A store succeeds once the master holds
/// the new payload; slave and formatter failures are collected in the
/// returned [`WriteReport`]. Stores are serialized by an internal lock.
pub struct Storage {
    master: Box<dyn Adapter>,
    slaves: Vec<Box<dyn Adapter>>,
    formatters: Vec<Box<dyn Formatter>>,
    backup: BackupPolicy,
    output_prefixes: Vec<String>,
    write_lock: Mutex<()>,
}

impl Storage {
    pub fn builder(master: Box<dyn Adapter>, backup_enabled: bool) -> StorageBuilder {
        StorageBuilder::new(master, backup_enabled)
    }

    pub fn master(&self) -> &dyn Adapter {
        self.master.as_ref()
    }

    pub fn slaves(&self) -> impl Iterator<Item = &dyn Adapter> {
        self.slaves.iter().map(|slave| slave.as_ref())
    }

    pub fn formatter_names(&self) -> Vec<&'static str> {
        self.formatters.iter().map(|f| f.name()).collect()
    }

    pub fn backup_policy(&self) -> BackupPolicy {
        self.backup
    }

    pub async fn has(&self, key: &str) -> Result<bool> {
        self.master.exists(key).await
    }

    pub async fn load(&self, key: &str) -> Result<Vec<u8>> {
        self.master.read(key).await
    }

    pub async fn store(&self, key: &str, data: &[u8]) -> Result<WriteReport> {
        self.store_items(vec![StoredItem::new(key, data)]).await
    }

    /// Stores a batch: backup then master write for each item in order, then
    /// every slave in configured order, then every formatter once over the
    /// resulting canonical set.
    ///
    /// The first master failure aborts the batch. Items of the batch already
    /// written are put back to their previous payload (or deleted when they
    /// had none) before the error is returned, so the master never keeps half
    /// a batch. Backups written on the way are kept.
    pub async fn store_items(&self, items: Vec<StoredItem>) -> Result<WriteReport> {
        let _guard = self.write_lock.lock().await;
        let mut report = WriteReport::default();
        let track_previous = self.backup.enabled || items.len() > 1;
        let mut written: Vec<(&str, Option<Vec<u8>>)> = Vec::with_capacity(items.len());

        for item in &items {
            let previous = if track_previous {
                match self.previous_payload(&item.key).await {
                    Ok(previous) => previous,
                    Err(e) => {
                        self.roll_back(&written).await;
                        return Err(e);
                    }
                }
            } else {
                None
            };

            if self.backup.enabled {
                if let Some(previous) = &previous {
                    self.backup_before_overwrite(&item.key, previous, &mut report)
                        .await;
                }
            }

            if let Err(e) = self.master.write(&item.key, &item.data).await {
                self.roll_back(&written).await;
                return Err(e);
            }
            tracing::debug!("Stored {} on master {}", item.key, self.master.describe());
            report.stored.push(item.key.clone());
            written.push((item.key.as_str(), previous));
        }

        self.replicate(&items, &mut report).await;

        if !self.formatters.is_empty() {
            self.run_formatters(&mut report).await;
        }

        report.log_summary();
        Ok(report)
    }

    /// Backup generations of `key`, oldest first.
    pub async fn backups(&self, key: &str) -> Result<Vec<String>> {
        backup::list_backups(self.master.as_ref(), key).await
    }

    /// Whether `key` is source material on this storage's master, as opposed
    /// to a backup or a formatter output.
    pub fn is_canonical(&self, key: &str) -> bool {
        layout::is_canonical(key, &self.output_prefixes)
    }

    /// Every canonical item currently on the master.
    pub async fn canonical_items(&self) -> Result<ItemSet> {
        let mut set = ItemSet::new();
        for key in self.master.list("").await? {
            if !self.is_canonical(&key) {
                continue;
            }
            let data = self.master.read(&key).await?;
            set.insert(key, data);
        }
        Ok(set)
    }

    /// Re-sends every canonical item so slaves and formatter outputs catch up
    /// with the master. The master itself is not rewritten.
    pub async fn synchronize(&self) -> Result<WriteReport> {
        let _guard = self.write_lock.lock().await;
        let items = self.canonical_items().await?.into_items();
        tracing::info!("Synchronizing {} item(s) to {} slave(s)", items.len(), self.slaves.len());

        let mut report = WriteReport {
            stored: items.iter().map(|item| item.key.clone()).collect(),
            ..WriteReport::default()
        };
        self.replicate(&items, &mut report).await;
        if !self.formatters.is_empty() {
            self.run_formatters(&mut report).await;
        }

        report.log_summary();
        Ok(report)
    }

    async fn previous_payload(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.master.read(key).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Restores the master, newest write first.
    async fn roll_back(&self, written: &[(&str, Option<Vec<u8>>)]) {
        for (key, previous) in written.iter().rev() {
            let restored = match previous {
                Some(data) => self.master.write(key, data).await,
                None => self.master.delete(key).await,
            };
            match restored {
                Ok(()) => tracing::warn!("Rolled back {} on master", key),
                Err(e) => tracing::error!("Could not roll back {} on master: {}", key, e),
            }
        }
    }

    async fn backup_before_overwrite(&self, key: &str, previous: &[u8], report: &mut WriteReport) {
        match backup::rotate(self.master.as_ref(), key, previous).await {
            Ok(backup_key) => report.backups.push(backup_key),
            Err(e) => {
                report.backup_failed(key, e);
                return;
            }
        }

        if let Some(retention) = self.backup.retention {
            match backup::prune(self.master.as_ref(), key, retention).await {
                Ok((_, errors)) => {
                    for e in errors {
                        report.backup_failed(key, e);
                    }
                }
                Err(e) => report.backup_failed(key, e),
            }
        }
    }

    async fn replicate(&self, items: &[StoredItem], report: &mut WriteReport) {
        for (index, slave) in self.slaves.iter().enumerate() {
            for item in items {
                if let Err(e) = slave.write(&item.key, &item.data).await {
                    report.slave_failed(index, slave.describe(), &item.key, e);
                }
            }
        }
    }

    async fn run_formatters(&self, report: &mut WriteReport) {
        let canonical = match self.canonical_items().await {
            Ok(set) => set,
            Err(e) => {
                for formatter in &self.formatters {
                    report.formatter_failed(formatter.name(), None, &e);
                }
                return;
            }
        };

        for formatter in &self.formatters {
            let outputs = match formatter.format(&canonical) {
                Ok(outputs) => outputs,
                Err(e) => {
                    report.formatter_failed(formatter.name(), None, e);
                    continue;
                }
            };

            let prefix = formatter.output_prefix();
            let mut written = Vec::with_capacity(outputs.len());
            for output in outputs {
                if !output.key.starts_with(&prefix) {
                    let e = StorageError::FormatError {
                        formatter: formatter.name().to_string(),
                        message: format!("output {} is outside {}", output.key, prefix),
                    };
                    report.formatter_failed(formatter.name(), Some(output.key.as_str()), e);
                    continue;
                }
                match self.master.write(&output.key, &output.data).await {
                    Ok(()) => {
                        report.formatted.push(output.key.clone());
                        written.push(output);
                    }
                    Err(e) => report.formatter_failed(formatter.name(), Some(output.key.as_str()), e),
                }
            }
            self.replicate(&written, report).await;
        }
    }
}
