use serde::Serialize;

/// Where a non-fatal failure happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FailureTarget {
    /// Slave at `index` in configured order.
    Slave { index: usize, adapter: String },
    Formatter { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationFailure {
    pub target: FailureTarget,
    pub key: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupWarning {
    pub key: String,
    pub error: String,
}

/// Outcome of a successful store: the master holds every key in `stored`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub stored: Vec<String>,
    pub backups: Vec<String>,
    pub formatted: Vec<String>,
    pub backup_warnings: Vec<BackupWarning>,
    pub failures: Vec<ReplicationFailure>,
}

impl WriteReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.backup_warnings.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Indices of slaves that missed at least one write, in configured order.
    pub fn failed_slaves(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .failures
            .iter()
            .filter_map(|failure| match &failure.target {
                FailureTarget::Slave { index, .. } => Some(*index),
                FailureTarget::Formatter { .. } => None,
            })
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    pub fn failed_formatters(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for failure in &self.failures {
            if let FailureTarget::Formatter { name } = &failure.target {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    pub(crate) fn slave_failed(
        &mut self,
        index: usize,
        adapter: String,
        key: &str,
        error: impl std::fmt::Display,
    ) {
        tracing::warn!("Slave #{} ({}) failed to store {}: {}", index, adapter, key, error);
        self.failures.push(ReplicationFailure {
            target: FailureTarget::Slave { index, adapter },
            key: Some(key.to_string()),
            error: error.to_string(),
        });
    }

    pub(crate) fn formatter_failed(
        &mut self,
        name: &str,
        key: Option<&str>,
        error: impl std::fmt::Display,
    ) {
        tracing::warn!(
            "Formatter {} failed{}: {}",
            name,
            key.map(|k| format!(" on {}", k)).unwrap_or_default(),
            error
        );
        self.failures.push(ReplicationFailure {
            target: FailureTarget::Formatter {
                name: name.to_string(),
            },
            key: key.map(str::to_string),
            error: error.to_string(),
        });
    }

    pub(crate) fn backup_failed(&mut self, key: &str, error: impl std::fmt::Display) {
        tracing::warn!("Backup of {} failed, history may have a gap: {}", key, error);
        self.backup_warnings.push(BackupWarning {
            key: key.to_string(),
            error: error.to_string(),
        });
    }

    pub fn log_summary(&self) {
        if self.is_clean() {
            tracing::info!(
                "Stored {} item(s), {} backup(s), {} formatted output(s)",
                self.stored.len(),
                self.backups.len(),
                self.formatted.len()
            );
        } else {
            tracing::warn!(
                "Stored {} item(s) on master with {} replication failure(s) and {} backup warning(s)",
                self.stored.len(),
                self.failures.len(),
                self.backup_warnings.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_targets_are_deduplicated() {
        let mut report = WriteReport::default();
        report.slave_failed(1, "local:/b".to_string(), "a", "denied");
        report.slave_failed(1, "local:/b".to_string(), "b", "denied");
        report.slave_failed(0, "local:/a".to_string(), "a", "denied");
        report.formatter_failed("nginxproxy", None, "boom");
        report.formatter_failed("nginxproxy", Some("nginxproxy/x.crt"), "boom");

        assert!(!report.is_clean());
        assert_eq!(report.failed_slaves(), vec![0, 1]);
        assert_eq!(report.failed_formatters(), vec!["nginxproxy"]);
    }

    #[test]
    fn test_backup_warning_is_not_clean() {
        let mut report = WriteReport::default();
        assert!(report.is_clean());
        report.backup_failed("account/key.private.pem", "disk full");
        assert!(!report.is_clean());
        assert!(!report.has_failures());
    }

    #[test]
    fn test_serializes_targets_with_kind_tag() {
        let mut report = WriteReport::default();
        report.slave_failed(0, "ftp://acme@host:21/".to_string(), "a", "timeout");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failures"][0]["target"]["kind"], "slave");
        assert_eq!(json["failures"][0]["target"]["index"], 0);
    }
}
