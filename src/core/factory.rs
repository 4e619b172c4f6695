use crate::adapters::AdapterFactory;
use crate::config::StorageConfig;
use crate::core::storage::Storage;
use crate::formatters::FormatterFactory;
use crate::utils::error::Result;
use crate::utils::validation::validate_positive_number;

/// Builds the one [`Storage`] of a process from its validated configuration.
///
/// Every adapter and formatter is resolved before anything is returned, so a
/// typo in any slave or formatter fails here rather than on the first write.
pub fn create_storage(config: &StorageConfig) -> Result<Storage> {
    let master = AdapterFactory::from_settings(&config.master)?;
    let mut builder = Storage::builder(master, config.enable_backup);

    for slave in &config.slaves {
        builder = builder.add_slave(AdapterFactory::from_settings(slave)?);
    }

    for name in &config.formatters {
        builder = builder.add_formatter(FormatterFactory::from_name(name)?);
    }

    if let Some(retention) = config.backup_retention {
        validate_positive_number("storage.backup_retention", retention, 1)?;
    }

    Ok(builder.backup_retention(config.backup_retention).build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdapterSettings;
    use crate::utils::error::StorageError;
    use tempfile::TempDir;

    #[test]
    fn test_builds_topology_in_configured_order() {
        let dir = TempDir::new().unwrap();
        let path = |name: &str| dir.path().join(name).to_string_lossy().to_string();

        let mut config = StorageConfig::new(AdapterSettings::local(path("master")));
        config.slaves = vec![
            AdapterSettings::local(path("first")),
            AdapterSettings::local(path("second")),
        ];
        config.formatters = vec!["nginxproxy".to_string()];
        config.backup_retention = Some(3);

        let storage = create_storage(&config).unwrap();

        let slaves: Vec<String> = storage.slaves().map(|s| s.describe()).collect();
        assert_eq!(
            slaves,
            vec![
                format!("local:{}", path("first")),
                format!("local:{}", path("second")),
            ]
        );
        assert_eq!(storage.formatter_names(), vec!["nginxproxy"]);
        assert_eq!(storage.backup_policy().retention, Some(3));
        assert!(!dir.path().join("master").exists());
    }

    #[test]
    fn test_unknown_slave_kind_fails_construction() {
        let mut config = StorageConfig::new(AdapterSettings::local("/tmp/keystash-master"));
        config.slaves = vec![AdapterSettings {
            kind: "webdav".to_string(),
            root: "/".to_string(),
            ..AdapterSettings::default()
        }];

        let err = create_storage(&config).err().unwrap();
        assert!(matches!(err, StorageError::UnsupportedAdapterError { ref kind, .. } if kind == "webdav"));
    }

    #[test]
    fn test_unknown_formatter_fails_construction() {
        let mut config = StorageConfig::new(AdapterSettings::local("/tmp/keystash-master"));
        config.formatters = vec!["apache".to_string()];

        let err = create_storage(&config).err().unwrap();
        assert!(matches!(err, StorageError::UnsupportedFormatterError { .. }));
    }
}
