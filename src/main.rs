use clap::Parser;
use keystash::utils::error::ErrorSeverity;
use keystash::utils::{logger, validation::Validate};
use keystash::{
    create_storage, AppConfig, CliConfig, Command, DomainCertificate, KeyPair, Storage,
    StorageError, WriteReport,
};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI arguments: {:?}", cli);

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(
                "❌ {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

async fn run(cli: CliConfig) -> Result<(), StorageError> {
    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };

    let (config, created) = AppConfig::load_or_create(&config_path)?;
    if created {
        println!(
            "Configuration file {} did not exist, it has been created using default values",
            config_path.display()
        );
    } else {
        tracing::info!("Using configuration file {}", config_path.display());
    }

    // 驗證配置
    config.validate()?;
    let storage = create_storage(&config.storage)?;

    match cli.command {
        Command::Status => status(&storage).await,
        Command::Sync { json } => {
            let report = storage.synchronize().await?;
            print_report(&report, json)
        }
        Command::ImportAccount {
            private_key,
            public_key,
            json,
        } => {
            let key_pair = KeyPair::new(read_text(&public_key)?, read_text(&private_key)?);
            let report = storage.store_account_key_pair(&key_pair).await?;
            print_report(&report, json)
        }
        Command::ImportCert {
            domain,
            cert,
            chain,
            private_key,
            public_key,
            json,
        } => {
            let issuer_chain = match chain {
                Some(path) => keystash::domain::model::split_pem_chain(&read_text(&path)?),
                None => Vec::new(),
            };
            let certificate = DomainCertificate {
                domain,
                certificate: read_text(&cert)?,
                issuer_chain,
                key_pair: KeyPair::new(read_text(&public_key)?, read_text(&private_key)?),
            };
            let report = storage.store_domain_certificate(&certificate).await?;
            print_report(&report, json)
        }
        Command::ShowCert { domain, fullchain } => {
            let certificate = storage.load_domain_certificate(&domain).await?;
            if fullchain {
                print!("{}", certificate.fullchain_pem());
            } else {
                print!("{}", certificate.certificate);
            }
            Ok(())
        }
    }
}

async fn status(storage: &Storage) -> Result<(), StorageError> {
    println!("Master:     {}", storage.master().describe());
    for (index, slave) in storage.slaves().enumerate() {
        println!("Slave #{}:   {}", index, slave.describe());
    }
    let formatters = storage.formatter_names();
    if !formatters.is_empty() {
        println!("Formatters: {}", formatters.join(", "));
    }
    let policy = storage.backup_policy();
    println!(
        "Backups:    {}",
        match (policy.enabled, policy.retention) {
            (false, _) => "disabled".to_string(),
            (true, None) => "enabled, all generations kept".to_string(),
            (true, Some(n)) => format!("enabled, {} generation(s) kept", n),
        }
    );

    let account = if storage.has_account_key_pair().await? {
        "present"
    } else {
        "missing"
    };
    println!("Account key pair: {}", account);

    let domains = storage.list_domains().await?;
    if domains.is_empty() {
        println!("No certificates stored");
    } else {
        println!("Certificates:");
        for domain in domains {
            println!("  - {}", domain);
        }
    }
    Ok(())
}

fn print_report(report: &WriteReport, json: bool) -> Result<(), StorageError> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("✅ Stored {} item(s) on the master", report.stored.len());
    if !report.backups.is_empty() {
        println!("📦 {} backup(s) created", report.backups.len());
    }
    if !report.formatted.is_empty() {
        println!("🧩 {} formatted output(s) written", report.formatted.len());
    }
    for warning in &report.backup_warnings {
        println!("⚠️  Backup of {} failed: {}", warning.key, warning.error);
    }
    for failure in &report.failures {
        let target = match &failure.target {
            keystash::core::FailureTarget::Slave { index, adapter } => {
                format!("slave #{} ({})", index, adapter)
            }
            keystash::core::FailureTarget::Formatter { name } => format!("formatter {}", name),
        };
        println!(
            "⚠️  {} failed{}: {}",
            target,
            failure
                .key
                .as_deref()
                .map(|key| format!(" on {}", key))
                .unwrap_or_default(),
            failure.error
        );
    }
    Ok(())
}

fn read_text(path: &Path) -> Result<String, StorageError> {
    std::fs::read_to_string(path).map_err(|e| StorageError::ConfigError {
        message: format!("Could not read {}: {}", path.display(), e),
    })
}
