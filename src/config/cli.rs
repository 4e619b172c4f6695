use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "keystash")]
#[command(about = "Replicated storage for ACME account keys and certificates")]
pub struct CliConfig {
    /// Configuration file (default: ~/.keystash/keystash.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show what the master holds and where it is replicated
    Status,

    /// Push every stored item to the slaves and formatters again
    Sync {
        #[arg(long, help = "Print the write report as JSON")]
        json: bool,
    },

    /// Store an existing account key pair
    ImportAccount {
        #[arg(long)]
        private_key: PathBuf,
        #[arg(long)]
        public_key: PathBuf,
        #[arg(long, help = "Print the write report as JSON")]
        json: bool,
    },

    /// Store a certificate and its key pair for a domain
    ImportCert {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        cert: PathBuf,
        /// Issuer chain, one or more concatenated PEM certificates
        #[arg(long)]
        chain: Option<PathBuf>,
        #[arg(long)]
        private_key: PathBuf,
        #[arg(long)]
        public_key: PathBuf,
        #[arg(long, help = "Print the write report as JSON")]
        json: bool,
    },

    /// Print a stored certificate
    ShowCert {
        #[arg(long)]
        domain: String,
        #[arg(long, help = "Include the issuer chain")]
        fullchain: bool,
    },
}
