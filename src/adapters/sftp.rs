use crate::adapters::remote::{
    key_from_remote, parent_dirs, part_path, remote_path, Connector, LazySession,
};
use crate::config::{SftpConfig, SftpCredential};
use crate::domain::layout;
use crate::domain::ports::Adapter;
use crate::utils::error::{Result, StorageError};
use crate::utils::validation::{validate_key, validate_prefix};
use async_trait::async_trait;
use ssh2::{ErrorCode, OpenFlags, OpenType, RenameFlags, Session, Sftp};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

// LIBSSH2_FX_NO_SUCH_FILE
const SFTP_NO_SUCH_FILE: i32 = 2;

struct SftpConnector {
    config: SftpConfig,
}

struct SftpSession {
    session: Session,
    sftp: Sftp,
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "keystash done", None) {
            tracing::debug!("SSH disconnect failed: {}", e);
        }
    }
}

impl SftpConnector {
    fn unavailable(&self, e: impl std::fmt::Display) -> StorageError {
        StorageError::backend(self.describe(), e)
    }
}

impl Connector for SftpConnector {
    type Session = SftpSession;

    fn describe(&self) -> String {
        format!(
            "sftp://{}@{}:{}{}",
            self.config.username,
            self.config.host,
            self.config.port,
            remote_path(&self.config.root, "")
        )
    }

    fn retry_attempts(&self) -> u32 {
        self.config.retry_attempts
    }

    fn connect(&self) -> Result<SftpSession> {
        let config = &self.config;

        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| self.unavailable(e))?
            .next()
            .ok_or_else(|| self.unavailable(format!("could not resolve {}", config.host)))?;

        let tcp = TcpStream::connect_timeout(&addr, config.timeout).map_err(|e| self.unavailable(e))?;

        let mut session = Session::new().map_err(|e| self.unavailable(e))?;
        session.set_timeout(u32::try_from(config.timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| self.unavailable(e))?;

        match &config.credential {
            SftpCredential::Password(password) => {
                session.userauth_password(&config.username, password)
            }
            SftpCredential::PrivateKey { path, passphrase } => session.userauth_pubkey_file(
                &config.username,
                None,
                path,
                passphrase.as_deref(),
            ),
        }
        .map_err(|e| self.unavailable(format!("authentication failed: {}", e)))?;

        if !session.authenticated() {
            return Err(self.unavailable("authentication failed"));
        }

        let sftp = session.sftp().map_err(|e| self.unavailable(e))?;
        Ok(SftpSession { session, sftp })
    }
}

/// Files on an SSH server through SFTP.
///
/// Writes upload to a `.name.part` sibling and rename it over the target.
pub struct SftpAdapter {
    session: LazySession<SftpConnector>,
}

impl SftpAdapter {
    /// Captures the connection parameters; the server is contacted on first use.
    pub fn new(config: SftpConfig) -> Self {
        Self {
            session: LazySession::new(SftpConnector { config }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn root(&self) -> String {
        self.session.connector().config.root.clone()
    }
}

fn is_no_such_file(e: &ssh2::Error) -> bool {
    matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE))
}

fn remote_error(connector: &SftpConnector, e: impl std::fmt::Display) -> StorageError {
    connector.unavailable(e)
}

#[async_trait]
impl Adapter for SftpAdapter {
    fn describe(&self) -> String {
        self.session.connector().describe()
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let path = remote_path(&self.root(), key);
        tracing::debug!("SFTP stat {}", path);

        self.session
            .run(move |connector, session| match session.sftp.stat(Path::new(&path)) {
                Ok(stat) => Ok(stat.is_file()),
                Err(e) if is_no_such_file(&e) => Ok(false),
                Err(e) => Err(remote_error(connector, e)),
            })
            .await
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        let path = remote_path(&self.root(), key);
        let key = key.to_string();
        tracing::debug!("SFTP get {}", path);

        self.session
            .run(move |connector, session| {
                let mut file = match session.sftp.open(Path::new(&path)) {
                    Ok(file) => file,
                    Err(e) if is_no_such_file(&e) => return Err(StorageError::not_found(key)),
                    Err(e) => return Err(remote_error(connector, e)),
                };
                let mut data = Vec::new();
                file.read_to_end(&mut data)
                    .map_err(|e| remote_error(connector, e))?;
                Ok(data)
            })
            .await
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        validate_key(key)?;
        let root = self.root();
        let path = remote_path(&root, key);
        let part = part_path(&root, key);
        let dirs = parent_dirs(&root, key);
        let data = data.to_vec();
        tracing::debug!("SFTP put {} ({} bytes)", path, data.len());

        self.session
            .run(move |connector, session| {
                let sftp = &session.sftp;
                for dir in &dirs {
                    if sftp.stat(Path::new(dir)).is_err() {
                        sftp.mkdir(Path::new(dir), 0o700)
                            .map_err(|e| remote_error(connector, e))?;
                    }
                }

                let mut file = sftp
                    .open_mode(
                        Path::new(&part),
                        OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                        0o600,
                        OpenType::File,
                    )
                    .map_err(|e| remote_error(connector, e))?;
                file.write_all(&data)
                    .map_err(|e| remote_error(connector, e))?;
                drop(file);

                let flags = Some(RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE);
                if sftp.rename(Path::new(&part), Path::new(&path), flags).is_err() {
                    // SFTPv3 servers reject renaming onto an existing file.
                    let _ = sftp.unlink(Path::new(&path));
                    sftp.rename(Path::new(&part), Path::new(&path), None)
                        .map_err(|e| remote_error(connector, e))?;
                }
                Ok(())
            })
            .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = remote_path(&self.root(), key);
        let key = key.to_string();
        tracing::debug!("SFTP unlink {}", path);

        self.session
            .run(move |connector, session| match session.sftp.unlink(Path::new(&path)) {
                Ok(()) => Ok(()),
                Err(e) if is_no_such_file(&e) => Err(StorageError::not_found(key)),
                Err(e) => Err(remote_error(connector, e)),
            })
            .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        validate_prefix(prefix)?;
        let root = self.root();
        let prefix = prefix.to_string();
        let start = remote_path(&root, layout::parent_prefix(&prefix).trim_end_matches('/'));

        self.session
            .run(move |connector, session| {
                let mut keys = Vec::new();
                let mut pending = vec![start];

                while let Some(dir) = pending.pop() {
                    let entries = match session.sftp.readdir(Path::new(&dir)) {
                        Ok(entries) => entries,
                        Err(e) if is_no_such_file(&e) => continue,
                        Err(e) => return Err(remote_error(connector, e)),
                    };

                    for (entry_path, stat) in entries {
                        let Some(name) = entry_path.file_name().and_then(|n| n.to_str()) else {
                            continue;
                        };
                        if name.starts_with('.') {
                            continue;
                        }

                        let path = format!("{}/{}", dir.trim_end_matches('/'), name);
                        if stat.is_dir() {
                            pending.push(path);
                        } else if let Some(key) = key_from_remote(&root, &path) {
                            if key.starts_with(&prefix) {
                                keys.push(key);
                            }
                        }
                    }
                }

                keys.sort();
                Ok(keys)
            })
            .await
    }
}
