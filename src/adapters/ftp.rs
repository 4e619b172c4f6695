use crate::adapters::remote::{
    key_from_remote, parent_dirs, part_path, remote_path, Connector, LazySession,
};
use crate::config::FtpConfig;
use crate::domain::layout;
use crate::domain::ports::Adapter;
use crate::utils::error::{Result, StorageError};
use crate::utils::validation::{validate_key, validate_prefix};
use async_trait::async_trait;
use std::io::Cursor;
use std::net::ToSocketAddrs;
use std::str::FromStr;
use suppaftp::list::File as ListEntry;
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{FtpError, Mode, NativeTlsConnector, NativeTlsFtpStream, Status};

struct FtpConnector {
    config: FtpConfig,
}

/// Logged-in control connection; sends QUIT when dropped.
struct FtpSession {
    stream: NativeTlsFtpStream,
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        if let Err(e) = self.stream.quit() {
            tracing::debug!("FTP QUIT failed: {}", e);
        }
    }
}

impl FtpConnector {
    fn unavailable(&self, e: impl std::fmt::Display) -> StorageError {
        StorageError::backend(self.describe(), e)
    }
}

impl Connector for FtpConnector {
    type Session = FtpSession;

    fn describe(&self) -> String {
        let scheme = if self.config.ssl { "ftps" } else { "ftp" };
        format!(
            "{}://{}@{}:{}{}",
            scheme,
            self.config.username,
            self.config.host,
            self.config.port,
            remote_path(&self.config.root, "")
        )
    }

    fn retry_attempts(&self) -> u32 {
        self.config.retry_attempts
    }

    fn connect(&self) -> Result<FtpSession> {
        let config = &self.config;

        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| self.unavailable(e))?
            .next()
            .ok_or_else(|| self.unavailable(format!("could not resolve {}", config.host)))?;

        let mut stream =
            NativeTlsFtpStream::connect_timeout(addr, config.timeout).map_err(|e| self.unavailable(e))?;
        stream
            .get_ref()
            .set_read_timeout(Some(config.timeout))
            .map_err(|e| self.unavailable(e))?;
        stream
            .get_ref()
            .set_write_timeout(Some(config.timeout))
            .map_err(|e| self.unavailable(e))?;

        if config.ssl {
            let connector = TlsConnector::new().map_err(|e| self.unavailable(e))?;
            stream = stream
                .into_secure(NativeTlsConnector::from(connector), &config.host)
                .map_err(|e| self.unavailable(e))?;
        }

        stream
            .login(&config.username, &config.password)
            .map_err(|e| self.unavailable(format!("login failed: {}", e)))?;
        stream.set_mode(if config.passive {
            Mode::Passive
        } else {
            Mode::Active
        });
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| self.unavailable(e))?;

        Ok(FtpSession { stream })
    }
}

/// Files on an FTP(S) server.
///
/// Uploads go to a `.name.part` sibling which is then renamed over the target.
/// Servers that refuse to rename over an existing file get a delete first, so
/// a reader may briefly see the key missing; plain FTP has no atomic replace.
pub struct FtpAdapter {
    session: LazySession<FtpConnector>,
}

impl FtpAdapter {
    /// Captures the connection parameters; the server is contacted on first use.
    pub fn new(config: FtpConfig) -> Self {
        Self {
            session: LazySession::new(FtpConnector { config }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn root(&self) -> String {
        self.session.connector().config.root.clone()
    }
}

fn is_unavailable_file(e: &FtpError) -> bool {
    matches!(
        e,
        FtpError::UnexpectedResponse(response) if matches!(response.status, Status::FileUnavailable)
    )
}

fn remote_error(connector: &FtpConnector, e: FtpError) -> StorageError {
    connector.unavailable(e)
}

#[async_trait]
impl Adapter for FtpAdapter {
    fn describe(&self) -> String {
        self.session.connector().describe()
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let path = remote_path(&self.root(), key);
        tracing::debug!("FTP SIZE {}", path);

        self.session
            .run(move |connector, session| match session.stream.size(&path) {
                Ok(_) => Ok(true),
                Err(e) if is_unavailable_file(&e) => Ok(false),
                Err(e) => Err(remote_error(connector, e)),
            })
            .await
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        let path = remote_path(&self.root(), key);
        let key = key.to_string();
        tracing::debug!("FTP RETR {}", path);

        self.session
            .run(move |connector, session| match session.stream.retr_as_buffer(&path) {
                Ok(buffer) => Ok(buffer.into_inner()),
                Err(e) if is_unavailable_file(&e) => Err(StorageError::not_found(key)),
                Err(e) => Err(remote_error(connector, e)),
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
        tracing::debug!("FTP STOR {} ({} bytes)", path, data.len());

        self.session
            .run(move |connector, session| {
                let stream = &mut session.stream;
                for dir in &dirs {
                    // Already existing directories answer 550; the upload below reports real failures.
                    let _ = stream.mkdir(dir);
                }

                stream
                    .put_file(&part, &mut Cursor::new(data))
                    .map_err(|e| remote_error(connector, e))?;

                if stream.rename(&part, &path).is_err() {
                    let _ = stream.rm(&path);
                    stream
                        .rename(&part, &path)
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
        tracing::debug!("FTP DELE {}", path);

        self.session
            .run(move |connector, session| match session.stream.rm(&path) {
                Ok(()) => Ok(()),
                Err(e) if is_unavailable_file(&e) => Err(StorageError::not_found(key)),
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
                    let lines = match session.stream.list(Some(dir.as_str())) {
                        Ok(lines) => lines,
                        Err(e) if is_unavailable_file(&e) => continue,
                        Err(e) => return Err(remote_error(connector, e)),
                    };

                    for line in lines {
                        let Ok(entry) = ListEntry::from_str(&line) else {
                            tracing::debug!("Skipping unparsable LIST line: {}", line);
                            continue;
                        };
                        let name = entry.name();
                        if name == "." || name == ".." || name.starts_with('.') {
                            continue;
                        }

                        let path = format!("{}/{}", dir.trim_end_matches('/'), name);
                        if entry.is_directory() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_config() -> FtpConfig {
        FtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "acme".to_string(),
            password: "secret".to_string(),
            root: "/certs".to_string(),
            timeout: Duration::from_secs(1),
            passive: true,
            ssl: false,
            retry_attempts: 0,
        }
    }

    #[test]
    fn test_construction_is_lazy() {
        let adapter = FtpAdapter::new(unreachable_config());
        assert!(!adapter.is_connected());
        assert_eq!(adapter.describe(), "ftp://acme@127.0.0.1:1/certs");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_backend_unavailable() {
        let adapter = FtpAdapter::new(unreachable_config());
        let err = adapter.read("account/key.private.pem").await.unwrap_err();
        assert!(matches!(err, StorageError::BackendUnavailable { .. }));
        assert!(!adapter.is_connected());
    }
}
