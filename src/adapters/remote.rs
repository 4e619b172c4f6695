use crate::utils::error::{Result, StorageError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Opens blocking sessions to one remote host.
pub(crate) trait Connector: Send + Sync + 'static {
    type Session: Send + 'static;

    fn describe(&self) -> String;

    fn retry_attempts(&self) -> u32;

    fn connect(&self) -> Result<Self::Session>;
}

/// A session opened on first use and shared by every operation of one adapter.
///
/// Operations run one at a time on the blocking pool. A `BackendUnavailable`
/// error drops the session so the next operation reconnects; dropping the
/// last handle closes it.
pub(crate) struct LazySession<C: Connector> {
    connector: Arc<C>,
    session: Arc<Mutex<Option<C::Session>>>,
}

impl<C: Connector> LazySession<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn is_connected(&self) -> bool {
        self.session
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    pub async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&C, &mut C::Session) -> Result<T> + Send + 'static,
    {
        let connector = Arc::clone(&self.connector);
        let session = Arc::clone(&self.session);
        let backend = self.connector.describe();

        tokio::task::spawn_blocking(move || {
            let mut guard = session
                .lock()
                .map_err(|_| StorageError::backend(connector.describe(), "session lock poisoned"))?;

            if guard.is_none() {
                *guard = Some(connect_with_retry(connector.as_ref())?);
            }
            let active = guard
                .as_mut()
                .ok_or_else(|| StorageError::backend(connector.describe(), "no session"))?;

            let result = op(connector.as_ref(), active);
            if matches!(result, Err(StorageError::BackendUnavailable { .. })) {
                tracing::debug!("Dropping session to {}", connector.describe());
                *guard = None;
            }
            result
        })
        .await
        .map_err(|e| StorageError::backend(backend, e))?
    }
}

fn connect_with_retry<C: Connector>(connector: &C) -> Result<C::Session> {
    let attempts = connector.retry_attempts() + 1;
    let mut attempt = 1;
    loop {
        match connector.connect() {
            Ok(session) => {
                tracing::debug!("Connected to {}", connector.describe());
                return Ok(session);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    "Connection to {} failed (attempt {}/{}): {}",
                    connector.describe(),
                    attempt,
                    attempts,
                    e
                );
                std::thread::sleep(Duration::from_millis(500 * u64::from(attempt)));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// `root` + `key` as an absolute-or-relative remote path.
pub(crate) fn remote_path(root: &str, key: &str) -> String {
    let absolute = root.starts_with('/');
    let root = root.trim_end_matches('/');
    match (root.is_empty(), key.is_empty()) {
        (true, true) if absolute => "/".to_string(),
        (true, true) => ".".to_string(),
        (true, false) if absolute => format!("/{}", key),
        (true, false) => key.to_string(),
        (false, true) => root.to_string(),
        (false, false) => format!("{}/{}", root, key),
    }
}

/// Key of `path` relative to `root`, if it lies inside it.
pub(crate) fn key_from_remote(root: &str, path: &str) -> Option<String> {
    let root = root.trim_end_matches('/');
    let relative = if root.is_empty() {
        path.trim_start_matches("./").trim_start_matches('/')
    } else {
        path.strip_prefix(root)?.strip_prefix('/')?
    };
    (!relative.is_empty()).then(|| relative.to_string())
}

/// Directories that must exist before `key` can be written, outermost first.
pub(crate) fn parent_dirs(root: &str, key: &str) -> Vec<String> {
    let segments: Vec<&str> = key.split('/').collect();
    (1..segments.len())
        .map(|depth| remote_path(root, &segments[..depth].join("/")))
        .collect()
}

/// Sibling upload target: `dir/.name.part`.
pub(crate) fn part_path(root: &str, key: &str) -> String {
    let (dir, name) = match key.rfind('/') {
        Some(pos) => (&key[..pos], &key[pos + 1..]),
        None => ("", key),
    };
    let part = if dir.is_empty() {
        format!(".{}.part", name)
    } else {
        format!("{}/.{}.part", dir, name)
    };
    remote_path(root, &part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyConnector {
        failures_before_success: u32,
        attempts: Arc<AtomicU32>,
        retries: u32,
    }

    impl Connector for FlakyConnector {
        type Session = u32;

        fn describe(&self) -> String {
            "flaky://test".to_string()
        }

        fn retry_attempts(&self) -> u32 {
            self.retries
        }

        fn connect(&self) -> Result<u32> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(StorageError::backend(self.describe(), "refused"))
            } else {
                Ok(n)
            }
        }
    }

    #[tokio::test]
    async fn test_session_is_opened_lazily_and_reused() {
        let attempts = Arc::new(AtomicU32::new(0));
        let session = LazySession::new(FlakyConnector {
            failures_before_success: 0,
            attempts: Arc::clone(&attempts),
            retries: 0,
        });

        assert!(!session.is_connected());
        assert_eq!(attempts.load(Ordering::SeqCst), 0);

        session.run(|_, s| Ok(*s)).await.unwrap();
        session.run(|_, s| Ok(*s)).await.unwrap();

        assert!(session.is_connected());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_retries_are_bounded() {
        let attempts = Arc::new(AtomicU32::new(0));
        let session = LazySession::new(FlakyConnector {
            failures_before_success: 10,
            attempts: Arc::clone(&attempts),
            retries: 1,
        });

        let err = session.run(|_, s| Ok(*s)).await.unwrap_err();
        assert!(matches!(err, StorageError::BackendUnavailable { .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_backend_error_drops_session() {
        let attempts = Arc::new(AtomicU32::new(0));
        let session = LazySession::new(FlakyConnector {
            failures_before_success: 0,
            attempts: Arc::clone(&attempts),
            retries: 0,
        });

        let result: Result<()> = session
            .run(|c, _| Err(StorageError::backend(c.describe(), "broken pipe")))
            .await;
        assert!(result.is_err());
        assert!(!session.is_connected());

        session.run(|_, s| Ok(*s)).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remote_paths() {
        assert_eq!(remote_path("/srv/certs/", "account/key.pem"), "/srv/certs/account/key.pem");
        assert_eq!(remote_path("", "account/key.pem"), "account/key.pem");
        assert_eq!(remote_path("/", "account/key.pem"), "/account/key.pem");
        assert_eq!(
            key_from_remote("/", "/account/key.pem"),
            Some("account/key.pem".to_string())
        );
        assert_eq!(
            key_from_remote("/srv/certs", "/srv/certs/account/key.pem"),
            Some("account/key.pem".to_string())
        );
        assert_eq!(key_from_remote("/srv/certs", "/elsewhere/key.pem"), None);
        assert_eq!(
            parent_dirs("/srv", "certs/example.com/public/cert.pem"),
            vec!["/srv/certs", "/srv/certs/example.com", "/srv/certs/example.com/public"]
        );
        assert_eq!(part_path("/srv", "account/key.pem"), "/srv/account/.key.pem.part");
    }
}
