use crate::error::StoreError;
use crate::ledger::Ledger;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Where the ledger record lives. Each call moves the whole record; there is
/// no partial or incremental persistence.
pub trait LedgerBackend: Send + Sync {
    /// Current record, created empty if nothing has been persisted yet.
    fn load(&self) -> Result<Ledger, StoreError>;
    fn commit(&self, ledger: &Ledger) -> Result<(), StoreError>;
}

impl<B: LedgerBackend + ?Sized> LedgerBackend for Box<B> {
    fn load(&self) -> Result<Ledger, StoreError> {
        (**self).load()
    }

    fn commit(&self, ledger: &Ledger) -> Result<(), StoreError> {
        (**self).commit(ledger)
    }
}

/// Bounded retry for ledger file I/O.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Multiplied by the attempt number before each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    pub(crate) fn run<T>(&self, op: &str, path: &Path, mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match f() {
                Ok(v) => return Ok(v),
                Err(e) if attempt < attempts => {
                    warn!(
                        op,
                        path = %path.display(),
                        attempt,
                        error = %e,
                        "ledger io failed, retrying"
                    );
                    thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Single pretty-printed JSON file. Commits go through a sibling `.tmp` file
/// and a rename, so a reader never observes a half-written record.
#[derive(Clone, Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    retry: RetryPolicy,
}

impl JsonFileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Only the read is retried; a record that fails to parse is final.
    pub(crate) fn load_with(
        &self,
        mut read: impl FnMut() -> io::Result<Vec<u8>>,
    ) -> Result<Ledger, StoreError> {
        let data = self.retry.run("read", &self.path, &mut read)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl LedgerBackend for JsonFileBackend {
    fn load(&self) -> Result<Ledger, StoreError> {
        if !self.path.exists() {
            let empty = Ledger::new();
            self.commit(&empty)?;
            info!(path = %self.path.display(), "created empty ledger");
            return Ok(empty);
        }
        self.load_with(|| fs::read(&self.path))
    }

    fn commit(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(ledger)?;
        let tmp = self.tmp_path();
        self.retry.run("write", &self.path, || {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&tmp, &data)?;
            fs::rename(&tmp, &self.path)
        })?;
        Ok(())
    }
}

/// In-process ledger, for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    ledger: Mutex<Ledger>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
        }
    }
}

impl LedgerBackend for MemoryBackend {
    fn load(&self) -> Result<Ledger, StoreError> {
        Ok(self.ledger.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn commit(&self, ledger: &Ledger) -> Result<(), StoreError> {
        *self.ledger.lock().unwrap_or_else(PoisonError::into_inner) = ledger.clone();
        Ok(())
    }
}
