use crate::core::credentials::redact;
use crate::core::error::{RemoteError, RotationError};
use log::{debug, warn};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin failover over a pool of API keys.
///
/// The cursor remembers the key that last succeeded, so every call starts with
/// whichever key is currently healthy. Quota and invalid-key failures move on to
/// the next key (each key is tried at most once per call); any other failure is
/// returned as-is without touching the cursor.
#[derive(Debug, Default)]
pub struct CredentialRotator {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl CredentialRotator {
    pub fn new(keys: Vec<String>) -> Self {
        let keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    pub async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, RotationError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let keys = &self.keys;
        if keys.is_empty() {
            return Err(RotationError::NoCredentials);
        }

        let start = self.cursor.load(Ordering::Acquire) % keys.len();
        let mut last = None;

        for attempt in 0..keys.len() {
            let index = (start + attempt) % keys.len();
            match op(keys[index].clone()).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("Switched to API key #{} after {} failure(s)", index, attempt);
                    }
                    self.cursor.store(index, Ordering::Release);
                    return Ok(value);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(
                        "API key #{} ({}) failed: {}. Trying next key.",
                        index,
                        redact(&keys[index]),
                        e
                    );
                    last = Some(e);
                }
                Err(e) => return Err(RotationError::Remote(e)),
            }
        }

        Err(last.map_or(RotationError::NoCredentials, |last| RotationError::Exhausted {
            attempts: keys.len(),
            last,
        }))
    }
}
