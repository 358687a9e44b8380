//! Progress callback management for transfer operations
//!
//! Uploads report (bytes acknowledged, target size) once per chunk and
//! downloads report (bytes written, content length) once per received chunk.
//! The wrapper keeps the closure behind `Arc<Mutex>` so one callback can be
//! shared across retries and cloned into both transfer directions.

use std::sync::{Arc, Mutex};

/// Boxed progress closure taking (bytes done, total bytes).
pub type TransferCallbackInner = Box<dyn FnMut(u64, u64) + Send>;

/// A thread-safe, cloneable wrapper around a progress closure.
pub struct TransferCallback {
    inner: Arc<Mutex<TransferCallbackInner>>,
}

impl Clone for TransferCallback {
    fn clone(&self) -> Self {
        TransferCallback {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl TransferCallback {
    pub fn new(f: TransferCallbackInner) -> Self {
        TransferCallback {
            inner: Arc::new(Mutex::new(f)),
        }
    }

    /// Wraps a closure into a `TransferCallback` instance.
    pub fn wrap<F>(closure: F) -> Self
    where
        F: FnMut(u64, u64) + Send + 'static,
    {
        TransferCallback::new(Box::new(closure))
    }

    /// Invoke the callback with the current progress.
    pub fn call(&self, done: u64, total: u64) {
        let mut f = self.inner.lock().unwrap();
        f(done, total);
    }
}
