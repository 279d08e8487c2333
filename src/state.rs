//! # Published Capture State
//!
//! Lock-light handoff between worker threads and readers (the preview
//! server, status commands). Workers publish a finished PNG atomically;
//! readers grab a cheap `Arc` clone without blocking the publisher.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

struct Shared {
    running: AtomicBool,
    timestamp_millis: AtomicI64,
    bytes: Mutex<Option<Arc<[u8]>>>,
}

/// Cloneable handle onto one capture kind's published output.
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<Shared>,
}

impl StateHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                running: AtomicBool::new(false),
                timestamp_millis: AtomicI64::new(0),
                bytes: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.inner.running.store(running, Ordering::Release);
    }

    /// Replace the published image. Bytes first, then the timestamp, so a
    /// reader that sees the new timestamp also sees the new bytes.
    pub(crate) fn publish(&self, bytes: Arc<[u8]>, timestamp_millis: i64) {
        if let Ok(mut slot) = self.inner.bytes.lock() {
            *slot = Some(bytes);
        }
        self.inner
            .timestamp_millis
            .store(timestamp_millis, Ordering::Release);
    }

    pub fn running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Latest encoded PNG, if any capture has completed.
    pub fn latest_bytes(&self) -> Option<Arc<[u8]>> {
        self.inner.bytes.lock().ok().and_then(|slot| slot.clone())
    }

    /// Unix milliseconds of the latest publication, 0 before the first.
    pub fn latest_timestamp_millis(&self) -> i64 {
        self.inner.timestamp_millis.load(Ordering::Acquire)
    }

    pub fn available(&self) -> bool {
        self.inner
            .bytes
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_survives_stop() {
        let state = StateHandle::new();
        assert!(!state.available());
        assert_eq!(state.latest_timestamp_millis(), 0);

        state.set_running(true);
        state.publish(Arc::from(vec![1u8, 2, 3]), 1234);
        state.set_running(false);

        assert!(!state.running());
        assert!(state.available());
        assert_eq!(state.latest_timestamp_millis(), 1234);
        assert_eq!(&*state.latest_bytes().unwrap(), &[1u8, 2, 3]);
    }

    #[test]
    fn test_clones_share_storage() {
        let state = StateHandle::new();
        let reader = state.clone();
        state.publish(Arc::from(vec![9u8]), 7);
        assert_eq!(&*reader.latest_bytes().unwrap(), &[9u8]);
    }
}
