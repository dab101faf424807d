//! In-memory transport for testing.
//!
//! [`MockTransport`] records every chunk written to it and lets tests push
//! notification fragments into the subscribed callback, either directly
//! with [`MockTransport::notify`] or as a scripted reply to the next write
//! with [`MockTransport::queue_reply`]. Clones share state, so a test can
//! hand one clone to a [`Session`](crate::Session) and drive it with another.
//!
//! # Example
//!
//! ```
//! use miramode_core::{ClientIdentity, MockTransport, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = MockTransport::new();
//!     let identity = ClientIdentity::new(12345, 1).unwrap();
//!     let mut session = Session::open(mock.clone(), Some(identity), SessionConfig::default())
//!         .await
//!         .unwrap();
//!
//!     // Nickname "Shower", padded to 16 bytes, addressed to slot 1.
//!     let mut reply = vec![0x41, 0x00, 16];
//!     reply.extend_from_slice(b"Shower\0\0\0\0\0\0\0\0\0\0");
//!     mock.queue_reply(vec![reply]);
//!
//!     assert_eq!(session.nickname().await.unwrap(), "Shower");
//!     assert_eq!(mock.writes().len(), 1);
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::transport::{CharacteristicId, FragmentCallback, Transport};
use crate::uuid::MIRA_WRITE;

#[derive(Default)]
struct Inner {
    writes: Mutex<Vec<Vec<u8>>>,
    callback: Mutex<Option<Arc<FragmentCallback>>>,
    replies: Mutex<VecDeque<Vec<Vec<u8>>>>,
    characteristics: Mutex<HashMap<CharacteristicId, Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_subscribe: AtomicBool,
    subscribe_count: AtomicU32,
}

/// A scriptable in-memory [`Transport`].
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("writes", &lock(&self.inner.writes).len())
            .field("subscribed", &self.is_subscribed())
            .field("queued_replies", &lock(&self.inner.replies).len())
            .finish_non_exhaustive()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock a mock mutex, recovering from poisoning caused by a panicking test.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    /// Create a mock with default identification strings.
    pub fn new() -> Self {
        let mock = Self {
            inner: Arc::new(Inner::default()),
        };
        mock.set_characteristic(CharacteristicId::DeviceName, b"Mira Mode".to_vec());
        mock.set_characteristic(CharacteristicId::ModelNumber, b"Mode Dual".to_vec());
        mock.set_characteristic(CharacteristicId::Manufacturer, b"Kohler Mira Ltd".to_vec());
        mock
    }

    /// Set the raw value returned for an identification characteristic.
    pub fn set_characteristic(&self, id: CharacteristicId, value: Vec<u8>) {
        lock(&self.inner.characteristics).insert(id, value);
    }

    /// Remove an identification characteristic so reads of it fail.
    pub fn remove_characteristic(&self, id: CharacteristicId) {
        lock(&self.inner.characteristics).remove(&id);
    }

    /// Deliver `fragments` to the subscriber on the next write.
    ///
    /// Replies are consumed in the order they were queued, one per write.
    pub fn queue_reply(&self, fragments: Vec<Vec<u8>>) {
        lock(&self.inner.replies).push_back(fragments);
    }

    /// Push one fragment to the subscriber now.
    ///
    /// Returns `false` if nothing is subscribed.
    pub fn notify(&self, fragment: &[u8]) -> bool {
        let callback = lock(&self.inner.callback).clone();
        match callback {
            Some(callback) => {
                callback(fragment);
                true
            }
            None => false,
        }
    }

    /// Every chunk written so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.inner.writes).clone()
    }

    /// Forget recorded writes.
    pub fn clear_writes(&self) {
        lock(&self.inner.writes).clear();
    }

    /// Whether a callback is registered.
    pub fn is_subscribed(&self) -> bool {
        lock(&self.inner.callback).is_some()
    }

    /// How many times `subscribe` succeeded.
    pub fn subscribe_count(&self) -> u32 {
        self.inner.subscribe_count.load(Ordering::Relaxed)
    }

    /// Make subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent subscriptions fail.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.inner.fail_subscribe.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write(&self, chunk: &[u8]) -> Result<()> {
        if self.inner.fail_writes.load(Ordering::Relaxed) {
            return Err(Error::WriteFailed {
                uuid: MIRA_WRITE.to_string(),
                reason: "mock write failure".to_string(),
            });
        }
        lock(&self.inner.writes).push(chunk.to_vec());

        let reply = lock(&self.inner.replies).pop_front();
        if let Some(fragments) = reply {
            for fragment in &fragments {
                self.notify(fragment);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, on_fragment: FragmentCallback) -> Result<()> {
        if self.inner.fail_subscribe.load(Ordering::Relaxed) {
            return Err(Error::NotConnected);
        }
        *lock(&self.inner.callback) = Some(Arc::new(on_fragment));
        self.inner.subscribe_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn read_characteristic(&self, id: CharacteristicId) -> Result<Vec<u8>> {
        lock(&self.inner.characteristics)
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::characteristic_not_found(id.uuid().to_string(), 0))
    }
}
