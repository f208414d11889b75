//! Persistence for scanner state.
//!
//! Two JSON documents live on the local filesystem:
//!
//! ```text
//! data/
//! ├── state.json      # seen URLs, delivery records, rate limit usage
//! └── channels.json   # owning group → destination channel
//! ```
//!
//! Both are loaded permissively and saved with an atomic rename. Neither ever
//! fails a caller because of disk I/O.

pub mod channels;
pub mod local;
pub mod rate_limit;
pub mod snapshot;
pub mod state;

use std::sync::{Arc, Mutex, PoisonError};

// Re-export for convenience
pub use channels::ChannelRegistry;
pub use local::JsonFile;
pub use rate_limit::{Admission, UsageLedger, unix_now};
pub use snapshot::{Decoded, PostRecord, StateSnapshot};
pub use state::StateStore;

/// Process-wide handle to a store.
///
/// Access goes through short closures so a lock is never held across an
/// `.await`.
#[derive(Debug)]
pub struct Shared<T>(Arc<Mutex<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    /// Run `f` with exclusive access to the inner value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}
