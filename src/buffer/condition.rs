//! Replay conditions
//!
//! Each tick the buffer asks its condition whether the consumer is reachable.
//! A condition can be a plain closure, an async closure, or an [`OnlineFlag`]
//! flipped by the application.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

type CheckFn = dyn Fn() -> BoxFuture<'static, bool> + Send + Sync;

/// Zero-argument predicate deciding replay (true) vs. eviction (false)
#[derive(Clone)]
pub struct Condition {
    check: Arc<CheckFn>,
}

impl Condition {
    /// Always replay
    pub fn always() -> Self {
        Self::from_fn(|| true)
    }

    /// Never replay; only evict
    pub fn never() -> Self {
        Self::from_fn(|| false)
    }

    /// Synchronous predicate
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(move || futures::future::ready(f()).boxed()),
        }
    }

    /// Asynchronous predicate
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            check: Arc::new(move || f().boxed()),
        }
    }

    /// Evaluate the predicate once
    pub async fn evaluate(&self) -> bool {
        (self.check)().await
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::always()
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Condition(..)")
    }
}

impl From<OnlineFlag> for Condition {
    fn from(flag: OnlineFlag) -> Self {
        Self::from_fn(move || flag.is_online())
    }
}

/// Shared connectivity switch, for applications that are told about
/// connectivity changes rather than polling for them
#[derive(Debug, Clone, Default)]
pub struct OnlineFlag {
    online: Arc<AtomicBool>,
}

impl OnlineFlag {
    /// Create a flag, initially offline
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self) {
        self.online.store(true, Ordering::SeqCst);
    }

    pub fn set_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Condition that follows this flag
    pub fn condition(&self) -> Condition {
        Condition::from(self.clone())
    }
}
