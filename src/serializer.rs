//! Exclusive Access Serializer
//!
//! A FIFO mutual-exclusion primitive for async work. At most one owner holds
//! the serializer at a time; everyone else waits in arrival order and is
//! handed ownership directly when its predecessor releases.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use off_the_grid::serializer::Serializer;
//!
//! # async fn demo() {
//! let serializer = Arc::new(Serializer::new());
//!
//! // Scoped: released when the permit drops
//! let permit = serializer.acquire().await;
//! drop(permit);
//!
//! // Whole unit of work, on the blocking pool, run to completion
//! let answer = serializer.run_blocking(|| 42).await.unwrap();
//! assert_eq!(answer, 42);
//! # }
//! ```
//!
//! There are no timeouts and no reentrancy: acquiring twice from the same
//! task without releasing deadlocks.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinError;

#[derive(Debug, Default)]
struct State {
    held: bool,
    waiting: VecDeque<oneshot::Sender<()>>,
}

/// FIFO async lock over an arbitrary unit of work
#[derive(Debug, Default)]
pub struct Serializer {
    state: Mutex<State>,
}

impl Serializer {
    /// Create a new, unheld serializer
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for ownership.
    ///
    /// Returns without yielding when the serializer is free.
    pub async fn acquire(&self) -> Permit<'_> {
        self.wait_for_turn().await;
        Permit { serializer: self }
    }

    /// Take ownership only if nobody holds it right now
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut state = self.state.lock();
        if state.held {
            return None;
        }
        state.held = true;
        Some(Permit { serializer: self })
    }

    /// Wait for ownership, returning a permit that can move into another task
    pub async fn acquire_owned(self: Arc<Self>) -> OwnedPermit {
        self.wait_for_turn().await;
        OwnedPermit { serializer: self }
    }

    /// Run `work` while holding the serializer
    pub async fn run<F: Future>(&self, work: F) -> F::Output {
        let _permit = self.acquire().await;
        work.await
    }

    /// Run blocking `work` on tokio's blocking pool while holding the serializer.
    ///
    /// Ownership is taken in the caller's task, so submission order is kept.
    /// Once admitted the work always runs to completion, even if the caller
    /// stops waiting for the result.
    pub async fn run_blocking<F, R>(self: &Arc<Self>, work: F) -> Result<R, JoinError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let permit = Arc::clone(self).acquire_owned().await;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        })
        .await
    }

    /// Release ownership, handing it to the next waiter if there is one.
    ///
    /// Only pair this with [`Permit::detach`] or [`OwnedPermit::detach`];
    /// permits release themselves when dropped.
    ///
    /// # Panics
    ///
    /// Panics if the serializer is not held. That is a caller bug.
    pub fn release(&self) {
        let mut state = self.state.lock();
        assert!(state.held, "serializer released while not held");

        while let Some(next) = state.waiting.pop_front() {
            // A closed receiver is a waiter that gave up; try the next one
            if next.send(()).is_ok() {
                return;
            }
        }

        state.held = false;
    }

    /// Whether some owner currently holds the serializer
    pub fn is_held(&self) -> bool {
        self.state.lock().held
    }

    /// Number of queued waiters
    pub fn waiting_len(&self) -> usize {
        self.state.lock().waiting.len()
    }

    async fn wait_for_turn(&self) {
        loop {
            let rx = {
                let mut state = self.state.lock();
                if !state.held {
                    state.held = true;
                    return;
                }
                let (tx, rx) = oneshot::channel();
                state.waiting.push_back(tx);
                rx
            };

            let mut waiter = Waiter {
                serializer: self,
                rx,
                granted: false,
            };
            if waiter.wait().await {
                return;
            }
        }
    }
}

/// A queued acquire. If dropped after ownership was handed to it but before
/// it noticed, ownership moves on to the next waiter.
struct Waiter<'a> {
    serializer: &'a Serializer,
    rx: oneshot::Receiver<()>,
    granted: bool,
}

impl Waiter<'_> {
    async fn wait(&mut self) -> bool {
        self.granted = (&mut self.rx).await.is_ok();
        self.granted
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if self.granted {
            return;
        }
        self.rx.close();
        if self.rx.try_recv().is_ok() {
            self.serializer.release();
        }
    }
}

/// Proof of ownership, released on drop
#[must_use = "the serializer is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct Permit<'a> {
    serializer: &'a Serializer,
}

impl Permit<'_> {
    /// Release now
    pub fn release(self) {
        drop(self);
    }

    /// Keep ownership without the guard; the caller must call
    /// [`Serializer::release`] exactly once later.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.serializer.release();
    }
}

/// Owned counterpart of [`Permit`]
#[must_use = "the serializer is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct OwnedPermit {
    serializer: Arc<Serializer>,
}

impl OwnedPermit {
    /// Release now
    pub fn release(self) {
        drop(self);
    }

    /// Keep ownership without the guard; the caller must call
    /// [`Serializer::release`] exactly once later.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for OwnedPermit {
    fn drop(&mut self) {
        self.serializer.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for_waiters(serializer: &Serializer, count: usize) {
        while serializer.waiting_len() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_acquire_when_free_is_immediate() {
        let serializer = Serializer::new();
        assert!(!serializer.is_held());

        let permit = serializer.acquire().await;
        assert!(serializer.is_held());

        permit.release();
        assert!(!serializer.is_held());
    }

    #[tokio::test]
    async fn test_try_acquire_never_waits() {
        let serializer = Serializer::new();

        let permit = serializer.try_acquire().unwrap();
        assert!(serializer.try_acquire().is_none());
        assert_eq!(serializer.waiting_len(), 0);

        permit.release();
        assert!(serializer.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_only_one_owner_at_a_time() {
        let serializer = Arc::new(Serializer::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = serializer.acquire().await;

        let s = Arc::clone(&serializer);
        let o = Arc::clone(&order);
        let second = tokio::spawn(async move {
            s.run(async {
                o.lock().push("second");
            })
            .await;
        });

        wait_for_waiters(&serializer, 1).await;

        // The second task is parked behind us even while we sleep
        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().push("first");
        first.release();

        second.await.unwrap();
        assert_eq!(*order.lock(), vec!["first", "second"]);
        assert!(!serializer.is_held());
    }

    #[tokio::test]
    async fn test_waiters_run_in_arrival_order() {
        let serializer = Arc::new(Serializer::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let gate = serializer.acquire().await;

        let mut tasks = Vec::new();
        for i in 0..5u64 {
            let s = Arc::clone(&serializer);
            let o = Arc::clone(&order);
            tasks.push(tokio::spawn(async move {
                s.run(async {
                    // Later arrivals finish their work faster
                    tokio::time::sleep(Duration::from_millis(10 * (5 - i))).await;
                    o.lock().push(i);
                })
                .await;
            }));
            wait_for_waiters(&serializer, i as usize + 1).await;
        }

        gate.release();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_leak_ownership() {
        let serializer = Arc::new(Serializer::new());
        let gate = serializer.acquire().await;

        let s = Arc::clone(&serializer);
        let abandoned = tokio::spawn(async move {
            let _permit = s.acquire().await;
            std::future::pending::<()>().await;
        });
        wait_for_waiters(&serializer, 1).await;
        abandoned.abort();
        let _ = abandoned.await;

        gate.release();

        let again = tokio::time::timeout(Duration::from_secs(1), serializer.acquire()).await;
        assert!(again.is_ok(), "ownership leaked to a cancelled waiter");
    }

    #[tokio::test]
    async fn test_detached_permit_released_by_hand() {
        let serializer = Arc::new(Serializer::new());

        Arc::clone(&serializer).acquire_owned().await.detach();
        assert!(serializer.is_held());

        serializer.release();
        assert!(!serializer.is_held());
    }

    #[test]
    #[should_panic(expected = "serializer released while not held")]
    fn test_release_without_acquire_panics() {
        let serializer = Serializer::new();
        serializer.release();
    }

    #[tokio::test]
    async fn test_run_blocking_serializes_work() {
        let serializer = Arc::new(Serializer::new());
        let inside = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let s = Arc::clone(&serializer);
            let inside = Arc::clone(&inside);
            tasks.push(tokio::spawn(async move {
                s.run_blocking(move || {
                    let now = inside.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                    now
                })
                .await
                .unwrap()
            }));
        }

        for task in tasks {
            // Nobody else was inside when each unit of work started
            assert_eq!(task.await.unwrap(), 0);
        }
        assert!(!serializer.is_held());
    }
}
