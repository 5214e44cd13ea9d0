//! Offline Buffer Controller
//!
//! Owns the append-only log and a periodic tick. On every tick the replay
//! condition is evaluated:
//!
//! ```text
//!            ┌──────tick──────┐
//!            │                ▼
//!         ┌──────┐       ┌──────────┐  true   ┌───────────┐
//!         │ Idle │◄──────│ Deciding │────────►│ Replaying │──┐
//!         └──────┘       └──────────┘         └───────────┘  │
//!            ▲                │ false                        │
//!            │                ▼                              │
//!            │          ┌──────────┐                         │
//!            └──────────│ Evicting │◄────────────────────────┘
//!                       └──────────┘        (both return to Idle)
//! ```
//!
//! The timer is re-armed whatever the outcome of a tick. Tick outcomes are
//! logged and otherwise discarded.
//!
//! Decision cycles never overlap. An explicit [`OfflineBuffer::tick`] waits
//! its turn behind a running cycle; a timer tick that finds one running is
//! skipped.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::condition::Condition;
use super::config::BufferConfig;
use super::stats::{BufferStats, StatsCollector};
use super::timer::TickHandle;
use crate::error::BufferResult;
use crate::event_log::{AppendLog, Record};
use crate::serializer::Serializer;
use crate::storage::Storage;

/// Handler invoked once per replayed record, with the original payload
pub type RecordHandler<T> = Arc<dyn Fn(T) + Send + Sync>;

/// What the controller is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Waiting for the next tick
    Idle,
    /// Evaluating the replay condition
    Deciding,
    /// Draining the log into the handler
    Replaying,
    /// Checking the log size, maybe discarding it
    Evicting,
}

/// Result of one replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Records handed to the handler
    pub delivered: usize,
    /// Lines that did not decode and were skipped
    pub dropped: usize,
}

/// Result of one decision cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Condition held; the log was drained
    Replayed(ReplayReport),
    /// Condition failed and the log was over the limit; it was discarded
    Evicted,
    /// Condition failed and the log was within the limit
    Kept,
    /// Timer tick skipped; another decision cycle was still running
    Busy,
}

/// Builder for [`OfflineBuffer`]
pub struct OfflineBufferBuilder<T> {
    config: BufferConfig,
    storage: Option<Arc<dyn Storage>>,
    condition: Condition,
    on_record: RecordHandler<T>,
}

impl<T> OfflineBufferBuilder<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Use custom storage instead of the local file system
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replay condition; defaults to always true
    pub fn condition(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = condition.into();
        self
    }

    /// Handler for replayed payloads; defaults to discarding them
    pub fn on_record<F>(mut self, handler: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on_record = Arc::new(handler);
        self
    }

    /// Build the buffer and arm its timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> OfflineBuffer<T> {
        let log = match self.storage {
            Some(storage) => AppendLog::with_storage(&self.config.log_path, storage),
            None => AppendLog::open(&self.config.log_path),
        };

        let inner = Arc::new(Inner {
            log,
            size_limit_bytes: self.config.size_limit_bytes,
            condition: RwLock::new(self.condition),
            on_record: self.on_record,
            state: Mutex::new(BufferState::Idle),
            decisions: Serializer::new(),
            stats: StatsCollector::default(),
        });

        let task = tokio::spawn(run_ticks(
            Arc::clone(&inner),
            self.config.tick_interval,
            self.config.replay_immediately,
        ));

        info!(
            path = %self.config.log_path.display(),
            interval_ms = self.config.tick_interval.as_millis() as u64,
            size_limit = self.config.size_limit_bytes,
            "offline buffer started"
        );

        OfflineBuffer {
            inner,
            config: self.config,
            ticker: TickHandle::new(task),
        }
    }
}

/// Local buffer that records payloads while offline and replays them when
/// its condition says the consumer is reachable.
///
/// Dropping the buffer disarms its timer.
pub struct OfflineBuffer<T> {
    inner: Arc<Inner<T>>,
    config: BufferConfig,
    ticker: TickHandle,
}

impl<T> OfflineBuffer<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Start configuring a buffer
    pub fn builder(config: BufferConfig) -> OfflineBufferBuilder<T> {
        OfflineBufferBuilder {
            config,
            storage: None,
            condition: Condition::always(),
            on_record: Arc::new(|_: T| {}),
        }
    }

    /// Append `data` to the log
    pub async fn record(&self, data: &T) -> BufferResult<()> {
        self.inner.log.append(data).await?;
        self.inner.stats.record_appended();
        Ok(())
    }

    /// Drain the log and deliver every decodable record, in order
    pub async fn replay(&self) -> BufferResult<ReplayReport> {
        self.inner.replay().await
    }

    /// Discard the log if it is over the configured size limit
    pub async fn evict_if_oversized(&self) -> BufferResult<bool> {
        self.inner.evict_if_oversized().await
    }

    /// Run one decision cycle now, outside the timer.
    ///
    /// Waits for a cycle that is already running to finish first.
    pub async fn tick(&self) -> BufferResult<TickOutcome> {
        self.inner.decide().await
    }

    /// Disarm the timer. Work already admitted to the log still completes.
    pub fn stop(&self) {
        if self.ticker.is_active() {
            info!(path = %self.config.log_path.display(), "offline buffer stopped");
        }
        self.ticker.cancel();
    }

    /// Whether the timer is still armed
    pub fn is_running(&self) -> bool {
        self.ticker.is_active()
    }

    /// Replace the replay condition for subsequent ticks
    pub fn set_condition(&self, condition: impl Into<Condition>) {
        *self.inner.condition.write() = condition.into();
    }

    pub fn state(&self) -> BufferState {
        *self.inner.state.lock()
    }

    pub fn stats(&self) -> BufferStats {
        self.inner.stats.snapshot()
    }

    pub fn log(&self) -> &AppendLog {
        &self.inner.log
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }
}

struct Inner<T> {
    log: AppendLog,
    size_limit_bytes: u64,
    condition: RwLock<Condition>,
    on_record: RecordHandler<T>,
    state: Mutex<BufferState>,
    decisions: Serializer,
    stats: StatsCollector,
}

impl<T> Inner<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn decide(&self) -> BufferResult<TickOutcome> {
        let _turn = self.decisions.acquire().await;
        self.run_decision().await
    }

    async fn decide_if_idle(&self) -> BufferResult<TickOutcome> {
        match self.decisions.try_acquire() {
            Some(_turn) => self.run_decision().await,
            None => Ok(TickOutcome::Busy),
        }
    }

    async fn run_decision(&self) -> BufferResult<TickOutcome> {
        self.set_state(BufferState::Deciding);
        let _idle = ReturnToIdle(&self.state);

        let condition = self.condition.read().clone();
        if condition.evaluate().await {
            self.set_state(BufferState::Replaying);
            let report = self.replay().await?;
            Ok(TickOutcome::Replayed(report))
        } else {
            self.set_state(BufferState::Evicting);
            if self.evict_if_oversized().await? {
                Ok(TickOutcome::Evicted)
            } else {
                Ok(TickOutcome::Kept)
            }
        }
    }

    async fn replay(&self) -> BufferResult<ReplayReport> {
        let content = self.log.flush().await?;
        let report = self.deliver(&content);
        self.stats.replay_finished(&report);

        if report.delivered > 0 || report.dropped > 0 {
            info!(
                delivered = report.delivered,
                dropped = report.dropped,
                "replayed offline log"
            );
        }
        Ok(report)
    }

    fn deliver(&self, content: &str) -> ReplayReport {
        let mut report = ReplayReport::default();

        for (index, line) in drained_lines(content).into_iter().enumerate() {
            match Record::<T>::from_json_line(line) {
                Ok(record) => {
                    (self.on_record)(record.data);
                    report.delivered += 1;
                }
                Err(e) => {
                    debug!(line = index + 1, error = %e, "dropping undecodable log line");
                    report.dropped += 1;
                }
            }
        }

        report
    }

    async fn evict_if_oversized(&self) -> BufferResult<bool> {
        let evicted = self.log.evict_if_oversized(self.size_limit_bytes).await?;
        if evicted {
            self.stats.evicted();
        }
        Ok(evicted)
    }

    fn set_state(&self, state: BufferState) {
        *self.state.lock() = state;
    }
}

/// Puts the controller back to `Idle` however a decision cycle ends
struct ReturnToIdle<'a>(&'a Mutex<BufferState>);

impl Drop for ReturnToIdle<'_> {
    fn drop(&mut self) {
        *self.0.lock() = BufferState::Idle;
    }
}

/// Split drained content into lines, minus the empty artifact after the
/// final terminator
fn drained_lines(content: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = content.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

async fn run_ticks<T>(inner: Arc<Inner<T>>, period: Duration, replay_immediately: bool)
where
    T: DeserializeOwned + Send + 'static,
{
    if let Err(e) = inner.log.recover().await {
        warn!(error = %e, "could not recover interrupted flush");
    }

    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick of an interval completes immediately
    ticker.tick().await;
    if replay_immediately {
        spawn_decision(&inner);
    }

    loop {
        ticker.tick().await;
        spawn_decision(&inner);
    }
}

/// Decisions run detached so the timer never waits on them and teardown
/// never interrupts a replay halfway through delivery.
fn spawn_decision<T>(inner: &Arc<Inner<T>>)
where
    T: DeserializeOwned + Send + 'static,
{
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        match inner.decide_if_idle().await {
            Ok(outcome) => debug!(?outcome, "tick finished"),
            Err(e) => warn!(error = %e, "tick failed, retrying next interval"),
        }
    });
}
