//! In-memory session storage with idle expiry.
//!
//! Suitable for single-instance deployments. Sessions are lost when the
//! process restarts.
//!
//! Records sit in an LRU-ordered map: every value access moves the record to
//! the front and stamps its access time, so the least recently used record is
//! always at the back. A sweep pops from the back until it meets a record that
//! is still alive; everything in front of that one is fresher, so the sweep
//! never walks live sessions.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use lru::LruCache;
use tokio::task::JoinHandle;

use super::{Session, SessionProvider, SessionValue, SessionValues};
use crate::SessionError;
use crate::config::DEFAULT_GC_INTERVAL_SECS;
use crate::crypto::id_prefix;
use crate::http::{RequestCookies, ResponseCookies};

struct SessionRecord {
    last_accessed: DateTime<Utc>,
    values: Arc<Mutex<SessionValues>>,
}

struct MemoryState {
    lifetime_secs: u64,
    /// Most recently used at the front.
    sessions: LruCache<String, SessionRecord>,
}

impl MemoryState {
    /// `None` when the lifetime is zero or too large to ever elapse.
    fn ttl(&self) -> Option<TimeDelta> {
        if self.lifetime_secs == 0 {
            return None;
        }
        TimeDelta::try_seconds(i64::try_from(self.lifetime_secs).ok()?)
    }

    /// Removes records idle for longer than the lifetime.
    ///
    /// A record whose last access is exactly `now - lifetime` is still alive;
    /// only strictly older records expire.
    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let Some(ttl) = self.ttl() else {
            return 0;
        };

        let mut removed = 0;
        while let Some((_, record)) = self.sessions.peek_lru() {
            let expired = record
                .last_accessed
                .checked_add_signed(ttl)
                .is_some_and(|deadline| deadline < now);
            if !expired {
                break;
            }
            self.sessions.pop_lru();
            removed += 1;
        }
        removed
    }

    fn touch(&mut self, session_id: &str, now: DateTime<Utc>) {
        if let Some(record) = self.sessions.get_mut(session_id) {
            record.last_accessed = now;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, SessionError> {
    mutex.lock().map_err(|_| SessionError::LockPoisoned)
}

fn sweep_shared(state: &Mutex<MemoryState>) -> Result<usize, SessionError> {
    Ok(lock(state)?.sweep(Utc::now()))
}

/// In-memory session provider.
///
/// Share one instance (behind an `Arc`) across all request handlers. A
/// background sweeper is armed by the first [`run_gc`](SessionProvider::run_gc)
/// made inside a Tokio runtime; it stops on [`shutdown`](SessionProvider::shutdown)
/// or when the provider is dropped.
pub struct MemoryProvider {
    state: Arc<Mutex<MemoryState>>,
    gc_interval: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryProvider {
    /// Creates a provider sweeping every five minutes.
    pub fn new() -> Self {
        Self::with_gc_interval(Duration::from_secs(DEFAULT_GC_INTERVAL_SECS))
    }

    /// Creates a provider with a custom sweep period. A zero period falls back to the default.
    pub fn with_gc_interval(gc_interval: Duration) -> Self {
        let gc_interval = if gc_interval.is_zero() {
            Duration::from_secs(DEFAULT_GC_INTERVAL_SECS)
        } else {
            gc_interval
        };

        Self {
            state: Arc::new(Mutex::new(MemoryState {
                lifetime_secs: 0,
                sessions: LruCache::unbounded(),
            })),
            gc_interval,
            sweeper: Mutex::new(None),
        }
    }

    /// Returns the number of sessions currently stored.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .map(|guard| guard.sessions.len())
            .unwrap_or(0)
    }

    /// Returns true if there are no sessions stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks for a session without refreshing it.
    pub fn contains(&self, session_id: &str) -> bool {
        self.state
            .lock()
            .map(|guard| guard.sessions.contains(session_id))
            .unwrap_or(false)
    }

    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    fn arm_sweeper(&self) -> Result<(), SessionError> {
        let mut sweeper = lock(&self.sweeper)?;
        if sweeper.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!(target: "enclave_session::memory", "msg=\"no tokio runtime, periodic sweeping disabled\"");
            return Ok(());
        };

        let period = self.gc_interval;
        let Some(start) = tokio::time::Instant::now().checked_add(period) else {
            log::warn!(target: "enclave_session::memory", "msg=\"gc interval out of range, periodic sweeping disabled\"");
            return Ok(());
        };

        let weak = Arc::downgrade(&self.state);
        *sweeper = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                // The provider is gone once the last strong reference drops.
                let Some(state) = weak.upgrade() else {
                    break;
                };
                match sweep_shared(&state) {
                    Ok(0) => {}
                    Ok(removed) => {
                        log::debug!(target: "enclave_session::memory", "msg=\"sweep finished\" removed={removed}");
                    }
                    Err(e) => {
                        log::error!(target: "enclave_session::memory", "msg=\"sweep failed, stopping sweeper\" error=\"{e}\"");
                        break;
                    }
                }
            }
        }));

        log::debug!(target: "enclave_session::memory", "msg=\"sweeper armed\" interval_secs={}", period.as_secs());
        Ok(())
    }

    fn stop_sweeper(&self) {
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(handle) = sweeper.take() {
                handle.abort();
                log::debug!(target: "enclave_session::memory", "msg=\"sweeper stopped\"");
            }
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryProvider {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

impl SessionProvider for MemoryProvider {
    fn initialize(&self, lifetime_secs: u64) -> Result<(), SessionError> {
        lock(&self.state)?.lifetime_secs = lifetime_secs;
        Ok(())
    }

    fn lifetime_secs(&self) -> Result<u64, SessionError> {
        Ok(lock(&self.state)?.lifetime_secs)
    }

    fn get_or_create(
        &self,
        session_id: &str,
        _request: &dyn RequestCookies,
    ) -> Result<Box<dyn Session>, SessionError> {
        let values = {
            let mut state = lock(&self.state)?;
            if let Some(record) = state.sessions.peek(session_id) {
                Arc::clone(&record.values)
            } else {
                let values = Arc::new(Mutex::new(SessionValues::new()));
                state.sessions.push(
                    session_id.to_owned(),
                    SessionRecord {
                        last_accessed: Utc::now(),
                        values: Arc::clone(&values),
                    },
                );
                log::debug!(target: "enclave_session::memory", "msg=\"session created\" session=\"{}\"", id_prefix(session_id));
                values
            }
        };

        Ok(Box::new(MemorySession {
            id: session_id.to_owned(),
            values,
            state: Arc::clone(&self.state),
        }))
    }

    fn destroy(
        &self,
        session_id: &str,
        _response: &mut dyn ResponseCookies,
    ) -> Result<(), SessionError> {
        if lock(&self.state)?.sessions.pop(session_id).is_some() {
            log::debug!(target: "enclave_session::memory", "msg=\"session destroyed\" session=\"{}\"", id_prefix(session_id));
        }
        Ok(())
    }

    fn run_gc(&self) -> Result<usize, SessionError> {
        let (removed, expiring) = {
            let mut state = lock(&self.state)?;
            (state.sweep(Utc::now()), state.lifetime_secs > 0)
        };

        if removed > 0 {
            log::info!(target: "enclave_session::memory", "msg=\"expired sessions removed\" removed={removed}");
        }
        if expiring {
            self.arm_sweeper()?;
        }
        Ok(removed)
    }

    fn shutdown(&self) {
        self.stop_sweeper();
    }
}

/// Handle on a session held by a [`MemoryProvider`].
///
/// Every `get`, `set` and `delete` marks the session as recently used.
/// A handle outliving its session (destroyed or expired) keeps working on
/// its own detached copy of the values.
pub struct MemorySession {
    id: String,
    values: Arc<Mutex<SessionValues>>,
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySession {
    fn refresh(&self) -> Result<(), SessionError> {
        lock(&self.state)?.touch(&self.id, Utc::now());
        Ok(())
    }
}

impl Session for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Result<Option<SessionValue>, SessionError> {
        self.refresh()?;
        Ok(lock(&self.values)?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: SessionValue) -> Result<(), SessionError> {
        self.refresh()?;
        lock(&self.values)?.insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), SessionError> {
        self.refresh()?;
        lock(&self.values)?.remove(key);
        Ok(())
    }

    fn finalize(&mut self, _response: &mut dyn ResponseCookies) -> Result<(), SessionError> {
        Ok(())
    }
}
