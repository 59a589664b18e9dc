//! Lazily acquired, idle-released connection to the presence backend.
//!
//! The first operation opens the connection. Every operation holds a
//! [`LeaseGuard`] while it runs; dropping the guard (on success, error or
//! cancellation alike) marks the connection idle again. A background reaper
//! ticks at a fixed interval and disconnects once the connection has been
//! idle for the configured window. The next operation reconnects
//! transparently.
//!
//! The lease bookkeeping sits behind a synchronous mutex that is never held
//! across an await point.

use std::{
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use eyre::Result;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    config::PresenceConfig,
    store::{PresenceConnection, PresenceConnector},
};

struct Lease {
    conn: Arc<dyn PresenceConnection>,
    generation: u64,
    in_flight: usize,
    last_used: Instant,
    stale: bool,
}

struct Inner {
    connector: Arc<dyn PresenceConnector>,
    idle_timeout: Duration,
    state: Mutex<LeaseState>,
}

#[derive(Default)]
struct LeaseState {
    lease: Option<Lease>,
    next_generation: u64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, LeaseState> {
        // The state is plain bookkeeping; a panic while holding the lock
        // cannot leave it half-updated in a way that matters.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_reuse(self: &Arc<Self>) -> Option<LeaseGuard> {
        let mut state = self.lock();
        let lease = state.lease.as_mut().filter(|lease| !lease.stale)?;
        lease.in_flight += 1;
        Some(LeaseGuard {
            inner: self.clone(),
            conn: lease.conn.clone(),
            generation: lease.generation,
            failed: false,
        })
    }

    fn release(&self, generation: u64, failed: bool) {
        let mut state = self.lock();
        if let Some(lease) = state.lease.as_mut().filter(|l| l.generation == generation) {
            lease.in_flight = lease.in_flight.saturating_sub(1);
            lease.last_used = Instant::now();
            if failed {
                lease.stale = true;
            }
        }
    }

    /// Takes the connection out if it has been idle long enough or went stale.
    fn take_idle(&self, now: Instant) -> Option<Arc<dyn PresenceConnection>> {
        let mut state = self.lock();
        let idle = state.lease.as_ref().is_some_and(|lease| {
            lease.in_flight == 0
                && (lease.stale || now.duration_since(lease.last_used) >= self.idle_timeout)
        });
        if idle {
            state.lease.take().map(|lease| lease.conn)
        } else {
            None
        }
    }

    fn take_any(&self) -> Option<Arc<dyn PresenceConnection>> {
        self.lock().lease.take().map(|lease| lease.conn)
    }
}

/// Presence connection held for the duration of one operation.
pub struct LeaseGuard {
    inner: Arc<Inner>,
    conn: Arc<dyn PresenceConnection>,
    generation: u64,
    failed: bool,
}

impl LeaseGuard {
    /// Flags the connection as broken so the next operation reconnects.
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }
}

impl Deref for LeaseGuard {
    type Target = dyn PresenceConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref()
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.inner.release(self.generation, self.failed);
    }
}

pub struct PresenceHandle {
    inner: Arc<Inner>,
    reaper: JoinHandle<()>,
}

impl PresenceHandle {
    /// Creates the handle and starts its reaper. Must be called inside a
    /// tokio runtime. No connection is opened until the first operation.
    pub fn new(connector: Arc<dyn PresenceConnector>, config: &PresenceConfig) -> Self {
        let inner = Arc::new(Inner {
            connector,
            idle_timeout: config.idle_timeout,
            state: Mutex::new(LeaseState::default()),
        });
        let reaper = spawn_reaper(Arc::downgrade(&inner), config.reaper_interval);

        Self { inner, reaper }
    }

    pub async fn acquire(&self) -> Result<LeaseGuard> {
        if let Some(guard) = self.inner.try_reuse() {
            return Ok(guard);
        }

        let conn = self.inner.connector.connect().await?;

        let (guard, discard) = {
            let mut state = self.inner.lock();
            match state.lease.as_mut().filter(|lease| !lease.stale) {
                // Another operation connected while we were connecting.
                Some(lease) => {
                    lease.in_flight += 1;
                    let guard = LeaseGuard {
                        inner: self.inner.clone(),
                        conn: lease.conn.clone(),
                        generation: lease.generation,
                        failed: false,
                    };
                    (guard, Some(conn))
                }
                None => {
                    state.next_generation += 1;
                    let generation = state.next_generation;
                    let replaced = state.lease.replace(Lease {
                        conn: conn.clone(),
                        generation,
                        in_flight: 1,
                        last_used: Instant::now(),
                        stale: false,
                    });
                    let guard = LeaseGuard {
                        inner: self.inner.clone(),
                        conn,
                        generation,
                        failed: false,
                    };
                    (guard, replaced.map(|lease| lease.conn))
                }
            }
        };

        if let Some(conn) = discard {
            if let Err(err) = conn.disconnect().await {
                warn!("Failed to close surplus presence connection: {:#}", err);
            }
        }

        debug!("Acquired presence connection");
        Ok(guard)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().lease.is_some()
    }

    /// Releases the connection immediately if it is idle.
    pub async fn release_if_idle(&self) -> bool {
        release_idle(&self.inner).await
    }

    /// Stops the reaper and closes the connection.
    pub async fn shutdown(&self) {
        self.reaper.abort();
        if let Some(conn) = self.inner.take_any() {
            if let Err(err) = conn.disconnect().await {
                warn!("Failed to close presence connection on shutdown: {:#}", err);
            }
        }
        info!("Presence handle shut down");
    }
}

impl Drop for PresenceHandle {
    fn drop(&mut self) {
        self.reaper.abort();
    }
}

async fn release_idle(inner: &Inner) -> bool {
    let Some(conn) = inner.take_idle(Instant::now()) else {
        return false;
    };
    if let Err(err) = conn.disconnect().await {
        warn!("Failed to close idle presence connection: {:#}", err);
    }
    debug!("Released idle presence connection");
    true
}

fn spawn_reaper(inner: Weak<Inner>, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            release_idle(&inner).await;
        }
    })
}
