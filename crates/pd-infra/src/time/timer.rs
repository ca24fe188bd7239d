use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use pd_core::ports::TimerPort;
use pd_core::{InboundEvent, TimerToken};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::debug;

type TimerMap = HashMap<TimerToken, (u64, AbortHandle)>;

/// One-shot timers backed by `tokio::time::sleep` tasks.
///
/// A fired timer is delivered as [`InboundEvent::TimerFired`] on the inbound
/// channel. Re-arming a token aborts the pending task first.
pub struct TokioTimer {
    timers: Arc<Mutex<TimerMap>>,
    next_generation: Mutex<u64>,
    inbound: mpsc::UnboundedSender<InboundEvent>,
    runtime: Handle,
}

impl TokioTimer {
    pub fn new(runtime: Handle, inbound: mpsc::UnboundedSender<InboundEvent>) -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Mutex::new(0),
            inbound,
            runtime,
        }
    }

    /// Timer bound to the runtime of the calling task.
    pub fn current(inbound: mpsc::UnboundedSender<InboundEvent>) -> anyhow::Result<Self> {
        let runtime = Handle::try_current().context("timer requires a tokio runtime")?;
        Ok(Self::new(runtime, inbound))
    }

    pub fn is_armed(&self, token: TimerToken) -> bool {
        lock(&self.timers).contains_key(&token)
    }

    fn generation(&self) -> u64 {
        let mut next = lock(&self.next_generation);
        *next = next.wrapping_add(1);
        *next
    }
}

impl TimerPort for TokioTimer {
    fn schedule(&self, token: TimerToken, after: Duration) {
        let generation = self.generation();
        let timers = Arc::clone(&self.timers);
        let inbound = self.inbound.clone();

        let mut guard = lock(&self.timers);
        if let Some((_, existing)) = guard.remove(&token) {
            existing.abort();
        }

        let task = self.runtime.spawn(async move {
            sleep(after).await;
            {
                let mut timers = lock(&timers);
                // A newer schedule of the same token owns the entry now.
                if timers.get(&token).is_some_and(|(g, _)| *g == generation) {
                    timers.remove(&token);
                }
            }
            if inbound.send(InboundEvent::TimerFired(token)).is_err() {
                debug!(?token, "timer fired after inbound channel closed");
            }
        });

        guard.insert(token, (generation, task.abort_handle()));
        debug!(?token, after_ms = after.as_millis() as u64, "timer armed");
    }

    fn cancel(&self, token: TimerToken) {
        if let Some((_, handle)) = lock(&self.timers).remove(&token) {
            handle.abort();
            debug!(?token, "timer cancelled");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
