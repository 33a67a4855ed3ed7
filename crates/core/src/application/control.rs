// Actor control: stop signal + idempotent start/stop slot

use std::sync::Mutex;
use tokio::sync::watch;

/// Stop signal for a running actor loop
#[derive(Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    /// Check if stop was requested
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the stop signal
    pub async fn wait(&mut self) {
        let _ = self.rx.changed().await;
    }
}

/// Stop sender
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Signal the actor to stop
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a stop channel
pub fn stop_channel() -> (StopHandle, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopToken { rx })
}

/// Tracks the running instance of a timer-driven actor so start/stop are
/// idempotent: starting an active actor is a no-op, as is stopping an
/// inactive one. Stopping only signals the token; a tick already executing
/// runs to completion.
#[derive(Default)]
pub struct ActorSlot {
    inner: Mutex<Option<StopHandle>>,
}

impl ActorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the actor if not already running. `spawn` receives the stop
    /// token and must launch the loop task. Returns false when the actor
    /// was already active (nothing is spawned).
    pub fn start<F>(&self, spawn: F) -> bool
    where
        F: FnOnce(StopToken),
    {
        let mut guard = self.inner.lock().unwrap();
        if guard.is_some() {
            return false;
        }
        let (handle, token) = stop_channel();
        spawn(token);
        *guard = Some(handle);
        true
    }

    /// Signal the running actor to stop. Returns false when inactive.
    pub fn stop(&self) -> bool {
        match self.inner.lock().unwrap().take() {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().unwrap().is_some()
    }
}
