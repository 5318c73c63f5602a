//! Cooperative shutdown shared by the fetch path and the long-running loops.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Receiving half of a shutdown signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Sending half; dropping it without triggering leaves the loops running.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // trigger dropped, nothing can fire any more
                std::future::pending::<()>().await;
            }
        }
    }

    /// Drive `fut` to completion unless shutdown fires first, in which case
    /// it is dropped and `None` comes back.
    pub async fn run_until<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        if self.is_triggered() {
            return None;
        }
        tokio::select! {
            out = fut => Some(out),
            _ = self.triggered() => None,
        }
    }

    /// Sleep for `duration`. Returns `false` if shutdown fired first.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        self.run_until(tokio::time::sleep(duration)).await.is_some()
    }
}
