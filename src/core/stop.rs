// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Cooperative shutdown signal.
//!
//! One settable-once flag shared by every task. Adapters observe it at
//! their suspension points; setting it is idempotent and there is no way to
//! un-set it.

use tokio::sync::watch;

/// Create the shared stop signal.
pub fn stop_channel() -> (StopHandle, Stop) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, Stop { rx })
}

/// Setter side. Held by the node (and its interrupt watcher).
#[derive(Clone)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Set the stop flag. Safe to call more than once.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observer side. Cloned into every task.
#[derive(Clone)]
pub struct Stop {
    rx: watch::Receiver<bool>,
}

impl Stop {
    /// True once the flag has been set.
    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the flag is set. A dropped setter counts as stop: a node
    /// that went away should take its tasks with it.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                break;
            }
        }
    }
}
