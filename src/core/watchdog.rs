// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Periodic heartbeat task.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::info;

use super::{clock, stop::Stop, Hub};
use crate::Result;

/// Ticks the hub's status heartbeat on a fixed period.
pub struct Watchdog {
    hub: Rc<RefCell<Hub>>,
    period: Duration,
    stop: Stop,
}

impl Watchdog {
    /// New watchdog over `hub`, firing every `period`.
    pub fn new(hub: Rc<RefCell<Hub>>, period: Duration, stop: Stop) -> Self {
        Self { hub, period, stop }
    }

    /// Run until stopped.
    ///
    /// The stop flag is checked between beats only - the in-flight sleep is
    /// deliberately not raced against it, so shutdown can lag by up to one
    /// full period. Known limitation, kept as such.
    pub async fn run(self) -> Result<()> {
        info!(period = ?self.period, "watchdog started");
        while !self.stop.is_set() {
            Hub::watchdog(&self.hub, clock::epoch_ts()).await?;
            tokio::time::sleep(self.period).await;
        }
        info!("watchdog finished");
        Ok(())
    }
}
