// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Node core: the hub, the task harness and cooperative shutdown.

mod clock;
mod hub;
mod node;
mod stop;
mod watchdog;

pub use clock::epoch_ts;
pub use hub::{Hub, StatusCache};
pub use node::SensorNode;
pub use stop::{stop_channel, Stop, StopHandle};
pub use watchdog::Watchdog;
