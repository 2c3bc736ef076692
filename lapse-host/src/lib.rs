//! # lapse-host: Host Integration
//!
//! Everything a game server needs to run lapse containers: a cooperative
//! tick scheduler, a clock that follows its ticks, an optional tokio
//! heartbeat for threaded servers, configuration, and logging bootstrap.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               game server                │
//! │  ┌────────────────────────────────────┐  │
//! │  │            lapse-host              │  │
//! │  │  ┌───────────┐  ┌───────────────┐  │  │
//! │  │  │ Heartbeat │─▶│ TickScheduler │  │  │
//! │  │  └───────────┘  └───────┬───────┘  │  │
//! │  │                         ▼          │  │
//! │  │   ┌──────────────────────────────┐ │  │
//! │  │   │ lapse-core (janitor, colls)  │ │  │
//! │  │   └──────────────────────────────┘ │  │
//! │  │   ┌──────────────────────────────┐ │  │
//! │  │   │ lapse-respond (requests)     │ │  │
//! │  │   └──────────────────────────────┘ │  │
//! │  └────────────────────────────────────┘  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `scheduler`: cooperative run queue, one tick at a time
//! - `clock`: game clock driven by ticks, wall-clock stamps
//! - `heartbeat`: tokio interval driving the scheduler
//! - `config`: host profile, tick rate, logging settings
//! - `logging`: `tracing-subscriber` bootstrap
//! - `player`: player identity and outbound chat
//! - `runtime`: all of the above wired together

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod heartbeat;
pub mod logging;
pub mod player;
pub mod runtime;
pub mod scheduler;

pub use clock::{TickClock, TickStamp};
pub use config::{HostConfig, HostProfile};
pub use heartbeat::{HeartbeatHandle, spawn_heartbeat};
pub use player::{Outbox, PlayerId};
pub use runtime::Runtime;
pub use scheduler::TickScheduler;
