//! # LAPSE Core Library
//!
//! Time-scoped collections for game servers and other tick-driven hosts.
//!
//! Every value stored in a lapse container carries a deadline. Reads check
//! it on the spot, so an expired value is invisible the instant its lifespan
//! ends. Separately, a [`Janitor`] driven by the host's heartbeat physically
//! removes expired values and tells lifespan-end listeners about them.
//!
//! - [`TimedMap`]: key → value
//! - [`TimedSet`]: distinct elements
//! - [`TimedList`]: insertion-ordered values, duplicates allowed
//! - [`TimedMultimap`]: key → many values, each with its own deadline
//! - [`DecayList`]: elements that live one window past their last touch
//!
//! ## Concurrency Contract
//!
//! Containers are `Send + Sync` handles. Each owns one lock covering its
//! entries and listeners. Listeners always run after that lock is released,
//! so they may call back into the container that notified them.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod collections;
pub mod config;
pub mod entry;
pub mod error;
pub mod janitor;
pub mod metrics;
pub mod schedule;
pub mod subscriber;

pub use clock::{Clock, Deadline, Lifespan, ManualClock, SharedClock, SystemClock, TimeUnit};
pub use collections::{DecayList, TimedList, TimedMap, TimedMultimap, TimedSet, WeakTimedMultimap};
pub use config::LapseConfig;
pub use error::{LapseError, Result};
pub use janitor::{Janitor, JanitorPass, Sweep, SweepReport};
pub use schedule::{Cancellable, Scheduler, TaskHandle};
