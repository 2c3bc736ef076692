//! The assembled host: scheduler, tick clock, janitor and outbox wired
//! from a [`HostConfig`].
//!
//! ```text
//!   HostConfig ──▶ Runtime
//!                   ├── TickScheduler ──owns──▶ TickClock
//!                   ├── Janitor (clock = TickClock, attached to scheduler)
//!                   └── Outbox (MessageSink for request registries)
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use tracing::info;

use lapse_core::{
    Cancellable, Janitor, Lifespan, Result, SharedClock, TaskHandle, TimedMap, TimedSet,
};
use lapse_respond::{KeywordParser, Reply, ResponseParser, ResponseRegistry};

use crate::clock::{TickClock, TickStamp};
use crate::config::HostConfig;
use crate::heartbeat::{HeartbeatHandle, spawn_heartbeat};
use crate::player::{Outbox, PlayerId};
use crate::scheduler::TickScheduler;

/// A configured lapse host.
///
/// Dropping the runtime detaches its janitor from the scheduler.
pub struct Runtime {
    config: HostConfig,
    scheduler: Arc<TickScheduler>,
    janitor: Arc<Janitor>,
    sweep_task: TaskHandle,
    outbox: Outbox,
}

impl Runtime {
    /// Validate `config` and wire everything together.
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate.
    pub fn new(config: HostConfig) -> Result<Self> {
        config.validate()?;

        let scheduler = Arc::new(TickScheduler::new());
        let clock: SharedClock = scheduler.clock();
        let janitor = Arc::new(Janitor::with_clock(clock));
        let sweep_task = janitor.attach(
            scheduler.as_ref(),
            config.lapse.janitor.start_delay_ticks,
            config.lapse.janitor.interval_ticks,
        )?;

        info!(
            profile = ?config.profile,
            tick_rate = config.tick_rate,
            sweep_interval = config.lapse.janitor.interval_ticks,
            "Runtime ready"
        );
        Ok(Self {
            config,
            scheduler,
            janitor,
            sweep_task,
            outbox: Outbox::new(),
        })
    }

    /// Configuration the runtime was built from.
    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The tick scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<TickScheduler> {
        &self.scheduler
    }

    /// The janitor every container built here registers with.
    #[must_use]
    pub fn janitor(&self) -> &Arc<Janitor> {
        &self.janitor
    }

    /// The game clock.
    #[must_use]
    pub fn clock(&self) -> Arc<TickClock> {
        self.scheduler.clock()
    }

    /// Current tick with its wall-clock time.
    #[must_use]
    pub fn stamp(&self) -> TickStamp {
        self.scheduler.clock().stamp()
    }

    /// Outbound chat shared by every registry built here.
    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Advance one tick (cooperative profile). Returns how many tasks ran.
    pub fn tick(&self) -> usize {
        self.scheduler.tick()
    }

    /// Start a heartbeat ticking at the configured rate.
    ///
    /// Meant for the threaded profile; under the cooperative profile the
    /// host should call [`Runtime::tick`] instead of mixing the two.
    ///
    /// # Errors
    /// Propagates [`spawn_heartbeat`] errors.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn start_heartbeat(&self) -> Result<HeartbeatHandle> {
        spawn_heartbeat(Arc::clone(&self.scheduler), self.config.tick_period())
    }

    /// Lifespan containers get when none is given.
    #[must_use]
    pub fn default_lifespan(&self) -> Lifespan {
        self.config.lapse.containers.default_lifespan.lifespan()
    }

    /// A map swept by this runtime's janitor, using the configured default lifespan.
    #[must_use]
    pub fn timed_map<K, V>(&self, label: &str) -> TimedMap<K, V>
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        TimedMap::labelled(&self.janitor, label, self.default_lifespan())
    }

    /// A set swept by this runtime's janitor, using the configured default lifespan.
    #[must_use]
    pub fn timed_set<T>(&self, label: &str) -> TimedSet<T>
    where
        T: Eq + Hash + Clone + Send + 'static,
    {
        TimedSet::labelled(&self.janitor, label, self.default_lifespan())
    }

    /// A request registry for players, replying through the outbox.
    ///
    /// # Errors
    /// Fails when the configured default timeout is not positive.
    pub fn requests<K, P>(&self, parser: P) -> lapse_respond::error::Result<ResponseRegistry<PlayerId, K>>
    where
        K: Eq + Hash + Clone + fmt::Debug + fmt::Display + Send + Sync + 'static,
        P: ResponseParser<K> + 'static,
    {
        ResponseRegistry::new(&self.janitor, parser, self.outbox.clone(), &self.config.lapse.requests)
    }

    /// A request registry using the stock yes/no/accept/deny keywords.
    ///
    /// # Errors
    /// Same as [`Runtime::requests`].
    pub fn replies(&self) -> lapse_respond::error::Result<ResponseRegistry<PlayerId, Reply>> {
        self.requests(KeywordParser::replies())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.sweep_task.cancel() {
            info!(tick = self.scheduler.current_tick(), "Janitor detached");
        }
    }
}
