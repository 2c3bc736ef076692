//! A single outstanding question and its tri-state outcome.
//!
//! ```text
//!                 ┌──▶ Responded(kind)   matching reply from the responder
//!   Pending ──────┼──▶ Cancelled         explicit cancel
//!                 └──▶ TimedOut          lifespan ended in the pending multimap
//! ```
//!
//! Every transition leaves `Pending` and none leaves a terminal state, so
//! outcome listeners run at most once.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use lapse_core::subscriber::call_isolated;
use lapse_core::{Cancellable, TimeUnit, WeakTimedMultimap};

use crate::stats::RequestCounters;

/// Identifier assigned by the registry when a request is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Where a request stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState<K> {
    /// Waiting for a reply.
    Pending,
    /// Answered with this kind.
    Responded(K),
    /// Called off before an answer arrived.
    Cancelled,
    /// No answer arrived before the timeout.
    TimedOut,
}

/// How a request ended. Delivered to outcome listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<K> {
    /// Answered with this kind.
    Responded(K),
    /// Called off before an answer arrived.
    Cancelled,
    /// No answer arrived before the timeout.
    TimedOut,
}

impl<K> From<Outcome<K>> for RequestState<K> {
    fn from(outcome: Outcome<K>) -> Self {
        match outcome {
            Outcome::Responded(kind) => Self::Responded(kind),
            Outcome::Cancelled => Self::Cancelled,
            Outcome::TimedOut => Self::TimedOut,
        }
    }
}

type OutcomeListener<K> = Box<dyn FnOnce(&Outcome<K>) + Send>;

struct Progress<K> {
    state: RequestState<K>,
    listeners: Vec<OutcomeListener<K>>,
}

/// Context names match regardless of case and surrounding whitespace.
pub(crate) fn fold_context(name: &str) -> String {
    name.trim().to_lowercase()
}

struct Shared<S, K> {
    id: RequestId,
    responder: S,
    context: String,
    folded: String,
    accepts: HashSet<K>,
    timeout: Duration,
    progress: Mutex<Progress<K>>,
    home: WeakTimedMultimap<S, Request<S, K>>,
    counters: Arc<RequestCounters>,
}

/// Handle to a pending (or finished) request. Clones share state.
pub struct Request<S, K> {
    shared: Arc<Shared<S, K>>,
}

impl<S, K> Clone for Request<S, K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, K> fmt::Debug for Request<S, K>
where
    S: fmt::Debug,
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.shared.id)
            .field("responder", &self.shared.responder)
            .field("context", &self.shared.context)
            .field("state", &self.shared.progress.lock().state)
            .finish_non_exhaustive()
    }
}

impl<S, K> Request<S, K>
where
    S: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    pub(crate) fn new(
        id: RequestId,
        spec: RequestSpec<S, K>,
        timeout: Duration,
        home: WeakTimedMultimap<S, Request<S, K>>,
        counters: Arc<RequestCounters>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                responder: spec.responder,
                folded: fold_context(&spec.context),
                context: spec.context.trim().to_string(),
                accepts: spec.accepts,
                timeout,
                progress: Mutex::new(Progress {
                    state: RequestState::Pending,
                    listeners: Vec::new(),
                }),
                home,
                counters,
            }),
        }
    }

    /// Registry-assigned id.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.shared.id
    }

    /// Who is expected to answer.
    #[must_use]
    pub fn responder(&self) -> &S {
        &self.shared.responder
    }

    /// Name that tells this request apart from others for the same responder.
    #[must_use]
    pub fn context(&self) -> &str {
        &self.shared.context
    }

    /// Whether this request's context, folded by [`fold_context`], equals `folded`.
    pub(crate) fn is_named(&self, folded: &str) -> bool {
        self.shared.folded == folded
    }

    /// Whether `kind` answers this request.
    #[must_use]
    pub fn accepts(&self, kind: &K) -> bool {
        self.shared.accepts.contains(kind)
    }

    /// Every kind that answers this request.
    #[must_use]
    pub fn accepted_kinds(&self) -> Vec<K> {
        self.shared.accepts.iter().cloned().collect()
    }

    /// How long the request waits before timing out.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RequestState<K> {
        self.shared.progress.lock().state.clone()
    }

    /// Whether the request is still waiting.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.shared.progress.lock().state, RequestState::Pending)
    }

    /// The answer, once responded.
    #[must_use]
    pub fn response(&self) -> Option<K> {
        match &self.shared.progress.lock().state {
            RequestState::Responded(kind) => Some(kind.clone()),
            _ => None,
        }
    }

    /// Whether the request was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.shared.progress.lock().state, RequestState::Cancelled)
    }

    /// Whether the request timed out.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self.shared.progress.lock().state, RequestState::TimedOut)
    }

    /// Run `listener` once the request ends.
    ///
    /// If it already ended, `listener` runs immediately on this thread.
    pub fn on_outcome<F>(&self, listener: F)
    where
        F: FnOnce(&Outcome<K>) + Send + 'static,
    {
        let finished = {
            let mut progress = self.shared.progress.lock();
            let finished = match &progress.state {
                RequestState::Pending => None,
                RequestState::Responded(kind) => Some(Outcome::Responded(kind.clone())),
                RequestState::Cancelled => Some(Outcome::Cancelled),
                RequestState::TimedOut => Some(Outcome::TimedOut),
            };
            let Some(finished) = finished else {
                progress.listeners.push(Box::new(listener));
                return;
            };
            finished
        };
        call_isolated(&self.shared.context, || listener(&finished));
    }

    /// Run `listener` with the answer, if one arrives.
    pub fn on_response<F>(&self, listener: F)
    where
        F: FnOnce(&K) + Send + 'static,
    {
        self.on_outcome(move |outcome| {
            if let Outcome::Responded(kind) = outcome {
                listener(kind);
            }
        });
    }

    /// Run `listener` if the request times out.
    pub fn on_timeout<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_outcome(move |outcome| {
            if matches!(outcome, Outcome::TimedOut) {
                listener();
            }
        });
    }

    /// Run `listener` if the request is cancelled.
    pub fn on_cancel<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_outcome(move |outcome| {
            if matches!(outcome, Outcome::Cancelled) {
                listener();
            }
        });
    }

    pub(crate) fn respond(&self, kind: K) -> bool {
        self.finish(Outcome::Responded(kind))
    }

    pub(crate) fn expire(&self) -> bool {
        self.finish(Outcome::TimedOut)
    }

    /// Cancel without touching the pending multimap; the caller already
    /// removed the request.
    pub(crate) fn cancel_detached(&self) -> bool {
        self.finish(Outcome::Cancelled)
    }

    /// Leave `Pending` for `outcome`. Returns `false` if already terminal.
    fn finish(&self, outcome: Outcome<K>) -> bool {
        let listeners = {
            let mut progress = self.shared.progress.lock();
            if !matches!(progress.state, RequestState::Pending) {
                return false;
            }
            progress.state = outcome.clone().into();
            mem::take(&mut progress.listeners)
        };

        let counter = match &outcome {
            Outcome::Responded(_) => &self.shared.counters.responded,
            Outcome::Cancelled => &self.shared.counters.cancelled,
            Outcome::TimedOut => &self.shared.counters.timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        debug!(
            request = %self.shared.id,
            responder = ?self.shared.responder,
            context = %self.shared.context,
            outcome = ?outcome,
            "Request finished"
        );

        for listener in listeners {
            call_isolated(&self.shared.context, || listener(&outcome));
        }
        true
    }
}

impl<S, K> Cancellable for Request<S, K>
where
    S: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Remove the request from the pending multimap and mark it cancelled.
    ///
    /// This is an explicit removal: no timeout listener fires.
    fn cancel(&self) -> bool {
        if !self.is_pending() {
            return false;
        }
        if let Some(pending) = self.shared.home.upgrade() {
            let id = self.id();
            pending.remove_where(&self.shared.responder, |r| r.id() == id);
        }
        self.cancel_detached()
    }

    fn is_cancelled(&self) -> bool {
        Request::is_cancelled(self)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// What to ask, of whom, and for how long.
#[derive(Debug, Clone)]
pub struct RequestSpec<S, K> {
    pub(crate) responder: S,
    pub(crate) context: String,
    pub(crate) accepts: HashSet<K>,
    pub(crate) timeout: Option<(i64, TimeUnit)>,
}

impl<S, K: Eq + Hash> RequestSpec<S, K> {
    /// Ask `responder` something identified by `context`.
    pub fn new(responder: S, context: impl Into<String>) -> Self {
        Self {
            responder,
            context: context.into(),
            accepts: HashSet::new(),
            timeout: None,
        }
    }

    /// Accept `kind` as an answer.
    #[must_use]
    pub fn accepting(mut self, kind: K) -> Self {
        self.accepts.insert(kind);
        self
    }

    /// Accept every kind in `kinds` as an answer.
    #[must_use]
    pub fn accepting_all(mut self, kinds: impl IntoIterator<Item = K>) -> Self {
        self.accepts.extend(kinds);
        self
    }

    /// Time out after `amount` of `unit` instead of the registry default.
    #[must_use]
    pub fn timeout(mut self, amount: i64, unit: TimeUnit) -> Self {
        self.timeout = Some((amount, unit));
        self
    }
}
