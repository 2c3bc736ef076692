//! The response registry: pending requests keyed by responder.
//!
//! Requests live in a [`TimedMultimap`] under their responder with a
//! lifespan equal to their timeout. A reply is matched against that
//! responder's pending requests; a request the janitor sweeps out of the
//! multimap has, by definition, timed out.
//!
//! ```text
//!   submit ──▶ TimedMultimap<responder, Request> ──lifespan end──▶ TimedOut
//!                    ▲            │
//!   handle_message ──┘            └── remove (reply / cancel, no expiry callback)
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use lapse_core::config::RequestConfig;
use lapse_core::metrics::spans;
use lapse_core::{Janitor, Lifespan, TimedMultimap};

use crate::error::{RespondError, Result};
use crate::parse::ResponseParser;
use crate::request::{fold_context, Request, RequestId, RequestSpec};
use crate::stats::{RequestCounters, RequestStats};

/// Outbound text channel to responders.
pub trait MessageSink<S>: Send + Sync {
    /// Deliver `text` to `recipient`. Returns `false` if it could not be delivered.
    fn send_to(&self, recipient: &S, text: &str) -> bool;
}

impl<S, F> MessageSink<S> for F
where
    F: Fn(&S, &str) -> bool + Send + Sync,
{
    fn send_to(&self, recipient: &S, text: &str) -> bool {
        self(recipient, text)
    }
}

/// What [`ResponseRegistry::handle_message`] did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// The message answered exactly one request.
    Handled {
        /// The request it answered.
        request: RequestId,
    },
    /// The message matched several requests. None was answered and the
    /// sender was asked to pick one of `options`.
    Ambiguous {
        /// Context names of the matching requests, oldest first.
        options: Vec<String>,
    },
    /// The message answered nothing; normal processing should continue.
    NotHandled,
}

impl Interception {
    /// Whether the host should stop processing the message.
    #[must_use]
    pub fn is_intercepted(&self) -> bool {
        !matches!(self, Self::NotHandled)
    }
}

/// Pending requests for every responder, matched against incoming replies.
pub struct ResponseRegistry<S, K> {
    pending: TimedMultimap<S, Request<S, K>>,
    parser: Box<dyn ResponseParser<K>>,
    sink: Box<dyn MessageSink<S>>,
    default_timeout: Duration,
    ambiguity_template: String,
    next_id: AtomicU64,
    counters: Arc<RequestCounters>,
}

impl<S, K> ResponseRegistry<S, K>
where
    S: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    K: Eq + Hash + Clone + fmt::Debug + fmt::Display + Send + Sync + 'static,
{
    /// Create a registry whose requests are swept by `janitor`.
    ///
    /// # Errors
    /// Returns [`RespondError::InvalidTimeout`] when the configured default
    /// timeout is not positive.
    pub fn new<P, M>(janitor: &Janitor, parser: P, sink: M, config: &RequestConfig) -> Result<Self>
    where
        P: ResponseParser<K> + 'static,
        M: MessageSink<S> + 'static,
    {
        let setting = config.default_timeout;
        let default_timeout = setting.required().map_err(|_| RespondError::InvalidTimeout {
            amount: setting.amount,
            unit: setting.unit,
        })?;

        let pending = TimedMultimap::labelled(janitor, "pending-requests", Lifespan::Forever);
        pending.on_lifespan_end(|responder: &S, requests: &[Request<S, K>]| {
            for request in requests {
                if request.expire() {
                    debug!(request = %request.id(), ?responder, "Request timed out");
                }
            }
        });

        Ok(Self {
            pending,
            parser: Box::new(parser),
            sink: Box::new(sink),
            default_timeout,
            ambiguity_template: config.ambiguity_template.clone(),
            next_id: AtomicU64::new(1),
            counters: Arc::new(RequestCounters::default()),
        })
    }

    /// Start waiting for an answer to `spec`.
    ///
    /// # Errors
    /// Rejects an empty context name, a request that accepts nothing, a
    /// non-positive timeout, and a context name already pending for the
    /// same responder (compared case-insensitively).
    pub fn submit(&self, spec: RequestSpec<S, K>) -> Result<Request<S, K>> {
        let result = self.try_submit(spec);
        let counter = if result.is_ok() {
            &self.counters.submitted
        } else {
            &self.counters.rejected
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    fn try_submit(&self, spec: RequestSpec<S, K>) -> Result<Request<S, K>> {
        let context = spec.context.trim();
        if context.is_empty() {
            return Err(RespondError::EmptyContextName);
        }
        if spec.accepts.is_empty() {
            return Err(RespondError::NoAcceptedKinds {
                context: context.to_string(),
            });
        }
        let timeout = match spec.timeout {
            Some((amount, unit)) => Lifespan::required(amount, unit)
                .map_err(|_| RespondError::InvalidTimeout { amount, unit })?,
            None => self.default_timeout,
        };

        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let responder = spec.responder.clone();
        let request = Request::new(
            id,
            spec,
            timeout,
            self.pending.downgrade(),
            Arc::clone(&self.counters),
        );

        let name = request.context().to_string();
        let folded = fold_context(&name);
        self.pending
            .try_insert_for(
                responder.clone(),
                request.clone(),
                Lifespan::Finite(timeout),
                |other| other.is_pending() && other.is_named(&folded),
            )
            .map_err(|_| RespondError::DuplicateContext { context: name.clone() })?;

        debug!(request = %id, ?responder, context = %name, ?timeout, "Request submitted");
        Ok(request)
    }

    /// Build and submit a request in one call.
    ///
    /// # Errors
    /// Same as [`ResponseRegistry::submit`].
    pub fn request(
        &self,
        responder: S,
        context: impl Into<String>,
        accepts: impl IntoIterator<Item = K>,
    ) -> Result<Request<S, K>> {
        self.submit(RequestSpec::new(responder, context).accepting_all(accepts))
    }

    /// Offer a message from `sender` to the pending requests.
    pub fn handle_message(&self, sender: &S, message: &str) -> Interception {
        let _span = tracing::debug_span!(spans::RESPONSE_MATCH).entered();

        let Some(parsed) = self.parser.parse(message) else {
            return Interception::NotHandled;
        };

        let mut candidates: Vec<Request<S, K>> = self
            .pending
            .get(sender)
            .into_iter()
            .filter(|r| r.is_pending() && r.accepts(&parsed.kind))
            .collect();
        if let Some(name) = parsed.context.as_deref() {
            let folded = fold_context(name);
            candidates.retain(|r| r.is_named(&folded));
        }

        match candidates.as_slice() {
            [] => Interception::NotHandled,
            [request] => self.answer(sender, request, parsed.kind),
            several => {
                let options: Vec<String> = several.iter().map(|r| r.context().to_string()).collect();
                let notice = self
                    .ambiguity_template
                    .replace("{response}", &parsed.kind.to_string())
                    .replace("{options}", &options.join(", "));
                if !self.sink.send_to(sender, &notice) {
                    warn!(?sender, "Could not deliver disambiguation notice");
                }
                self.counters.ambiguous.fetch_add(1, Ordering::Relaxed);
                debug!(?sender, kind = %parsed.kind, candidates = options.len(), "Ambiguous response");
                Interception::Ambiguous { options }
            }
        }
    }

    fn answer(&self, sender: &S, request: &Request<S, K>, kind: K) -> Interception {
        let id = request.id();
        let removed = self.pending.remove_where(sender, |r| r.id() == id);
        // Gone already: swept as timed out or cancelled since the lookup.
        if removed.is_empty() || !request.respond(kind) {
            return Interception::NotHandled;
        }
        Interception::Handled { request: id }
    }

    /// Cancel the pending request named `context` for `responder`.
    ///
    /// Returns `false` when no such request is pending.
    pub fn cancel(&self, responder: &S, context: &str) -> bool {
        let folded = fold_context(context);
        let removed = self
            .pending
            .remove_where(responder, |r| r.is_pending() && r.is_named(&folded));
        removed.iter().fold(false, |any, r| r.cancel_detached() || any)
    }

    /// Cancel every pending request for `responder`. Returns how many were cancelled.
    pub fn cancel_all(&self, responder: &S) -> usize {
        self.pending
            .remove(responder)
            .iter()
            .filter(|r| r.cancel_detached())
            .count()
    }

    /// Pending requests for `responder`, oldest first.
    #[must_use]
    pub fn pending_for(&self, responder: &S) -> Vec<Request<S, K>> {
        self.pending
            .get(responder)
            .into_iter()
            .filter(Request::is_pending)
            .collect()
    }

    /// Number of pending requests across all responders.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Timeout used for requests submitted without one.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Snapshot of request counters.
    #[must_use]
    pub fn stats(&self) -> RequestStats {
        self.counters.snapshot()
    }
}
