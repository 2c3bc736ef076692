//! # lapse-respond: Response-Request Matching
//!
//! Ask a player a question, then wait for one of several acceptable answers,
//! a cancellation, or a timeout. Built on [`lapse_core::TimedMultimap`]:
//! pending requests are keyed by responder, and the multimap's lifespan end
//! is what turns an unanswered request into a timed-out one.
//!
//! Several questions can be pending for the same responder. A reply goes to
//! the single request that accepts it. When more than one does, the sender is
//! asked to name the one they mean (`/accept trade`) and nothing is answered.
//!
//! No outcome is an error. Answers, cancellations and timeouts all arrive
//! through [`Request::on_outcome`] as an [`Outcome`].

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod parse;
pub mod registry;
pub mod request;
pub mod stats;

pub use error::RespondError;
pub use parse::{KeywordParser, ParsedResponse, Reply, ResponseParser};
pub use registry::{Interception, MessageSink, ResponseRegistry};
pub use request::{Outcome, Request, RequestId, RequestSpec, RequestState};
pub use stats::RequestStats;
