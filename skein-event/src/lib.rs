//! Wire event types for a streamed agent execution: a [`RuntimeEvent`] body
//! plus the [`Envelope`]/[`EnvelopeState`] that stamps it with an execution
//! id and sequence number before it is written as an SSE `data:` line.
//!
//! Deliberately has no dependency on the crate that produces these events —
//! the executor and the HTTP bridge are the only callers.

mod envelope;
mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::RuntimeEvent;
