//! Envelope fields injected around a [`crate::event::RuntimeEvent`] before
//! it goes out over the wire: which execution it belongs to and where it
//! falls in that execution's event sequence.

use serde_json::Value;

/// Per-event envelope: identifies the execution and the event's position
/// within it. Cheap to clone; one lives alongside the
/// [`EnvelopeState`] that produces a run of them.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub execution_id: String,
    pub event_id: u64,
}

impl Envelope {
    pub fn new(execution_id: impl Into<String>, event_id: u64) -> Self {
        Self {
            execution_id: execution_id.into(),
            event_id,
        }
    }

    /// Merges the envelope fields into a JSON object in place. Existing keys
    /// of the same name are left untouched — the event body always wins.
    pub fn inject_into(&self, value: &mut Value) {
        let Value::Object(map) = value else { return };
        map.entry("execution_id")
            .or_insert_with(|| Value::String(self.execution_id.clone()));
        map.entry("event_id")
            .or_insert_with(|| Value::from(self.event_id));
    }
}

/// Tracks the running event sequence number for one execution. Call
/// [`EnvelopeState::next`] once per event emitted; it hands back the
/// [`Envelope`] to attach and advances its own counter.
#[derive(Clone, Debug)]
pub struct EnvelopeState {
    pub execution_id: String,
    next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            next_event_id: 0,
        }
    }

    pub fn next(&mut self) -> Envelope {
        let envelope = Envelope::new(self.execution_id.clone(), self.next_event_id);
        self.next_event_id += 1;
        envelope
    }
}

/// Serializes `event`, stamps it with the next envelope from `state`, and
/// returns the merged JSON value ready to write as an SSE `data:` line.
pub fn to_json(
    event: &crate::event::RuntimeEvent,
    state: &mut EnvelopeState,
) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.next().inject_into(&mut value);
    Ok(value)
}
