//! Data and event notifications.
//!
//! Telemetry posted on one node is broadcast to every other node so each can
//! evaluate the triggers it owns. The originator already fed its own
//! pipeline and never replays its messages.

use crate::error::Result;
use crate::listener::PartitionDataListener;
use crate::types::{Data, Event, NodeId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Payload of a data notification; exactly one shape per message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotifyPayload {
    Data(Data),
    Event(Event),
    DataBatch(Vec<Data>),
    Events(Vec<Event>),
}

impl NotifyPayload {
    /// Number of items carried.
    pub fn len(&self) -> usize {
        match self {
            NotifyPayload::Data(_) | NotifyPayload::Event(_) => 1,
            NotifyPayload::DataBatch(data) => data.len(),
            NotifyPayload::Events(events) => events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyData {
    pub from_node: NodeId,
    pub payload: NotifyPayload,
}

impl NotifyData {
    pub fn new(from_node: NodeId, payload: NotifyPayload) -> Self {
        Self { from_node, payload }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(self)?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Hand a payload to the listener method matching its shape.
pub fn dispatch(listener: &dyn PartitionDataListener, payload: NotifyPayload) {
    match payload {
        NotifyPayload::Data(data) => listener.on_new_data(data),
        NotifyPayload::Event(event) => listener.on_new_event(event),
        NotifyPayload::DataBatch(data) => listener.on_new_data_batch(data),
        NotifyPayload::Events(events) => listener.on_new_events(events),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    impl PartitionDataListener for Recorder {
        fn on_new_data(&self, _data: Data) {
            self.calls.lock().push("data");
        }

        fn on_new_data_batch(&self, _data: Vec<Data>) {
            self.calls.lock().push("data_batch");
        }

        fn on_new_event(&self, _event: Event) {
            self.calls.lock().push("event");
        }

        fn on_new_events(&self, _events: Vec<Event>) {
            self.calls.lock().push("events");
        }
    }

    #[test]
    fn test_dispatch_matches_payload_shape() {
        let recorder = Recorder::default();
        let data = Data::new("t", "cpu", 1_000, "0.93");
        let event = Event::new("t", "deploy-1", 1_000).with_category("DEPLOYMENT");

        dispatch(&recorder, NotifyPayload::Data(data.clone()));
        dispatch(&recorder, NotifyPayload::DataBatch(vec![data.clone(), data]));
        dispatch(&recorder, NotifyPayload::Event(event.clone()));
        dispatch(&recorder, NotifyPayload::Events(vec![event]));

        assert_eq!(
            *recorder.calls.lock(),
            vec!["data", "data_batch", "event", "events"]
        );
    }

    #[test]
    fn test_message_survives_encoding() {
        let message = NotifyData::new(
            4,
            NotifyPayload::Events(vec![Event::new("t", "e", 5).with_text("disk full")]),
        );
        let decoded = NotifyData::from_bytes(&message.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.payload.len(), 1);
    }
}
