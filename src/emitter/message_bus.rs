use std::collections::HashMap;

use event_emitter_rs::EventEmitter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::event::EventRecord;

#[derive(Debug, Error)]
pub enum MessageBusError {
    #[error("failed to encode message for {topic}: {source}")]
    Encode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{panicked} listener(s) of {topic} panicked")]
    ListenerPanicked { topic: String, panicked: usize },
}

/// Loosely typed topic pub/sub.
///
/// Messages travel as JSON strings, so publishers and subscribers only agree
/// on a topic name and a shape. Listeners run on the emitter's threads.
///
/// ```ignore
/// let mut bus = MessageBus::new();
/// bus.subscribe("OrderPlaced", |record: EventRecord| notify(&record));
/// bus.publish_record(&record)?;
/// ```
pub struct MessageBus {
    emitter: EventEmitter,
    topics: HashMap<String, String>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            emitter: EventEmitter::new(),
            topics: HashMap::new(),
        }
    }

    /// Listen on `topic`. Messages that do not decode as `T` are logged and skipped.
    pub fn subscribe<T, F>(&mut self, topic: &str, listener: F) -> String
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let name = topic.to_string();
        let id = self.emitter.on(topic, move |message: String| {
            match serde_json::from_str::<T>(&message) {
                Ok(value) => listener(value),
                Err(err) => warn!(topic = %name, error = %err, "skipping undecodable message"),
            }
        });
        self.topics.insert(id.clone(), topic.to_string());
        id
    }

    pub fn unsubscribe(&mut self, id: &str) -> bool {
        self.topics.remove(id);
        self.emitter.remove_listener(id).is_some()
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.topics.values().filter(|t| t.as_str() == topic).count()
    }

    /// Fire and forget. Returns the number of listeners notified.
    pub fn publish<T>(&mut self, topic: &str, message: &T) -> Result<usize, MessageBusError>
    where
        T: Serialize + ?Sized,
    {
        let handles = self.send(topic, message)?;
        Ok(handles.len())
    }

    /// Publish and block until every listener has returned.
    pub fn publish_and_wait<T>(&mut self, topic: &str, message: &T) -> Result<usize, MessageBusError>
    where
        T: Serialize + ?Sized,
    {
        let handles = self.send(topic, message)?;
        let listeners = handles.len();
        let panicked = handles
            .into_iter()
            .map(|handle| handle.join())
            .filter(Result::is_err)
            .count();

        if panicked > 0 {
            return Err(MessageBusError::ListenerPanicked {
                topic: topic.to_string(),
                panicked,
            });
        }
        Ok(listeners)
    }

    /// Publish a stored event under its event name.
    pub fn publish_record(&mut self, record: &EventRecord) -> Result<usize, MessageBusError> {
        let topic = record.event_name.clone();
        self.publish(&topic, record)
    }

    fn send<T>(
        &mut self,
        topic: &str,
        message: &T,
    ) -> Result<Vec<std::thread::JoinHandle<()>>, MessageBusError>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_string(message).map_err(|source| MessageBusError::Encode {
            topic: topic.to_string(),
            source,
        })?;
        let handles = self.emitter.emit(topic, json);
        debug!(topic, listeners = handles.len(), "message published");
        Ok(handles)
    }
}
