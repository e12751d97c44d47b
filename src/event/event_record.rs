use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::DomainEvent;

/// Error when encoding or decoding an event payload.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("payload error: {message}")]
pub struct PayloadError {
    pub message: String,
}

impl From<bitcode::Error> for PayloadError {
    fn from(err: bitcode::Error) -> Self {
        PayloadError {
            message: err.to_string(),
        }
    }
}

/// The stored form of a raised event.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct EventRecord {
    pub id: Uuid,
    pub event_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_id: Option<String>,
    /// 1-based position within the aggregate's stream; 0 for free-standing events.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "payload_serde")]
    pub payload: Vec<u8>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

mod payload_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(payload: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(payload).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl EventRecord {
    pub fn new(event_name: impl Into<String>, payload: Vec<u8>, sequence: u64) -> Self {
        EventRecord {
            id: Uuid::new_v4(),
            event_name: event_name.into(),
            aggregate_id: None,
            sequence,
            timestamp: Utc::now(),
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Encode a domain event. Name and aggregate id are taken from the event.
    pub fn encode<E>(event: &E, sequence: u64) -> Result<Self, PayloadError>
    where
        E: DomainEvent + Serialize,
    {
        let payload = bitcode::serialize(event)?;
        let mut record = EventRecord::new(event.event_name(), payload, sequence);
        record.aggregate_id = event.aggregate_id().map(str::to_owned);
        Ok(record)
    }

    /// Deserialize the payload into the specified type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        Ok(bitcode::deserialize(&self.payload)?)
    }

    pub fn with_aggregate_id(mut self, aggregate_id: impl Into<String>) -> Self {
        self.aggregate_id = Some(aggregate_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Override the timestamp, e.g. when importing events recorded elsewhere.
    pub fn occurred_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Get the raw payload bytes.
    pub fn payload_bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.meta("correlation_id")
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.meta("causation_id")
    }
}
