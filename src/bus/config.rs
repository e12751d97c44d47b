use serde::{Deserialize, Serialize};

/// Where handlers run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// On the thread that raised the event, in order.
    #[default]
    Synchronous,
    /// On a fixed pool of worker threads.
    Background { workers: usize },
}

/// Configuration for a [`DomainEventBus`](super::DomainEventBus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub mode: DispatchMode,
    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Synchronous,
            thread_name: "domain-events".to_string(),
        }
    }
}

impl BusConfig {
    pub fn background(workers: usize) -> Self {
        Self {
            mode: DispatchMode::Background { workers },
            ..Self::default()
        }
    }
}
