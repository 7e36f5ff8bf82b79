//! Broker seam — the downstream side of the bridge.
//!
//! The bridge only ever publishes a message or disconnects, so that is
//! all the trait asks for. `MqttBroker` is the real implementation.

use async_trait::async_trait;
use thiserror::Error;

pub mod mqtt;

pub use mqtt::MqttBroker;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("error connecting to MQTT broker {addr}")]
    Connect {
        addr: String,
        #[source]
        source: rumqttc::ConnectionError,
    },

    #[error("MQTT publish failure: {topic}: {reason}")]
    Publish { topic: String, reason: String },

    #[error("MQTT connection lost")]
    Connection(#[source] rumqttc::ConnectionError),

    #[error("MQTT disconnect failed: {0}")]
    Disconnect(String),
}

/// A single outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }

    pub fn retained(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            retain: true,
            ..Self::new(topic, payload)
        }
    }
}

#[async_trait]
pub trait Broker: Send {
    async fn publish(&mut self, message: Message) -> Result<(), BrokerError>;

    /// Flush anything queued and close the connection.
    async fn disconnect(&mut self) -> Result<(), BrokerError>;
}
