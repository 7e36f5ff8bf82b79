//! One bridge run: fetch circuits, connect, publish, disconnect.
//!
//! Nothing is published unless the fetch fully succeeds, and the broker is
//! not even contacted before then. Any failure aborts the run.

use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info};

use crate::broker::{Broker, BrokerError, Message};
use crate::chaos::{unique_in_order, ChaosError, Circuit, CircuitSource};
use crate::config::{MqttSettings, Settings};
use crate::discovery::SensorConfig;
use crate::metrics::{format_float, METRICS};
use crate::topics;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Chaos(#[from] ChaosError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("failed to encode discovery payload for {topic}")]
    Encode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}

/// What a successful run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub circuits: usize,
    pub messages: usize,
}

/// Run the bridge once.
///
/// `connect` is only called after the circuits have been fetched.
pub async fn run<S, C, Fut, B>(
    settings: &Settings,
    source: &S,
    connect: C,
) -> Result<RunSummary, BridgeError>
where
    S: CircuitSource + ?Sized,
    C: FnOnce(MqttSettings) -> Fut,
    Fut: Future<Output = Result<B, BrokerError>>,
    B: Broker,
{
    let circuits = source.fetch_circuits().await?;
    info!("Got {} circuits", circuits.len());

    let lines = unique_in_order(circuits.iter().map(|c| c.id.as_str()));
    let logins = unique_in_order(circuits.iter().map(|c| c.login.as_str()));
    info!("* Lines: {}", lines.join(", "));
    info!("* Logins: {}", logins.join(", "));

    let mut messages = index_messages(&settings.mqtt.topic_prefix, &circuits, Utc::now());
    let index_count = messages.len();
    for circuit in &circuits {
        messages.extend(circuit_messages(circuit, settings)?);
    }

    let mut broker = connect(settings.mqtt.clone()).await?;

    let total = messages.len();
    for (sent, message) in messages.into_iter().enumerate() {
        broker.publish(message).await?;
        if sent + 1 == index_count {
            info!("Published version and index messages");
        }
    }
    info!("Published details for {} circuits", circuits.len());

    broker.disconnect().await?;

    Ok(RunSummary {
        circuits: circuits.len(),
        messages: total,
    })
}

/// `$version`, `$lines`, `$logins` and `last_update` under the prefix.
pub fn index_messages(prefix: &str, circuits: &[Circuit], now: DateTime<Utc>) -> Vec<Message> {
    let lines = unique_in_order(circuits.iter().map(|c| c.id.as_str()));
    let logins = unique_in_order(circuits.iter().map(|c| c.login.as_str()));
    let timestamp = now.timestamp_micros() as f64 / 1e6;

    vec![
        Message::new(topics::index_topic(prefix, "$version"), crate::VERSION),
        Message::new(topics::index_topic(prefix, "$lines"), lines.join(",")),
        Message::new(topics::index_topic(prefix, "$logins"), logins.join(",")),
        Message::new(topics::index_topic(prefix, "last_update"), format_float(timestamp)),
    ]
}

/// Discovery configs (when enabled) followed by every state value.
pub fn circuit_messages(circuit: &Circuit, settings: &Settings) -> Result<Vec<Message>, BridgeError> {
    let prefix = &settings.mqtt.topic_prefix;
    let mut messages = Vec::with_capacity(METRICS.len() * 2);

    if settings.homeassistant.enabled {
        debug!(login = %circuit.login, "Publishing Home Assistant configuration");
        for metric in METRICS {
            let topic = topics::discovery_topic(
                &settings.homeassistant.discovery_prefix,
                &circuit.login,
                metric.name,
            );
            let payload = serde_json::to_string(&SensorConfig::new(circuit, metric, prefix))
                .map_err(|source| BridgeError::Encode {
                    topic: topic.clone(),
                    source,
                })?;
            messages.push(Message::retained(topic, payload));
        }
    }

    for metric in METRICS {
        messages.push(Message::new(
            topics::state_topic(prefix, &circuit.login, metric.topic),
            metric.format(circuit).to_string(),
        ));
    }

    Ok(messages)
}
