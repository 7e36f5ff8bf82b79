//! MQTT broker connection over `rumqttc`.
//!
//! The event loop is polled inline until the CONNACK arrives, so a bad
//! address or rejected login fails `connect`. After that it runs on its
//! own task until our DISCONNECT has gone out.

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{Broker, BrokerError, Message};
use crate::config::MqttSettings;

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const MAX_INFLIGHT: u16 = 100;
const REQUEST_CAPACITY: usize = 100;

pub struct MqttBroker {
    client: AsyncClient,
    driver: Option<JoinHandle<Result<(), ConnectionError>>>,
}

impl MqttBroker {
    pub async fn connect(settings: &MqttSettings) -> Result<Self, BrokerError> {
        let client_id = format!("aaisp2mqtt-{}", uuid::Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, settings.broker.clone(), settings.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_inflight(MAX_INFLIGHT);
        if let Some((username, password)) = settings.credentials() {
            options.set_credentials(username, password);
        }

        let addr = settings.address();
        info!("Connecting to MQTT broker {}", addr);

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        wait_for_connack(&mut eventloop)
            .await
            .map_err(|source| BrokerError::Connect { addr, source })?;
        info!("Connected to MQTT server {}", settings.broker);

        Ok(Self {
            client,
            driver: Some(tokio::spawn(drive(eventloop))),
        })
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

async fn drive(mut eventloop: EventLoop) -> Result<(), ConnectionError> {
    loop {
        match eventloop.poll().await? {
            Event::Outgoing(Outgoing::Disconnect) => return Ok(()),
            event => debug!(?event, "MQTT event"),
        }
    }
}

#[async_trait]
impl Broker for MqttBroker {
    async fn publish(&mut self, message: Message) -> Result<(), BrokerError> {
        debug!(topic = %message.topic, retain = message.retain, "Publishing");
        self.client
            .publish(
                message.topic.clone(),
                QoS::AtMostOnce,
                message.retain,
                message.payload,
            )
            .await
            .map_err(|e| BrokerError::Publish {
                topic: message.topic,
                reason: e.to_string(),
            })
    }

    async fn disconnect(&mut self) -> Result<(), BrokerError> {
        info!("Disconnecting from MQTT");
        self.client
            .disconnect()
            .await
            .map_err(|e| BrokerError::Disconnect(e.to_string()))?;

        match self.driver.take() {
            Some(driver) => match driver.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(BrokerError::Connection(e)),
                Err(e) => Err(BrokerError::Disconnect(e.to_string())),
            },
            None => Ok(()),
        }
    }
}

impl Drop for MqttBroker {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}
