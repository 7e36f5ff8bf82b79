//! Home Assistant MQTT discovery payloads.
//!
//! One retained config message per (circuit, metric) lets Home Assistant
//! create a sensor bound to the metric's state topic, grouped under one
//! device per login.

use serde::Serialize;

use crate::chaos::Circuit;
use crate::metrics::MetricDescriptor;
use crate::topics;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorConfig {
    pub name: String,
    pub icon: &'static str,
    pub state_topic: String,
    pub unique_id: String,
    pub unit_of_measurement: &'static str,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: String,
    pub name: String,
    pub sw_version: &'static str,
}

impl SensorConfig {
    pub fn new(circuit: &Circuit, metric: &MetricDescriptor, topic_prefix: &str) -> Self {
        Self {
            name: format!("{} {}", circuit.login, metric.name),
            icon: metric.icon,
            state_topic: topics::state_topic(topic_prefix, &circuit.login, metric.topic),
            unique_id: format!("{}_{}", topics::sanitize_login(&circuit.login), metric.name),
            unit_of_measurement: metric.unit,
            device: DeviceInfo {
                identifiers: circuit.login.clone(),
                name: format!("AAISP Circuit {} ({})", circuit.login, circuit.postcode.trim()),
                sw_version: crate::VERSION,
            },
        }
    }
}
