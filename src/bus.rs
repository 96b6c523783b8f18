//! Outbound plumbing between the translation core and the MQTT client.
//!
//! The core never touches the broker directly: it pushes `Outbound`
//! messages into an unbounded channel and a forwarder task in `main`
//! drains them into `AsyncClient::publish`. Tests assert on the channel.

use rumqttc::QoS;
use tokio::sync::mpsc;

/// One message the core wants on the wire.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

impl Outbound {
    /// QoS 1, retain=false: both discovery and data messages use this.
    pub fn at_least_once(topic: String, payload: String) -> Self {
        Self {
            topic,
            payload,
            qos: QoS::AtLeastOnce,
            retain: false,
        }
    }
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;
