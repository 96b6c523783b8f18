//! telegraf2ha - one-way bridge from Telegraf's MQTT output to Home
//! Assistant MQTT discovery.
//!
//! Subscribes to the raw metrics topic, derives stable sensor identities,
//! announces every newly seen measurement once via a discovery config
//! message, and republishes the field sets of allow-listed sensors:
//! - data:      telegraf2ha/{host}/{sensor}/data
//! - discovery: homeassistant/sensor/{host}/{sensor}_{field}/config

mod bus;
mod config;
mod identity;
mod rate;
mod record;
mod registry;
mod translator;

use anyhow::{Context, Result};
use bus::Outbound;
use config::BridgeConfig;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use translator::Translator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = BridgeConfig::from_env();

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();
    info!("telegraf2ha v{} starting", env!("CARGO_PKG_VERSION"));

    let mut options = MqttOptions::new("telegraf2ha", &config.broker_host, config.broker_port);
    options.set_keep_alive(Duration::from_secs(30));
    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        options.set_credentials(user, pass);
    }

    let (client, mut eventloop) = AsyncClient::new(options, 64);
    client
        .subscribe(&config.subscribe_topic, QoS::AtLeastOnce)
        .await
        .context("failed to subscribe to metrics topic")?;
    info!("subscribed to {}", config.subscribe_topic);

    // The translator pushes outbound messages into this channel; a
    // forwarder task drains it into the broker, fire-and-forget.
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let mut translator = Translator::new(&config, tx);

    let publisher = client.clone();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = publisher
                .publish(msg.topic.clone(), msg.qos, msg.retain, msg.payload)
                .await
            {
                error!("failed to publish to {}: {e}", msg.topic);
            }
        }
    });

    info!("Setup finished");

    // Messages are processed one at a time on this task; the registry is
    // never touched concurrently.
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                info!("Connected to MQTT broker");
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                if let Err(e) = translator.handle_message(&publish.payload) {
                    warn!("dropping message on {}: {e}", publish.topic);
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {e}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
