use crate::errors::{Error, Result};
use crate::metrics::{INVALID_READINGS_TOTAL, READINGS_TOTAL, VALID_READINGS_TOTAL};
use crate::model::Reading;
use crate::validate::validate;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub const READINGS_TOPIC: &str = "power/#";

pub async fn run_mqtt(
    broker: String,
    port: u16,
    client_id: String,
    tx: mpsc::Sender<Reading>,
) -> Result<()> {
    info!(broker = %broker, port, "Connecting to MQTT broker");

    let mut mqtt_options = MqttOptions::new(client_id, broker, port);
    mqtt_options.set_keep_alive(std::time::Duration::from_secs(30));
    mqtt_options.set_clean_session(false);

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 1000);

    client
        .subscribe(READINGS_TOPIC, QoS::AtLeastOnce)
        .await
        .map_err(Error::Mqtt)?;

    info!(topic = READINGS_TOPIC, "Subscribed with QoS 1");

    loop {
        match eventloop.poll().await {
            Ok(notification) => {
                if let Event::Incoming(Packet::Publish(publish)) = notification {
                    READINGS_TOTAL.inc();

                    debug!(
                        topic = %publish.topic,
                        bytes = publish.payload.len(),
                        "Received reading"
                    );

                    if let Err(e) = process_message(&publish.payload, &tx).await {
                        match e {
                            Error::ChannelSend => {
                                error!("Reading channel closed, stopping MQTT loop");
                                return Err(e);
                            }
                            _ => {
                                warn!(error = %e, topic = %publish.topic, "Rejected reading");
                                INVALID_READINGS_TOTAL.inc();
                            }
                        }
                    }
                }
            }
            Err(e) => {
                error!("MQTT error: {}", e);
                // rumqttc reconnects on the next poll
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}

/// Parses, validates and queues a single reading.
async fn process_message(payload: &[u8], tx: &mpsc::Sender<Reading>) -> Result<()> {
    let reading = serde_json::from_slice::<Reading>(payload)?;

    validate(&reading)?;

    tx.send(reading).await.map_err(|_| Error::ChannelSend)?;
    VALID_READINGS_TOTAL.inc();
    Ok(())
}
