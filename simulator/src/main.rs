mod reading;

use chrono::Utc;
use clap::Parser;
use reading::Appliance;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;
use tracing::{error, info, warn};

/// Publishes simulated appliance power readings to the dashboard's MQTT topic.
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    broker: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    port: u16,

    /// Readings published per second across all devices.
    #[arg(long, env = "RATE", default_value_t = 50)]
    rate: u64,

    /// Ids of registered devices to publish for.
    #[arg(long, env = "DEVICE_IDS", value_delimiter = ',', default_value = "1,2,3,4,5")]
    device_ids: Vec<i64>,
}

const BURST_SIZE: u64 = 10;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    if args.device_ids.is_empty() || args.rate == 0 {
        error!("Need at least one device id and a positive rate");
        return;
    }

    info!("Starting power simulator");
    info!(
        "Broker: {}:{}, Rate: {} readings/s, Devices: {:?}",
        args.broker, args.port, args.rate, args.device_ids
    );

    let client_id = format!("power-sim-{}", uuid::Uuid::new_v4());
    let mut mqtt_options = MqttOptions::new(&client_id, &args.broker, args.port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 1000);

    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                error!("MQTT eventloop error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });

    tokio::time::sleep(Duration::from_secs(2)).await;

    let mut rng = rand::thread_rng();
    let appliances: Vec<Appliance> = args
        .device_ids
        .iter()
        .map(|&id| Appliance::for_device(&mut rng, id))
        .collect();

    let burst_interval = Duration::from_millis(BURST_SIZE * 1000 / args.rate);
    info!("Publishing in bursts of {} every {:?}", BURST_SIZE, burst_interval);

    let mut published = 0u64;
    let mut next = 0usize;

    loop {
        let burst_start = std::time::Instant::now();

        for _ in 0..BURST_SIZE {
            let appliance = &appliances[next % appliances.len()];
            next += 1;

            let reading = appliance.sample(&mut rng, Utc::now());
            let topic = format!("power/{}", reading.device_id);
            let payload = match serde_json::to_string(&reading) {
                Ok(p) => p,
                Err(e) => {
                    error!("Failed to serialize reading: {}", e);
                    continue;
                }
            };

            match client.publish(&topic, QoS::AtLeastOnce, false, payload).await {
                Ok(_) => published += 1,
                Err(e) => warn!("Failed to publish: {}", e),
            }
        }

        if published % 1000 < BURST_SIZE {
            info!("Published {} readings", published);
        }

        let elapsed = burst_start.elapsed();
        if elapsed < burst_interval {
            tokio::time::sleep(burst_interval - elapsed).await;
        } else if elapsed > burst_interval * 2 {
            warn!("Burst took {:?}, target was {:?}", elapsed, burst_interval);
        }
    }
}
