//! Daemon output that publishes every poll to an MQTT broker.
use anyhow::{Context, Result};
use homelink_lib::{
    air_conditioner::{AirConditioner, AirConditionerReadings},
    curtain::{Curtain, CurtainReadings},
    transport::Connect,
};
use log::*;
use paho_mqtt as mqtt;
use serde::Deserialize;
use std::{fs::File, time::Duration};

const TOPIC_AVAILABILITY: &str = "availability";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MqttConfig {
    pub url: String,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Prefix of every published topic.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Quality of service code to use
    #[serde(default)]
    qos: u8,
    #[serde(default = "default_keep_alive", with = "humantime_serde")]
    pub keep_alive: Duration,
}

fn default_topic() -> String {
    String::from("homelink")
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(20)
}

impl MqttConfig {
    pub const DEFAULT_CONFIG_FILE: &'static str = "homectl_mqtt.yml";

    pub fn load(path: &str) -> Result<Self> {
        debug!("Loading MQTT config file from {path}");
        let file = File::open(path).with_context(|| format!("Cannot open config file {path}"))?;
        serde_yaml::from_reader(file).with_context(|| format!("Cannot parse config file {path}"))
    }

    pub fn qos(&self) -> i32 {
        self.qos.min(2) as i32
    }

    fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("homectl-{:08x}", rand::random::<u32>()))
    }

    fn topic(&self, appendix: &str) -> String {
        format!("{}/{}", self.topic, appendix)
    }
}

/// Topic appendix and payload of every published value.
fn telemetry(ac: &AirConditionerReadings, curtain: &CurtainReadings) -> Vec<(&'static str, String)> {
    vec![
        (
            "air_conditioner/ambient_temperature",
            ac.ambient_temperature.to_string(),
        ),
        (
            "air_conditioner/desired_temperature",
            ac.desired_temperature.to_string(),
        ),
        ("air_conditioner/fan_speed", ac.fan_speed.to_string()),
        ("curtain/status", curtain.curtain_status.to_string()),
        (
            "curtain/outdoor_temperature",
            curtain.outdoor_temperature.to_string(),
        ),
        (
            "curtain/outdoor_pressure",
            curtain.outdoor_pressure.to_string(),
        ),
        (
            "curtain/light_intensity",
            curtain.light_intensity.to_string(),
        ),
    ]
}

pub fn run_daemon<A: Connect, B: Connect>(
    ac: &mut AirConditioner<A>,
    curtain: &mut Curtain<B>,
    poll_interval: &Duration,
    config_file: &str,
) -> Result<()> {
    let config = MqttConfig::load(config_file)?;
    trace!("MQTT config: {config:?}");

    let create_options = mqtt::CreateOptionsBuilder::new()
        .server_uri(&config.url)
        .client_id(config.client_id())
        .finalize();
    let mut client =
        mqtt::Client::new(create_options).with_context(|| "Error creating mqtt client")?;
    client.set_timeout(Duration::from_secs(5));

    let availability = config.topic(TOPIC_AVAILABILITY);
    let mut conn_builder = mqtt::ConnectOptionsBuilder::new();
    conn_builder
        .keep_alive_interval(config.keep_alive)
        .clean_session(true)
        .will_message(mqtt::Message::new_retained(
            &availability,
            "offline",
            config.qos(),
        ));
    if let Some(user_name) = &config.username {
        conn_builder.user_name(user_name);
    }
    if let Some(password) = &config.password {
        conn_builder.password(password);
    }

    client
        .connect(conn_builder.finalize())
        .with_context(|| format!("Mqtt client unable to connect to {}", config.url))?;
    info!("Connected to MQTT broker {}", config.url);

    client
        .publish(mqtt::Message::new_retained(
            &availability,
            "online",
            config.qos(),
        ))
        .with_context(|| "Cannot publish mqtt message")?;

    loop {
        ac.update();
        curtain.update();
        for (appendix, payload) in telemetry(&ac.readings(), &curtain.readings()) {
            let msg = mqtt::Message::new(config.topic(appendix), payload, config.qos());
            client
                .publish(msg)
                .with_context(|| "Cannot publish mqtt message")?;
        }
        std::thread::sleep(*poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config: MqttConfig = serde_yaml::from_str("url: tcp://localhost:1883\n").unwrap();
        assert_eq!(config.url, "tcp://localhost:1883");
        assert_eq!(config.topic, "homelink");
        assert_eq!(config.qos(), 0);
        assert_eq!(config.keep_alive, Duration::from_secs(20));
        assert!(config.username.is_none());
        assert!(config.client_id().starts_with("homectl-"));
    }

    #[test]
    fn config_overrides() {
        let config: MqttConfig = serde_yaml::from_str(
            "url: tcp://broker:1883\nclient_id: livingroom\ntopic: home/livingroom\nqos: 1\nkeep_alive: 1m\n",
        )
        .unwrap();
        assert_eq!(config.client_id(), "livingroom");
        assert_eq!(config.qos(), 1);
        assert_eq!(config.keep_alive, Duration::from_secs(60));
        assert_eq!(config.topic(TOPIC_AVAILABILITY), "home/livingroom/availability");
    }

    #[test]
    fn telemetry_topics() {
        let ac = AirConditionerReadings {
            ambient_temperature: 21.5,
            desired_temperature: 23.0,
            fan_speed: 12,
        };
        let values = telemetry(&ac, &CurtainReadings::default());
        assert_eq!(values.len(), 7);
        assert_eq!(
            values[0],
            ("air_conditioner/ambient_temperature", String::from("21.5"))
        );
        assert_eq!(values[1].1, "23");
        assert_eq!(values[2], ("air_conditioner/fan_speed", String::from("12")));
    }
}
