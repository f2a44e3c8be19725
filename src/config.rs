use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Error};
use log::info;
use pi_pinout::{GpioPin, PhysicalPin, WiringPiPin};
use serde::{Deserialize, Serialize};

use crate::adc::Gain;

pub const CONFIG_PATH: &str = "config.ron";

#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub adc: AdcConfig,
    pub calibration: CalibrationConfig,
    pub sampling: SamplingConfig,
    pub server: ServerConfig,
    pub provisioning: ProvisioningConfig,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdcConfig {
    pub clock: Pin,
    pub data: Pin,
    pub gain: Gain,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum Pin {
    Physical(PhysicalPin),
    Gpio(GpioPin),
    WiringPi(WiringPiPin),
}

impl Pin {
    /// The BCM number rppal expects.
    pub fn bcm(self) -> u8 {
        let pin: GpioPin = match self {
            Pin::Physical(pin) => pin.into(),
            Pin::Gpio(pin) => pin,
            Pin::WiringPi(pin) => pin.into(),
        };
        pin.0
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            clock: Pin::Gpio(GpioPin(6)),
            data: Pin::Gpio(GpioPin(5)),
            gain: Gain::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Raw ADC counts per gram. Negative when the load cell is wired
    /// with the signal pair swapped.
    pub scale: f32,
    pub tare_samples: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            scale: -1100.0,
            tare_samples: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    pub samples: usize,
    pub interval_ms: u64,
}

impl SamplingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples: 5,
            interval_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub web_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            web_root: PathBuf::from("web"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub port: u16,
    pub credentials_path: PathBuf,
    pub country: String,
    pub interface: String,
    pub ssid: String,
    pub passphrase: String,
    pub channel: u8,
    pub address: String,
    pub dhcp_range: String,
    pub hostapd_conf: PathBuf,
    pub dnsmasq_conf: PathBuf,
    pub teardown_delay_ms: u64,
    pub scale_url: String,
}

impl ProvisioningConfig {
    pub fn teardown_delay(&self) -> Duration {
        Duration::from_millis(self.teardown_delay_ms)
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            port: 80,
            credentials_path: PathBuf::from("/etc/wpa_supplicant/wpa_supplicant.conf"),
            country: "US".to_string(),
            interface: "wlan0".to_string(),
            ssid: "FluidScale-Setup".to_string(),
            passphrase: "fluidscale".to_string(),
            channel: 7,
            address: "192.168.4.1".to_string(),
            dhcp_range: "192.168.4.2,192.168.4.20,255.255.255.0,24h".to_string(),
            hostapd_conf: PathBuf::from("/etc/hostapd/hostapd.conf"),
            dnsmasq_conf: PathBuf::from("/etc/dnsmasq.conf"),
            teardown_delay_ms: 5000,
            scale_url: "http://fluidscale.local:8080".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Config, Error> {
        Self::load_from(CONFIG_PATH)
    }

    /// Missing file means defaults; a file that exists must parse.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Config, Error> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No {} found, using built-in defaults", path.display());
            return Ok(Config::default());
        }

        let config = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            ron::from_str(&config).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }
}
