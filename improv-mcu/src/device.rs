//! Device description reported to hosts

use serde::{Deserialize, Serialize};

/// Token in a URL template replaced by the device's address
pub const URL_PLACEHOLDER: &str = "{LOCAL_IPV4}";

/// Hardware variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChipFamily {
    #[serde(rename = "ESP32")]
    Esp32,
    #[serde(rename = "ESP32-C3")]
    Esp32C3,
    #[serde(rename = "ESP32-S2")]
    Esp32S2,
    #[serde(rename = "ESP32-S3")]
    Esp32S3,
    #[serde(rename = "ESP8266")]
    Esp8266,
}

impl ChipFamily {
    /// Label sent in GET_DEVICE_INFO responses
    pub fn label(&self) -> &'static str {
        match self {
            ChipFamily::Esp32 => "ESP32",
            ChipFamily::Esp32C3 => "ESP32-C3",
            ChipFamily::Esp32S2 => "ESP32-S2",
            ChipFamily::Esp32S3 => "ESP32-S3",
            ChipFamily::Esp8266 => "ESP8266",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub firmware_name: String,
    pub firmware_version: String,
    pub chip_family: ChipFamily,
    pub device_name: String,
    /// URL where the user finishes onboarding, may contain [`URL_PLACEHOLDER`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_url: Option<String>,
}

impl DeviceInfo {
    /// Fields of a GET_DEVICE_INFO response, in wire order
    pub fn info_fields(&self) -> [&str; 4] {
        [
            self.firmware_name.as_str(),
            self.firmware_version.as_str(),
            self.chip_family.label(),
            self.device_name.as_str(),
        ]
    }

    /// Device URL for the given address. Without a template this is
    /// `http://<address>`.
    pub fn url_for(&self, address: &str) -> String {
        match &self.device_url {
            Some(template) => template.replace(URL_PLACEHOLDER, address),
            None => format!("http://{address}"),
        }
    }
}
