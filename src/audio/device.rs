use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use log::{debug, warn};

use crate::error::AudioError;

/// Summary of an output device for listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub default_sample_rate: u32,
    pub channels: u16,
    pub is_default: bool,
}

/// Enumerates output devices and picks the one to play through
pub struct DeviceManager {
    host: Host,
}

impl DeviceManager {
    pub fn new() -> Self {
        let host = cpal::default_host();
        debug!("Using audio host {:?}", host.id());
        DeviceManager { host }
    }

    /// All output devices with a usable default configuration, sorted by name
    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, AudioError> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok());

        let devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;

        let mut infos: Vec<DeviceInfo> = devices
            .filter_map(|device| {
                let info = Self::describe(&device, default_name.as_deref());
                if info.is_none() {
                    debug!("Skipping output device without a default configuration");
                }
                info
            })
            .collect();

        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos.dedup_by(|a, b| a.name == b.name);
        Ok(infos)
    }

    /// Information about `device`, if it can report its default output config
    pub fn device_info(&self, device: &Device) -> Option<DeviceInfo> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok());
        Self::describe(device, default_name.as_deref())
    }

    /// Select `preferred` by name, falling back to the default output device
    /// when it is absent or not found.
    pub fn select(&self, preferred: Option<&str>) -> Result<Device, AudioError> {
        if let Some(name) = preferred {
            match self.find_by_name(name) {
                Ok(Some(device)) => return Ok(device),
                Ok(None) => {
                    warn!("{}; using the default output device", AudioError::DeviceNotFound {
                        device: name.to_string(),
                    });
                }
                Err(e) => warn!("{}; using the default output device", e),
            }
        }

        self.host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)
    }

    /// Look up an output device by exact name
    pub fn find_by_name(&self, name: &str) -> Result<Option<Device>, AudioError> {
        let mut devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;

        Ok(devices.find(|device| device.name().map(|n| n == name).unwrap_or(false)))
    }

    fn describe(device: &Device, default_name: Option<&str>) -> Option<DeviceInfo> {
        let name = device.name().ok()?;
        let config = device.default_output_config().ok()?;

        Some(DeviceInfo {
            is_default: default_name == Some(name.as_str()),
            name,
            default_sample_rate: config.sample_rate().0,
            channels: config.channels(),
        })
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}
