//! Output device enumeration and selection policy.
//!
//! Enumeration (via cpal) is snapshotted into plain [`DeviceDesc`] records
//! so the actual selection policy is a pure function over that list and
//! can be tested without audio hardware. Selection is recomputed on every
//! call, which makes device hot-swapping work at the cost of one
//! enumeration per clip.

use cpal::traits::{DeviceTrait, HostTrait};
use log::{debug, warn};

use crate::config::DEVICE_ENV;
use crate::error::{EngineError, EngineResult};

/// Host platform, as far as device-selection policy is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            _ => Self::Other,
        }
    }
}

/// Snapshot of one enumerated audio device.
#[derive(Debug, Clone)]
pub struct DeviceDesc {
    pub name: String,
    /// Host API name as reported by cpal (e.g. "CoreAudio", "ALSA").
    pub host: String,
    pub max_output_channels: u16,
    /// Native sample rate of the device's default output config, in Hz.
    pub default_sample_rate: u32,
    pub is_default_output: bool,
}

impl DeviceDesc {
    fn has_output(&self) -> bool {
        self.max_output_channels > 0
    }
}

/// Pick an output device from `devices`, returning its index.
///
/// Priority: a valid `override_index` wins outright (an invalid one is
/// logged and ignored). Then per platform: macOS prefers the system
/// default, then any CoreAudio device, then the first device with output
/// channels; Linux prefers a PulseAudio-named device (it carries the
/// user's routing preferences), then the system default, then the first
/// output-capable device; everything else takes the default or the first
/// output-capable device.
pub fn select_output_device(
    devices: &[DeviceDesc],
    platform: Platform,
    override_index: Option<usize>,
) -> EngineResult<usize> {
    if let Some(index) = override_index {
        match devices.get(index) {
            Some(desc) if desc.has_output() => {
                debug!("using device override: {}", desc.name);
                return Ok(index);
            }
            Some(desc) => {
                warn!("override device {index} ({}) has no output channels", desc.name);
            }
            None => warn!("override device index {index} out of range"),
        }
    }

    let default_output = devices
        .iter()
        .position(|d| d.is_default_output && d.has_output());
    let first_output = devices.iter().position(DeviceDesc::has_output);

    let picked = match platform {
        Platform::MacOs => default_output
            .or_else(|| {
                devices
                    .iter()
                    .position(|d| d.host == "CoreAudio" && d.has_output())
            })
            .or(first_output),
        Platform::Linux => devices
            .iter()
            .position(|d| d.name.to_lowercase().contains("pulse") && d.has_output())
            .or(default_output)
            .or(first_output),
        Platform::Other => default_output.or(first_output),
    };

    match picked {
        Some(index) => {
            debug!("selected output device: {}", devices[index].name);
            Ok(index)
        }
        None => Err(EngineError::NoOutputDevice),
    }
}

/// A resolved output target: the live cpal device plus its native rate.
pub struct OutputDevice {
    pub device: cpal::Device,
    pub name: String,
    pub sample_rate: u32,
}

/// Something that can report the current output device's sample rate.
///
/// The synthesis worker resamples against this, so tests can substitute a
/// fixed rate and run without audio hardware.
pub trait SampleRateSource: Send + Sync {
    fn device_sample_rate(&self) -> EngineResult<u32>;
}

/// Live device selector backed by the host audio subsystem.
///
/// Stateless: every [`resolve`](Self::resolve) re-enumerates devices and
/// re-reads the environment override.
#[derive(Debug, Default)]
pub struct DeviceSelector;

impl DeviceSelector {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the output device to play on, along with its native sample
    /// rate.
    pub fn resolve(&self) -> EngineResult<OutputDevice> {
        let (descs, mut handles) = snapshot_devices();
        for (i, desc) in descs.iter().enumerate() {
            debug!(
                "  [{i}] {} (host: {}, out: {}, rate: {})",
                desc.name, desc.host, desc.max_output_channels, desc.default_sample_rate
            );
        }

        let index = select_output_device(&descs, Platform::current(), read_device_override())?;
        let desc = &descs[index];
        Ok(OutputDevice {
            device: handles.swap_remove(index),
            name: desc.name.clone(),
            sample_rate: desc.default_sample_rate,
        })
    }
}

impl SampleRateSource for DeviceSelector {
    fn device_sample_rate(&self) -> EngineResult<u32> {
        self.resolve().map(|output| output.sample_rate)
    }
}

/// Read the `VOICEPIPE_DEVICE` override, warning on unparseable values.
fn read_device_override() -> Option<usize> {
    let raw = std::env::var(DEVICE_ENV).ok()?;
    match raw.parse::<usize>() {
        Ok(index) => Some(index),
        Err(_) => {
            warn!("invalid device override value: {raw}");
            None
        }
    }
}

/// Enumerate every device across all available hosts.
///
/// Devices that fail a config query are still listed (with zero output
/// channels) so indices line up with what the user sees elsewhere.
fn snapshot_devices() -> (Vec<DeviceDesc>, Vec<cpal::Device>) {
    let mut descs = Vec::new();
    let mut handles = Vec::new();

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else {
            continue;
        };
        let default_name = host.default_output_device().and_then(|d| d.name().ok());
        let Ok(devices) = host.devices() else {
            continue;
        };

        for device in devices {
            let name = device
                .name()
                .unwrap_or_else(|_| "<unknown>".to_string());
            let max_output_channels = device
                .supported_output_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);
            let default_sample_rate = device
                .default_output_config()
                .map(|c| c.sample_rate().0)
                .unwrap_or(0);

            descs.push(DeviceDesc {
                is_default_output: default_name.as_deref() == Some(name.as_str()),
                host: host_id.name().to_string(),
                name,
                max_output_channels,
                default_sample_rate,
            });
            handles.push(device);
        }
    }

    (descs, handles)
}
