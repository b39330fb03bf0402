//! Output endpoint enumeration and selection policy

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::AudioError;

/// One active render endpoint, snapshotted at enumeration time
#[derive(Debug, Clone, serde::Serialize)]
pub struct AudioEndpoint {
    /// Stable id within one snapshot ("output:<name>")
    pub id: String,
    /// Device display name as reported by the host
    pub name: String,
    /// Whether this is the system default render endpoint
    pub is_default: bool,
}

/// Holds the current enumeration snapshot of output endpoints.
///
/// `refresh()` replaces the snapshot wholesale; ids from a previous
/// snapshot are only valid as long as the device still exists.
pub struct DeviceRegistry {
    endpoints: Vec<AudioEndpoint>,
}

impl DeviceRegistry {
    /// Create a registry with an initial enumeration
    pub fn new() -> Result<Self, AudioError> {
        let mut registry = Self {
            endpoints: Vec::new(),
        };
        registry.refresh()?;
        Ok(registry)
    }

    /// Re-enumerate active output endpoints, invalidating the old snapshot.
    /// An empty device list is a valid result, not an error.
    pub fn refresh(&mut self) -> Result<(), AudioError> {
        self.endpoints = enumerate_outputs()?;
        tracing::debug!("Enumerated {} output endpoints", self.endpoints.len());
        Ok(())
    }

    /// Current snapshot
    pub fn endpoints(&self) -> &[AudioEndpoint] {
        &self.endpoints
    }

    /// Look up an endpoint by id in the current snapshot
    pub fn find(&self, id: &str) -> Option<&AudioEndpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }
}

/// Default-selection policy: prefer an endpoint whose name contains one of
/// the virtual-cable marker strings (case-insensitive substring), else the
/// system default render endpoint, else the first enumerated device.
pub fn select_default<'a>(
    endpoints: &'a [AudioEndpoint],
    cable_markers: &[String],
) -> Option<&'a AudioEndpoint> {
    let by_marker = endpoints.iter().find(|e| {
        let name = e.name.to_lowercase();
        cable_markers
            .iter()
            .any(|marker| name.contains(&marker.to_lowercase()))
    });

    by_marker
        .or_else(|| endpoints.iter().find(|e| e.is_default))
        .or_else(|| endpoints.first())
}

fn enumerate_outputs() -> Result<Vec<AudioEndpoint>, AudioError> {
    let host = cpal::default_host();

    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = host
        .output_devices()
        .map_err(|e| AudioError::EnumerationFailed(e.to_string()))?;

    let endpoints = devices
        .filter_map(|device| device.name().ok())
        .map(|name| AudioEndpoint {
            id: format!("output:{}", name),
            is_default: default_name.as_ref() == Some(&name),
            name,
        })
        .collect();

    Ok(endpoints)
}

/// Resolve an output device by display name, or the system default when
/// `name` is `None`. Matching tries exact first, then case-insensitive
/// substring in either direction (host APIs truncate or decorate names).
pub fn find_output_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();

    match name {
        Some(name) => {
            let devices: Vec<_> = host
                .output_devices()
                .map_err(|e| AudioError::EnumerationFailed(e.to_string()))?
                .collect();

            devices
                .into_iter()
                .find(|d| {
                    d.name()
                        .map(|n| {
                            n == name
                                || n.to_lowercase().contains(&name.to_lowercase())
                                || name.to_lowercase().contains(&n.to_lowercase())
                        })
                        .unwrap_or(false)
                })
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
        }
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string())),
    }
}
