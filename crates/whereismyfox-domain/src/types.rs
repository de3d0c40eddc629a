use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A registered device and its last reported location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub user: String,
    pub name: String,
    pub endpoint: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Empty until the device reports its first location
    pub timestamp: String,
}

impl Device {
    pub fn has_reported(&self) -> bool {
        !self.timestamp.is_empty()
    }

    /// Time of the last location report, if any
    pub fn last_reported_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// Catalog entry for a remote action a device can be asked to perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Reference to a device as handed out in listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceReference {
    pub id: i64,
}

impl DeviceReference {
    pub fn uri(&self) -> String {
        format!("/device/{}", self.id)
    }
}

impl From<&Device> for DeviceReference {
    fn from(device: &Device) -> Self {
        DeviceReference { id: device.id }
    }
}

/// Input for registering a new device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDeviceInput {
    pub user: String,
    pub name: String,
    pub endpoint: String,
}

/// Input for overwriting a device's last known location
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDeviceLocationInput {
    pub device_id: i64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Input for seeding a command catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCommandInput {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl From<CreateCommandInput> for Command {
    fn from(input: CreateCommandInput) -> Self {
        Command {
            id: input.id,
            name: input.name,
            description: input.description,
        }
    }
}

/// Renders the moment a location was stored, e.g. `2026-10-19T08:15:00Z`
pub fn format_location_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The static command catalog every deployment is seeded with
pub fn default_command_catalog() -> Vec<CreateCommandInput> {
    [
        (1, "Track", "Start tracking a device"),
        (2, "Untrack", "Stop tracking a device"),
        (3, "Wipe", "Wipe a device's personal information"),
    ]
    .into_iter()
    .map(|(id, name, description)| CreateCommandInput {
        id,
        name: name.to_string(),
        description: description.to_string(),
    })
    .collect()
}
