use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use whereismyfox_domain::{Command, Device};

/// Device row as stored in the `devices` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRow {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub endpoint: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: String,
}

/// Expects columns ordered as id, user_id, name, endpoint, latitude, longitude, timestamp
impl From<&Row> for DeviceRow {
    fn from(row: &Row) -> Self {
        DeviceRow {
            id: row.get(0),
            user_id: row.get(1),
            name: row.get(2),
            endpoint: row.get(3),
            latitude: row.get(4),
            longitude: row.get(5),
            timestamp: row.get(6),
        }
    }
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            id: row.id,
            user: row.user_id, // user is reserved in PostgreSQL
            name: row.name,
            endpoint: row.endpoint,
            latitude: row.latitude,
            longitude: row.longitude,
            timestamp: row.timestamp,
        }
    }
}

/// Catalog row as stored in the `commands` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRow {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl From<&Row> for CommandRow {
    fn from(row: &Row) -> Self {
        CommandRow {
            id: row.get(0),
            name: row.get(1),
            description: row.get(2),
        }
    }
}

impl From<CommandRow> for Command {
    fn from(row: CommandRow) -> Self {
        Command {
            id: row.id,
            name: row.name,
            description: row.description,
        }
    }
}
