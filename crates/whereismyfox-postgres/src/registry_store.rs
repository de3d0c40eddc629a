use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{debug, instrument};
use whereismyfox_domain::{
    format_location_timestamp, Command, CreateCommandInput, CreateDeviceInput, Device,
    DomainError, DomainResult, RegistryStore, UpdateDeviceLocationInput,
};

use crate::client::PostgresClient;
use crate::rows::{CommandRow, DeviceRow};

const FOREIGN_KEY_VIOLATION: &str = "23503";
const DEVICE_FOREIGN_KEY: &str = "device_commands_device_id_fkey";
const COMMAND_FOREIGN_KEY: &str = "device_commands_command_id_fkey";

/// Key value from a foreign key violation detail such as
/// `Key (command_id)=(99) is not present in table "commands".`
fn violated_key(detail: &str) -> Option<&str> {
    let (_, rest) = detail.split_once(")=(")?;
    let (key, _) = rest.split_once(')')?;
    Some(key)
}

/// Map a failed association write onto the key that was missing
fn association_error(e: tokio_postgres::Error, device_id: i64) -> DomainError {
    if let Some(db_err) = e.as_db_error() {
        if db_err.code().code() == FOREIGN_KEY_VIOLATION {
            match db_err.constraint() {
                Some(DEVICE_FOREIGN_KEY) => {
                    return DomainError::DeviceNotFound(device_id.to_string())
                }
                Some(COMMAND_FOREIGN_KEY) => {
                    let key = db_err.detail().and_then(violated_key).unwrap_or("unknown");
                    return DomainError::CommandNotFound(key.to_string());
                }
                _ => {}
            }
        }
    }
    DomainError::StorageError(e.into())
}

/// PostgreSQL implementation of RegistryStore
#[derive(Clone)]
pub struct PostgresRegistryStore {
    client: PostgresClient,
}

impl PostgresRegistryStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RegistryStore for PostgresRegistryStore {
    #[instrument(skip(self, input), fields(user = %input.user, device_name = %input.name))]
    async fn add_device(&self, input: CreateDeviceInput) -> DomainResult<Device> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::StorageError)?;

        let row = conn
            .query_one(
                r#"INSERT INTO devices (user_id, name, endpoint)
                   VALUES ($1, $2, $3)
                   RETURNING id, user_id, name, endpoint, latitude, longitude, "timestamp""#,
                &[&input.user, &input.name, &input.endpoint],
            )
            .await
            .map_err(|e| DomainError::StorageError(e.into()))?;

        let device: Device = DeviceRow::from(&row).into();
        debug!(device_id = device.id, "registered device");
        Ok(device)
    }

    #[instrument(skip(self))]
    async fn get_device_by_id(&self, device_id: i64) -> DomainResult<Option<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::StorageError)?;

        let row = conn
            .query_opt(
                r#"SELECT id, user_id, name, endpoint, latitude, longitude, "timestamp"
                   FROM devices
                   WHERE id = $1"#,
                &[&device_id],
            )
            .await
            .map_err(|e| DomainError::StorageError(e.into()))?;

        Ok(row.map(|row| Device::from(DeviceRow::from(&row))))
    }

    #[instrument(skip(self))]
    async fn list_devices_for_user(&self, user: &str) -> DomainResult<Vec<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::StorageError)?;

        let rows = conn
            .query(
                r#"SELECT id, user_id, name, endpoint, latitude, longitude, "timestamp"
                   FROM devices
                   WHERE user_id = $1
                   ORDER BY id ASC"#,
                &[&user],
            )
            .await
            .map_err(|e| DomainError::StorageError(e.into()))?;

        debug!("found {} devices for user", rows.len());

        Ok(rows
            .iter()
            .map(|row| Device::from(DeviceRow::from(row)))
            .collect())
    }

    #[instrument(skip(self, input), fields(device_id = input.device_id))]
    async fn update_device_location(&self, input: UpdateDeviceLocationInput) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::StorageError)?;

        let timestamp = format_location_timestamp(Utc::now());

        let updated = conn
            .execute(
                r#"UPDATE devices
                   SET latitude = $2, longitude = $3, "timestamp" = $4
                   WHERE id = $1"#,
                &[&input.device_id, &input.latitude, &input.longitude, &timestamp],
            )
            .await
            .map_err(|e| DomainError::StorageError(e.into()))?;

        if updated == 0 {
            return Err(DomainError::DeviceNotFound(input.device_id.to_string()));
        }

        debug!(%timestamp, "updated device location");
        Ok(())
    }

    #[instrument(skip(self, input), fields(command_id = input.id, command_name = %input.name))]
    async fn add_command(&self, input: CreateCommandInput) -> DomainResult<Command> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::StorageError)?;

        let inserted = conn
            .execute(
                "INSERT INTO commands (id, name, description)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (id) DO NOTHING",
                &[&input.id, &input.name, &input.description],
            )
            .await
            .map_err(|e| DomainError::StorageError(e.into()))?;

        let command = Command::from(input);
        if inserted == 1 {
            debug!("added catalog command");
            return Ok(command);
        }

        let row = conn
            .query_one(
                "SELECT id, name, description FROM commands WHERE id = $1",
                &[&command.id],
            )
            .await
            .map_err(|e| DomainError::StorageError(e.into()))?;

        let existing: Command = CommandRow::from(&row).into();
        if existing != command {
            return Err(DomainError::CommandConflict(command.id.to_string()));
        }

        debug!("catalog command already present");
        Ok(command)
    }

    #[instrument(skip(self))]
    async fn add_command_for_device(&self, device_id: i64, command_id: i64) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::StorageError)?;

        conn.execute(
            "INSERT INTO device_commands (device_id, command_id)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
            &[&device_id, &command_id],
        )
        .await
        .map_err(|e| association_error(e, device_id))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_commands_for_device(&self, device_id: i64) -> DomainResult<Vec<Command>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::StorageError)?;

        let rows = conn
            .query(
                "SELECT c.id, c.name, c.description
                 FROM device_commands dc
                 INNER JOIN commands c ON dc.command_id = c.id
                 WHERE dc.device_id = $1
                 ORDER BY c.id ASC",
                &[&device_id],
            )
            .await
            .map_err(|e| DomainError::StorageError(e.into()))?;

        debug!("found {} pending commands", rows.len());

        Ok(rows
            .iter()
            .map(|row| Command::from(CommandRow::from(row)))
            .collect())
    }

    #[instrument(skip(self, command_ids), fields(command_count = command_ids.len()))]
    async fn update_commands_for_device(
        &self,
        device_id: i64,
        command_ids: Vec<i64>,
    ) -> DomainResult<()> {
        let command_ids: Vec<i64> = command_ids
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::StorageError)?;

        // Dropping the transaction without commit rolls it back
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::StorageError(e.into()))?;

        // Row lock serializes writers of this device only
        let locked = tx
            .query_opt("SELECT id FROM devices WHERE id = $1 FOR UPDATE", &[&device_id])
            .await
            .map_err(|e| DomainError::StorageError(e.into()))?;
        if locked.is_none() {
            return Err(DomainError::DeviceNotFound(device_id.to_string()));
        }

        let removed = tx
            .execute(
                "DELETE FROM device_commands WHERE device_id = $1",
                &[&device_id],
            )
            .await
            .map_err(|e| DomainError::StorageError(e.into()))?;

        tx.execute(
            "INSERT INTO device_commands (device_id, command_id)
             SELECT $1::BIGINT, UNNEST($2::BIGINT[])",
            &[&device_id, &command_ids],
        )
        .await
        .map_err(|e| association_error(e, device_id))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::StorageError(e.into()))?;

        debug!(removed, pending = command_ids.len(), "replaced pending commands");
        Ok(())
    }
}
