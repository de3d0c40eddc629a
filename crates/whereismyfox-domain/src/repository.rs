use async_trait::async_trait;

use crate::error::DomainResult;
use crate::types::{
    Command, CreateCommandInput, CreateDeviceInput, Device, UpdateDeviceLocationInput,
};

/// Persistence for devices, the command catalog and per-device pending commands.
///
/// Lookups of absent keys return `Ok(None)` or an empty list, never an error,
/// so callers can tell "absent" apart from `DomainError::StorageError`.
/// Infrastructure crates (e.g. whereismyfox-postgres) implement this trait.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Register a device with no reported location and a freshly assigned id
    async fn add_device(&self, input: CreateDeviceInput) -> DomainResult<Device>;

    /// Get a device by primary key
    async fn get_device_by_id(&self, device_id: i64) -> DomainResult<Option<Device>>;

    /// List all devices owned by a user, ascending by id
    async fn list_devices_for_user(&self, user: &str) -> DomainResult<Vec<Device>>;

    /// Overwrite the device's coordinates and stamp the current time
    async fn update_device_location(&self, input: UpdateDeviceLocationInput) -> DomainResult<()>;

    /// Seed a catalog entry; re-adding identical content is a no-op
    async fn add_command(&self, input: CreateCommandInput) -> DomainResult<Command>;

    /// Mark a command as pending for a device; re-adding a pair succeeds
    async fn add_command_for_device(&self, device_id: i64, command_id: i64) -> DomainResult<()>;

    /// Commands pending for a device, ascending by command id
    async fn list_commands_for_device(&self, device_id: i64) -> DomainResult<Vec<Command>>;

    /// Atomically replace the device's pending set with `command_ids` (deduplicated)
    async fn update_commands_for_device(
        &self,
        device_id: i64,
        command_ids: Vec<i64>,
    ) -> DomainResult<()>;
}
