use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{DomainError, DomainResult};
use crate::repository::RegistryStore;
use crate::types::{
    format_location_timestamp, Command, CreateCommandInput, CreateDeviceInput, Device,
    UpdateDeviceLocationInput,
};

#[derive(Default)]
struct RegistryState {
    last_device_id: i64,
    devices: BTreeMap<i64, Device>,
    commands: BTreeMap<i64, Command>,
    device_commands: BTreeMap<i64, BTreeSet<i64>>,
}

impl RegistryState {
    fn require_device(&self, device_id: i64) -> DomainResult<()> {
        if self.devices.contains_key(&device_id) {
            Ok(())
        } else {
            Err(DomainError::DeviceNotFound(device_id.to_string()))
        }
    }

    fn require_command(&self, command_id: i64) -> DomainResult<()> {
        if self.commands.contains_key(&command_id) {
            Ok(())
        } else {
            Err(DomainError::CommandNotFound(command_id.to_string()))
        }
    }
}

/// In-memory implementation of RegistryStore.
///
/// Every mutation checks all referenced keys before touching state, so a
/// rejected call leaves the registry exactly as it was.
///
/// All state sits behind one lock, so writes to different devices are
/// serialized too. The lock is never held across an await; use
/// `PostgresRegistryStore` where writers to different devices must proceed
/// in parallel.
pub struct InMemoryRegistryStore {
    state: Arc<RwLock<RegistryState>>,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
        }
    }
}

impl Default for InMemoryRegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    #[instrument(skip(self, input), fields(user = %input.user, device_name = %input.name))]
    async fn add_device(&self, input: CreateDeviceInput) -> DomainResult<Device> {
        let mut state = self.state.write().await;
        state.last_device_id += 1;

        let device = Device {
            id: state.last_device_id,
            user: input.user,
            name: input.name,
            endpoint: input.endpoint,
            latitude: 0.0,
            longitude: 0.0,
            timestamp: String::new(),
        };
        state.devices.insert(device.id, device.clone());

        debug!(device_id = device.id, "registered device");
        Ok(device)
    }

    async fn get_device_by_id(&self, device_id: i64) -> DomainResult<Option<Device>> {
        let state = self.state.read().await;
        Ok(state.devices.get(&device_id).cloned())
    }

    async fn list_devices_for_user(&self, user: &str) -> DomainResult<Vec<Device>> {
        let state = self.state.read().await;
        Ok(state
            .devices
            .values()
            .filter(|device| device.user == user)
            .cloned()
            .collect())
    }

    #[instrument(skip(self, input), fields(device_id = input.device_id))]
    async fn update_device_location(&self, input: UpdateDeviceLocationInput) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let device = state
            .devices
            .get_mut(&input.device_id)
            .ok_or_else(|| DomainError::DeviceNotFound(input.device_id.to_string()))?;

        device.latitude = input.latitude;
        device.longitude = input.longitude;
        device.timestamp = format_location_timestamp(Utc::now());
        Ok(())
    }

    #[instrument(skip(self, input), fields(command_id = input.id, command_name = %input.name))]
    async fn add_command(&self, input: CreateCommandInput) -> DomainResult<Command> {
        let mut state = self.state.write().await;
        let command = Command::from(input);

        if let Some(existing) = state.commands.get(&command.id) {
            if *existing != command {
                return Err(DomainError::CommandConflict(command.id.to_string()));
            }
            return Ok(command);
        }

        state.commands.insert(command.id, command.clone());
        Ok(command)
    }

    async fn add_command_for_device(&self, device_id: i64, command_id: i64) -> DomainResult<()> {
        let mut state = self.state.write().await;
        state.require_device(device_id)?;
        state.require_command(command_id)?;

        state
            .device_commands
            .entry(device_id)
            .or_default()
            .insert(command_id);
        Ok(())
    }

    async fn list_commands_for_device(&self, device_id: i64) -> DomainResult<Vec<Command>> {
        let state = self.state.read().await;
        let Some(command_ids) = state.device_commands.get(&device_id) else {
            return Ok(Vec::new());
        };

        Ok(command_ids
            .iter()
            .filter_map(|id| state.commands.get(id).cloned())
            .collect())
    }

    #[instrument(skip(self, command_ids), fields(command_count = command_ids.len()))]
    async fn update_commands_for_device(
        &self,
        device_id: i64,
        command_ids: Vec<i64>,
    ) -> DomainResult<()> {
        let mut state = self.state.write().await;
        state.require_device(device_id)?;

        let replacement: BTreeSet<i64> = command_ids.into_iter().collect();
        for command_id in &replacement {
            state.require_command(*command_id)?;
        }

        debug!(pending = replacement.len(), "replaced pending commands");
        state.device_commands.insert(device_id, replacement);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::default_command_catalog;

    fn device_input(user: &str, name: &str, endpoint: &str) -> CreateDeviceInput {
        CreateDeviceInput {
            user: user.to_string(),
            name: name.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Three devices; device N gets the first N catalog commands
    async fn seeded_store() -> InMemoryRegistryStore {
        let store = InMemoryRegistryStore::new();
        for command in default_command_catalog() {
            store.add_command(command).await.unwrap();
        }

        let devices = [
            device_input("ggp@mozilla.com", "test-device1", "http://push.mozilla.com/83c8e238"),
            device_input("ggp@mozilla.com", "test-device2", "http://push.mozilla.com/1e16a9e1"),
            device_input("ggoncalves@mozilla.com", "test-device3", "http://push.mozilla.com/f8303f58"),
        ];
        for (i, input) in devices.into_iter().enumerate() {
            let device = store.add_device(input).await.unwrap();
            for command_id in 1..=(i as i64 + 1) {
                store.add_command_for_device(device.id, command_id).await.unwrap();
            }
        }
        store
    }

    fn command_ids(commands: &[Command]) -> Vec<i64> {
        commands.iter().map(|c| c.id).collect()
    }

    #[tokio::test]
    async fn test_added_device_matches_lookup() {
        let store = InMemoryRegistryStore::new();
        let added = store
            .add_device(device_input("ggp@mozilla.com", "phone", "http://push.example/1"))
            .await
            .unwrap();

        assert_eq!(added.id, 1);
        assert_eq!(added.latitude, 0.0);
        assert_eq!(added.longitude, 0.0);
        assert_eq!(added.timestamp, "");

        let fetched = store.get_device_by_id(added.id).await.unwrap();
        assert_eq!(fetched, Some(added));
    }

    #[tokio::test]
    async fn test_get_unknown_device_is_none() {
        let store = seeded_store().await;
        assert_eq!(store.get_device_by_id(42).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_registrations_get_distinct_ids() {
        let store = InMemoryRegistryStore::new();
        let input = device_input("ggp@mozilla.com", "phone", "http://push.example/1");
        let first = store.add_device(input.clone()).await.unwrap();
        let second = store.add_device(input).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_update_device_location() {
        let store = seeded_store().await;
        store
            .update_device_location(UpdateDeviceLocationInput {
                device_id: 1,
                latitude: 37.38835,
                longitude: -122.082724,
            })
            .await
            .unwrap();

        let device = store.get_device_by_id(1).await.unwrap().unwrap();
        assert_eq!(device.latitude, 37.38835);
        assert_eq!(device.longitude, -122.082724);
        assert!(device.has_reported());
        assert!(device.last_reported_at().is_some());

        let untouched = store.get_device_by_id(2).await.unwrap().unwrap();
        assert_eq!(untouched.timestamp, "");
    }

    #[tokio::test]
    async fn test_update_location_of_unknown_device() {
        let store = seeded_store().await;
        let result = store
            .update_device_location(UpdateDeviceLocationInput {
                device_id: 42,
                latitude: 1.0,
                longitude: 1.0,
            })
            .await;
        assert!(matches!(result, Err(DomainError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_devices_for_user() {
        let store = seeded_store().await;

        let devices = store.list_devices_for_user("ggp@mozilla.com").await.unwrap();
        assert_eq!(devices.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(devices.iter().all(|d| d.user == "ggp@mozilla.com"));

        let devices = store
            .list_devices_for_user("ggoncalves@mozilla.com")
            .await
            .unwrap();
        assert_eq!(devices.iter().map(|d| d.id).collect::<Vec<_>>(), vec![3]);

        assert!(store
            .list_devices_for_user("nobody@mozilla.com")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_add_command_is_idempotent_for_identical_content() {
        let store = seeded_store().await;
        let track = default_command_catalog().remove(0);
        assert_eq!(store.add_command(track.clone()).await.unwrap(), Command::from(track));
    }

    #[tokio::test]
    async fn test_add_command_conflicting_content() {
        let store = seeded_store().await;
        let result = store
            .add_command(CreateCommandInput {
                id: 1,
                name: "Ring".to_string(),
                description: "Play a sound".to_string(),
            })
            .await;
        assert!(matches!(result, Err(DomainError::CommandConflict(_))));
    }

    #[tokio::test]
    async fn test_list_commands_for_device() {
        let store = seeded_store().await;
        for device_id in 1..=3 {
            let commands = store.list_commands_for_device(device_id).await.unwrap();
            assert_eq!(commands.len(), device_id as usize);
        }
        let commands = store.list_commands_for_device(3).await.unwrap();
        assert_eq!(command_ids(&commands), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_readding_command_for_device_does_not_duplicate() {
        let store = seeded_store().await;
        store.add_command_for_device(2, 1).await.unwrap();
        store.add_command_for_device(2, 1).await.unwrap();

        let commands = store.list_commands_for_device(2).await.unwrap();
        assert_eq!(command_ids(&commands), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_add_command_for_unknown_keys() {
        let store = seeded_store().await;
        assert!(matches!(
            store.add_command_for_device(42, 1).await,
            Err(DomainError::DeviceNotFound(_))
        ));
        assert!(matches!(
            store.add_command_for_device(1, 99).await,
            Err(DomainError::CommandNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_commands_replaces_and_deduplicates() {
        let store = seeded_store().await;
        store
            .update_commands_for_device(1, vec![3, 2, 3, 2])
            .await
            .unwrap();
        let commands = store.list_commands_for_device(1).await.unwrap();
        assert_eq!(command_ids(&commands), vec![2, 3]);

        store.update_commands_for_device(1, vec![3, 2]).await.unwrap();
        let again = store.list_commands_for_device(1).await.unwrap();
        assert_eq!(again, commands);

        store.update_commands_for_device(1, Vec::new()).await.unwrap();
        assert!(store.list_commands_for_device(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_update_leaves_commands_unchanged() {
        let store = seeded_store().await;
        let before = store.list_commands_for_device(2).await.unwrap();

        let result = store.update_commands_for_device(2, vec![3, 99]).await;
        assert!(matches!(result, Err(DomainError::CommandNotFound(_))));

        let after = store.list_commands_for_device(2).await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_different_devices() {
        let store = Arc::new(seeded_store().await);

        let mut handles = Vec::new();
        for device_id in 1..=3 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_commands_for_device(device_id, vec![device_id])
                    .await?;
                store
                    .update_device_location(UpdateDeviceLocationInput {
                        device_id,
                        latitude: device_id as f64,
                        longitude: -(device_id as f64),
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for device_id in 1..=3 {
            let commands = store.list_commands_for_device(device_id).await.unwrap();
            assert_eq!(command_ids(&commands), vec![device_id]);
            let device = store.get_device_by_id(device_id).await.unwrap().unwrap();
            assert_eq!(device.latitude, device_id as f64);
        }
    }

    #[tokio::test]
    async fn test_update_commands_for_unknown_device() {
        let store = seeded_store().await;
        let result = store.update_commands_for_device(42, vec![1]).await;
        assert!(matches!(result, Err(DomainError::DeviceNotFound(_))));
    }
}
