use garde::Validate;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::authenticator::{Authenticator, CallerRequest};
use crate::error::{DomainError, DomainResult};
use crate::repository::RegistryStore;
use crate::types::{
    Command, CreateDeviceInput, Device, DeviceReference, UpdateDeviceLocationInput,
};
use crate::validate::{finite, validate_request};

/// Service request for registering a device owned by the caller
#[derive(Debug, Clone, Validate)]
pub struct RegisterDeviceRequest {
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(url)]
    pub endpoint: String,
}

/// Service request for replacing a device's pending commands
#[derive(Debug, Clone, Validate)]
pub struct UpdateDeviceCommandsRequest {
    #[garde(skip)]
    pub device_id: i64,
    #[garde(length(max = 64))]
    pub command_ids: Vec<i64>,
}

/// Service request for reporting a device's location
#[derive(Debug, Clone, Validate)]
pub struct UpdateDeviceLocationRequest {
    #[garde(skip)]
    pub device_id: i64,
    #[garde(custom(finite), range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[garde(custom(finite), range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

/// Device operations on behalf of an authenticated caller.
///
/// Unauthenticated requests are rejected before the store is consulted.
/// A device owned by someone else is reported exactly like a missing one.
pub struct DeviceAccessService {
    registry_store: Arc<dyn RegistryStore>,
    authenticator: Arc<dyn Authenticator>,
}

impl DeviceAccessService {
    pub fn new(
        registry_store: Arc<dyn RegistryStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            registry_store,
            authenticator,
        }
    }

    /// Resolve the caller's user identifier
    pub fn identify(&self, request: &CallerRequest) -> DomainResult<String> {
        if !self.authenticator.is_authenticated(request) {
            return Err(DomainError::Unauthorized);
        }

        match self.authenticator.caller_identity(request) {
            Some(user) if !user.is_empty() => Ok(user),
            _ => Err(DomainError::Unauthorized),
        }
    }

    async fn authorize_device(&self, user: &str, device_id: i64) -> DomainResult<Device> {
        match self.registry_store.get_device_by_id(device_id).await? {
            Some(device) if device.user == user => Ok(device),
            Some(_) => {
                debug!(device_id, "device belongs to another user");
                Err(DomainError::DeviceNotFound(device_id.to_string()))
            }
            None => Err(DomainError::DeviceNotFound(device_id.to_string())),
        }
    }

    #[instrument(skip(self, caller))]
    pub async fn list_my_devices(&self, caller: &CallerRequest) -> DomainResult<Vec<DeviceReference>> {
        let user = self.identify(caller)?;

        let devices = self.registry_store.list_devices_for_user(&user).await?;

        debug!(count = devices.len(), "listed devices");
        Ok(devices.iter().map(DeviceReference::from).collect())
    }

    #[instrument(skip(self, caller))]
    pub async fn get_my_device(&self, caller: &CallerRequest, device_id: i64) -> DomainResult<Device> {
        let user = self.identify(caller)?;
        self.authorize_device(&user, device_id).await
    }

    /// Commands currently pending for one of the caller's devices
    #[instrument(skip(self, caller))]
    pub async fn list_my_device_commands(
        &self,
        caller: &CallerRequest,
        device_id: i64,
    ) -> DomainResult<Vec<Command>> {
        let user = self.identify(caller)?;
        let device = self.authorize_device(&user, device_id).await?;

        self.registry_store.list_commands_for_device(device.id).await
    }

    #[instrument(skip(self, caller, request), fields(device_id = request.device_id))]
    pub async fn update_my_device_commands(
        &self,
        caller: &CallerRequest,
        request: UpdateDeviceCommandsRequest,
    ) -> DomainResult<()> {
        let user = self.identify(caller)?;
        validate_request(&request)?;

        let device = self.authorize_device(&user, request.device_id).await?;

        debug!(command_ids = ?request.command_ids, "replacing pending commands");
        self.registry_store
            .update_commands_for_device(device.id, request.command_ids)
            .await
    }

    #[instrument(skip(self, caller, request), fields(device_id = request.device_id))]
    pub async fn update_my_device_location(
        &self,
        caller: &CallerRequest,
        request: UpdateDeviceLocationRequest,
    ) -> DomainResult<()> {
        let user = self.identify(caller)?;
        validate_request(&request)?;

        let device = self.authorize_device(&user, request.device_id).await?;

        self.registry_store
            .update_device_location(UpdateDeviceLocationInput {
                device_id: device.id,
                latitude: request.latitude,
                longitude: request.longitude,
            })
            .await
    }

    #[instrument(skip(self, caller, request), fields(device_name = %request.name))]
    pub async fn register_my_device(
        &self,
        caller: &CallerRequest,
        request: RegisterDeviceRequest,
    ) -> DomainResult<Device> {
        let user = self.identify(caller)?;
        validate_request(&request)?;

        let device = self
            .registry_store
            .add_device(CreateDeviceInput {
                user,
                name: request.name,
                endpoint: request.endpoint,
            })
            .await?;

        debug!(device_id = device.id, "registered device for caller");
        Ok(device)
    }
}
