pub mod authenticator;
pub mod device_access_service;
pub mod error;
pub mod in_memory_registry_store;
pub mod jwt_authenticator;
pub mod repository;
pub mod types;
pub mod validate;

pub use authenticator::*;
pub use device_access_service::*;
pub use error::{DomainError, DomainResult, ErrorKind};
pub use in_memory_registry_store::InMemoryRegistryStore;
pub use jwt_authenticator::{JwtAuthenticator, JwtClaims, JwtConfig};
pub use repository::RegistryStore;
pub use types::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use authenticator::MockAuthenticator;
#[cfg(any(test, feature = "testing"))]
pub use repository::MockRegistryStore;
