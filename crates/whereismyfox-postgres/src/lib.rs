mod client;
mod config;
mod migration;
mod registry_store;
mod rows;

pub use client::PostgresClient;
pub use config::PostgresConfig;
pub use migration::MigrationRunner;
pub use registry_store::PostgresRegistryStore;
pub use rows::{CommandRow, DeviceRow};
