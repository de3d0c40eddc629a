use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use whereismyfox_domain::JwtConfig;
use whereismyfox_postgres::PostgresConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Directory holding the goose migration files
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    #[serde(default = "default_goose_binary_path")]
    pub goose_binary_path: String,

    // Session tokens
    /// HMAC secret for session tokens; override outside development
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_expiration_hours")]
    pub jwt_expiration_hours: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_postgres_host() -> String {
    PostgresConfig::default().host
}

fn default_postgres_port() -> u16 {
    PostgresConfig::default().port
}

fn default_postgres_database() -> String {
    PostgresConfig::default().database
}

fn default_postgres_username() -> String {
    PostgresConfig::default().username
}

fn default_postgres_password() -> String {
    PostgresConfig::default().password
}

fn default_postgres_max_pool_size() -> usize {
    PostgresConfig::default().max_pool_size
}

fn default_postgres_migrations_dir() -> String {
    PostgresConfig::default().migrations_dir
}

fn default_goose_binary_path() -> String {
    PostgresConfig::default().goose_binary_path
}

fn default_jwt_secret() -> String {
    "whereismyfox-development-secret".to_string()
}

fn default_jwt_expiration_hours() -> u64 {
    24
}

fn default_startup_timeout_secs() -> u64 {
    30
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("WHEREISMYFOX"))
            .build()?
            .try_deserialize()
    }

    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            migrations_dir: self.postgres_migrations_dir.clone(),
            goose_binary_path: self.goose_binary_path.clone(),
        }
    }

    pub fn jwt(&self) -> JwtConfig {
        JwtConfig::new(self.jwt_secret.clone(), self.jwt_expiration_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 4] = [
        "WHEREISMYFOX_LOG_LEVEL",
        "WHEREISMYFOX_POSTGRES_HOST",
        "WHEREISMYFOX_POSTGRES_PORT",
        "WHEREISMYFOX_JWT_EXPIRATION_HOURS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.postgres_host, "localhost");
        assert_eq!(config.postgres_port, 5432);
        assert_eq!(config.jwt_expiration_hours, 24);
        assert_eq!(config.startup_timeout_secs, 30);
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::set_var("WHEREISMYFOX_LOG_LEVEL", "debug");
        std::env::set_var("WHEREISMYFOX_POSTGRES_HOST", "db.internal");
        std::env::set_var("WHEREISMYFOX_POSTGRES_PORT", "6543");
        std::env::set_var("WHEREISMYFOX_JWT_EXPIRATION_HOURS", "2");

        let config = ServiceConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.log_level, "debug");
        let postgres = config.postgres();
        assert_eq!(postgres.host, "db.internal");
        assert_eq!(postgres.port, 6543);
        assert_eq!(config.jwt().expiration_hours, 2);
    }
}
