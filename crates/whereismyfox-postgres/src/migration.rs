use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::PostgresConfig;

/// Applies the goose migrations that create the registry schema.
///
/// Spawns the goose binary with the `postgres` driver, so the binary must be
/// on the PATH or configured explicitly.
pub struct MigrationRunner {
    goose_binary_path: String,
    migrations_dir: String,
    dsn: String,
}

impl MigrationRunner {
    pub fn new(goose_binary_path: String, migrations_dir: String, dsn: String) -> Self {
        Self {
            goose_binary_path,
            migrations_dir,
            dsn,
        }
    }

    pub fn from_config(config: &PostgresConfig) -> Self {
        Self::new(
            config.goose_binary_path.clone(),
            config.migrations_dir.clone(),
            config.dsn(),
        )
    }

    /// Runs all pending migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!(migrations_dir = %self.migrations_dir, "running database migrations");
        let stdout = self.goose("up").await?;
        debug!("migrations completed:\n{}", stdout);
        Ok(())
    }

    /// Rolls back the most recent migration
    pub async fn rollback_migration(&self) -> Result<()> {
        let stdout = self.goose("down").await?;
        debug!("rollback completed:\n{}", stdout);
        Ok(())
    }

    pub async fn migration_status(&self) -> Result<String> {
        self.goose("status").await
    }

    fn args<'a>(&'a self, verb: &'a str) -> [&'a str; 5] {
        ["-dir", self.migrations_dir.as_str(), "postgres", self.dsn.as_str(), verb]
    }

    async fn goose(&self, verb: &str) -> Result<String> {
        let output = Command::new(&self.goose_binary_path)
            .args(self.args(verb))
            .output()
            .await
            .with_context(|| format!("failed to execute {}", self.goose_binary_path))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("goose {} failed.\nstdout: {}\nstderr: {}", verb, stdout, stderr);
        }

        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goose_arguments() {
        let runner = MigrationRunner::new(
            "goose".to_string(),
            "migrations/".to_string(),
            "postgres://localhost/test".to_string(),
        );

        assert_eq!(
            runner.args("up"),
            ["-dir", "migrations/", "postgres", "postgres://localhost/test", "up"]
        );
    }

    #[test]
    fn test_from_config_uses_dsn() {
        let runner = MigrationRunner::from_config(&PostgresConfig::default());
        assert_eq!(runner.goose_binary_path, "goose");
        assert!(runner.dsn.starts_with("postgres://whereismyfox:"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let runner = MigrationRunner::new(
            "/nonexistent/goose".to_string(),
            "migrations/".to_string(),
            "postgres://localhost/test".to_string(),
        );
        assert!(runner.run_migrations().await.is_err());
    }
}
