use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_PASSWORD_VAR: &str = "CATALOG_DB_PASSWORD";

/// Connection parameters for the products database. The password is never read
/// from the config file, only from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    /// Name of the environment variable holding the password.
    pub env_password: Option<String>,
    pub only_active: bool,
    pub connect_timeout_seconds: u64,
    #[serde(skip)]
    pub password: Option<String>,
}

impl DatabaseConfig {
    pub fn password_var(&self) -> &str {
        self.env_password.as_deref().unwrap_or(DEFAULT_PASSWORD_VAR)
    }

    /// Reads the password variable. A missing variable is not an error: local
    /// databases often trust the connection.
    pub fn load_credentials(&mut self) {
        self.password = env::var(self.password_var()).ok().filter(|p| !p.is_empty());
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(anyhow!("Database host cannot be empty"));
        }

        if self.dbname.is_empty() {
            return Err(anyhow!("Database name cannot be empty"));
        }

        if self.user.is_empty() {
            return Err(anyhow!("Database user cannot be empty"));
        }

        if self.port == 0 {
            return Err(anyhow!("Database port cannot be 0"));
        }

        Ok(())
    }

    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .connect_timeout(Duration::from_secs(self.connect_timeout_seconds));
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }

    /// `user@host:port/dbname`, safe for logs.
    pub fn describe(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "johnhenry_db".to_string(),
            user: "johnhenry_user".to_string(),
            env_password: None,
            only_active: true,
            connect_timeout_seconds: 10,
            password: None,
        }
    }
}
