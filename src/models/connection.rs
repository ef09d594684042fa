//! Connection-related data models.
//!
//! Descriptors are supplied per request and never stored server side. Both
//! implement a redacting `Debug` so they can appear in tracing fields.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Deserializer};

/// Default port for the PostgreSQL migration target.
pub const DEFAULT_TARGET_PORT: u16 = 5432;

/// Credentials for the source engine, as sent by the console.
#[derive(Clone, Deserialize)]
pub struct SourceDescriptor {
    pub user: String,
    /// Contains sensitive data - never log
    pub password: String,
    /// Host name, optionally with `:port`
    pub host: String,
    /// Service name
    pub service: String,
}

impl SourceDescriptor {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            host: host.into(),
            service: service.into(),
        }
    }

    /// EZConnect string: `host[:port]/service`.
    pub fn connect_string(&self) -> String {
        format!("{}/{}", self.host.trim(), self.service.trim())
    }

    /// Reject descriptors with blank fields before any driver call.
    pub fn validate(&self) -> DbResult<()> {
        for (field, value) in [
            ("user", &self.user),
            ("host", &self.host),
            ("service", &self.service),
        ] {
            if value.trim().is_empty() {
                return Err(DbError::invalid_input(format!(
                    "Connection field '{}' is required",
                    field
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("service", &self.service)
            .finish()
    }
}

/// Credentials for the PostgreSQL migration target.
///
/// Field names follow the console's migration form (`pgUser`, `pgHost`, ...).
#[derive(Clone, Deserialize)]
pub struct TargetDescriptor {
    #[serde(rename = "pgUser")]
    pub user: String,
    #[serde(rename = "pgPassword")]
    pub password: String,
    #[serde(rename = "pgHost")]
    pub host: String,
    /// Accepts a number or a numeric string; the form sends either.
    #[serde(
        rename = "pgPort",
        default = "default_target_port",
        deserialize_with = "port_from_number_or_string"
    )]
    pub port: u16,
    #[serde(rename = "pgDatabase")]
    pub database: String,
}

impl TargetDescriptor {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            host: host.into(),
            port,
            database: database.into(),
        }
    }

    pub fn validate(&self) -> DbResult<()> {
        for (field, value) in [
            ("pgUser", &self.user),
            ("pgHost", &self.host),
            ("pgDatabase", &self.database),
        ] {
            if value.trim().is_empty() {
                return Err(DbError::invalid_input(format!(
                    "Target field '{}' is required",
                    field
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TargetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetDescriptor")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

fn default_target_port() -> u16 {
    DEFAULT_TARGET_PORT
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortInput {
        Number(u16),
        Text(String),
    }

    match PortInput::deserialize(deserializer)? {
        PortInput::Number(port) => Ok(port),
        PortInput::Text(text) if text.trim().is_empty() => Ok(DEFAULT_TARGET_PORT),
        PortInput::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", text))),
    }
}
