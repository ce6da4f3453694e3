//! Example services for `streamrpc`.
//!
//! - [`calculator`]: arithmetic in all four call shapes
//! - [`greet`]: greetings, including a deadline-aware unary call
//! - [`blog`]: CRUD over a pluggable [`blog::DocumentStore`]
//!
//! Each service exposes a `register` function that adds its operations to a
//! [`RegistryBuilder`](streamrpc::RegistryBuilder).

use streamrpc::core::SharedSecret;
use streamrpc::{Registry, Server, ServerBuildError};

pub mod blog;
pub mod calculator;
pub mod greet;

/// Environment variable toggling transport security for the example servers.
pub const TLS_ENV: &str = "STREAMRPC_TLS";
/// Environment variable holding the shared secret callers must present.
pub const SECRET_ENV: &str = "STREAMRPC_SECRET";

/// Startup errors of the example binaries.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("STREAMRPC_TLS must be true or false, got {0:?}")]
    InvalidToggle(String),
    #[error("STREAMRPC_TLS is enabled but STREAMRPC_SECRET is not set")]
    MissingSecret,
    #[error(transparent)]
    Build(#[from] ServerBuildError),
}

/// Transport security settings, read once at startup.
#[derive(Clone, Debug, Default)]
pub struct SecuritySettings {
    pub enabled: bool,
    pub secret: Option<String>,
}

impl SecuritySettings {
    /// Read `STREAMRPC_TLS` and `STREAMRPC_SECRET`.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_values(
            std::env::var(TLS_ENV).ok().as_deref(),
            std::env::var(SECRET_ENV).ok(),
        )
    }

    fn from_values(toggle: Option<&str>, secret: Option<String>) -> Result<Self, SettingsError> {
        let enabled = match toggle.map(str::trim) {
            None | Some("") => false,
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(SettingsError::InvalidToggle(value.to_string())),
            },
        };
        if enabled && secret.is_none() {
            return Err(SettingsError::MissingSecret);
        }
        Ok(Self { enabled, secret })
    }

    /// Build a server for `registry` with these settings.
    pub fn server(&self, registry: Registry) -> Result<Server, SettingsError> {
        let mut builder = Server::builder()
            .registry(registry)
            .transport_security(self.enabled);
        if let Some(secret) = &self.secret {
            builder = builder.security_provider(SharedSecret::new(secret.clone()));
        }
        Ok(builder.build()?)
    }

    /// Credentials a client should present, if any.
    pub fn credentials(&self) -> Option<&str> {
        if self.enabled {
            self.secret.as_deref()
        } else {
            None
        }
    }
}

/// A client connected in-process to `server`, presenting the configured
/// credentials.
pub fn connect(server: &Server, settings: &SecuritySettings) -> streamrpc_client::Client {
    let mut builder = streamrpc_client::Client::builder(server.connect()).use_proto();
    if let Some(credentials) = settings.credentials() {
        builder = builder.credentials(credentials);
    }
    builder.build()
}

#[cfg(test)]
pub(crate) fn test_client(registry: Registry) -> streamrpc_client::Client {
    let server = SecuritySettings::default().server(registry).unwrap();
    connect(&server, &SecuritySettings::default())
}
