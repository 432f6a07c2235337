use config::ConfigError;
use serde::Deserialize;

use crate::error::ConfigError as SettingsError;

const MIN_SECRET_LENGTH: usize = 32;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub revocation: RevocationSettings,
    /// Accounts seeded into the in-memory user directory
    #[serde(default)]
    pub admins: Vec<AdminAccountSettings>,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// JWT signing settings. Loaded once at startup, never rotated in-process.
#[derive(Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RevocationStrategy {
    /// Revoked ids are kept for the whole process lifetime
    #[default]
    Permanent,
    /// Revoked ids are dropped once the token would have expired anyway
    Expiring,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct RevocationSettings {
    #[serde(default)]
    pub strategy: RevocationStrategy,
}

#[derive(Deserialize, Clone)]
pub struct AdminAccountSettings {
    pub id: i64,
    pub email: String,
    /// Plaintext, hashed at startup. Prefer `password_hash`.
    pub password: Option<String>,
    /// Precomputed bcrypt hash
    pub password_hash: Option<String>,
    #[serde(default = "default_true")]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Reject settings the service must not start with
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.jwt.validate()?;

        for admin in &self.admins {
            if admin.email.trim().is_empty() {
                return Err(SettingsError::MissingRequired(format!(
                    "admins[{}].email",
                    admin.id
                )));
            }
            if admin.password.is_none() && admin.password_hash.is_none() {
                return Err(SettingsError::MissingRequired(format!(
                    "admins[{}].password or password_hash",
                    admin.id
                )));
            }
        }

        Ok(())
    }
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(SettingsError::InvalidValue(format!(
                "jwt.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.issuer.trim().is_empty() {
            return Err(SettingsError::MissingRequired("jwt.issuer".to_string()));
        }
        Ok(())
    }
}

/// Read `configuration.{yaml,toml,json}` if present, then `APP__*` env vars
///
/// e.g. `APP__JWT__SECRET` overrides `jwt.secret`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8000)?
        .set_default("jwt.issuer", "contest-admin")?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;
    settings.try_deserialize::<Settings>()
}
