use config::ConfigError;

use crate::error::ConfigError as SettingsError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub media: MediaSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT settings. Access and refresh tokens are signed with different secrets.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_token_secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_secret: String,
    pub refresh_token_expiry: i64,  // seconds (e.g., 864000 for 10 days)
    pub issuer: String,
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.access_token_secret.trim().is_empty() {
            return Err(SettingsError::MissingRequired("jwt.access_token_secret".to_string()));
        }
        if self.refresh_token_secret.trim().is_empty() {
            return Err(SettingsError::MissingRequired("jwt.refresh_token_secret".to_string()));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(SettingsError::InvalidValue(
                "jwt access and refresh secrets must differ".to_string(),
            ));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(SettingsError::InvalidValue(
                "jwt expiries must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Remote media host used for avatar and cover image uploads
#[derive(serde::Deserialize, Clone)]
pub struct MediaSettings {
    pub base_url: String,
    pub api_key: String,
    /// Directory where the transport stages uploaded files
    pub staging_dir: String,
    pub timeout_milliseconds: u64,
}

impl MediaSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_milliseconds)
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.jwt.validate()?;
        if self.media.base_url.trim().is_empty() {
            return Err(SettingsError::MissingRequired("media.base_url".to_string()));
        }
        Ok(())
    }
}

/// Loads `configuration.{yaml,json,toml}` then applies `APP__SECTION__KEY` overrides.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
