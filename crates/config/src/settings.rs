use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub connection: ConnectionSettings,
    pub store: StoreSettings,
    pub sound: SoundSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    /// Base URL of the dashboard API, e.g. `https://dashboard.example.com`.
    pub base_url: String,
    /// Path of the notification WebSocket endpoint.
    pub ws_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionSettings {
    /// Reconnect attempts before the failure is reported as terminal.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    /// Upper bound on locally retained notification records. Constrained
    /// deployments (mobile shells) should inject a lower value here.
    pub max_records: usize,
    /// Key under which the record list is persisted.
    pub storage_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SoundSettings {
    pub enabled: bool,
    /// Clip reference handed to the SoundPlayer on each ingested event.
    pub clip: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("RETISCAN"),
            )
            .set_default("server.base_url", "http://localhost:5000")?
            .set_default("server.ws_path", "/socket")?
            .set_default("connection.max_attempts", 5)?
            .set_default("connection.base_delay_ms", 1000)?
            .set_default("connection.max_delay_ms", 30_000)?
            .set_default("store.max_records", 50)?
            .set_default("store.storage_key", "retiscan.notifications")?
            .set_default("sound.enabled", true)?
            .set_default("sound.clip", "notification-beep")?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
