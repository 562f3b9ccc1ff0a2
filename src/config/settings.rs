use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the subscriber transport, the management API,
/// the broker's background work and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub api: ApiSettings,
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Address the subscriber transport binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Address the management API binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings for the broker.
///
/// Controls how often dead subscribers are swept, how much patience the
/// transport has with a client during the opening handshake, and how far a
/// subscriber may fall behind before it is treated as dead.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub sweep_interval_secs: u64,
    pub handshake_buffer_size: usize,
    pub handshake_timeout_ms: u64,
    /// Frames queued per subscriber before further sends mark it dead.
    pub send_queue_capacity: usize,
    pub write_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from
/// `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub api: Option<PartialApiSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialApiSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub sweep_interval_secs: Option<u64>,
    pub handshake_buffer_size: Option<usize>,
    pub handshake_timeout_ms: Option<u64>,
    pub send_queue_capacity: Option<usize>,
    pub write_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ApiSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl BrokerSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            api: ApiSettings {
                host: "127.0.0.1".to_string(),
                port: 8888,
            },
            broker: BrokerSettings {
                sweep_interval_secs: 30,
                handshake_buffer_size: 1024,
                handshake_timeout_ms: 5000,
                send_queue_capacity: 256,
                write_timeout_ms: 5000,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fill every missing value from `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let api = self.api.unwrap_or_default();
        let broker = self.broker.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(defaults.server.host),
                port: server.port.unwrap_or(defaults.server.port),
            },
            api: ApiSettings {
                host: api.host.unwrap_or(defaults.api.host),
                port: api.port.unwrap_or(defaults.api.port),
            },
            broker: BrokerSettings {
                sweep_interval_secs: broker
                    .sweep_interval_secs
                    .unwrap_or(defaults.broker.sweep_interval_secs),
                handshake_buffer_size: broker
                    .handshake_buffer_size
                    .unwrap_or(defaults.broker.handshake_buffer_size),
                handshake_timeout_ms: broker
                    .handshake_timeout_ms
                    .unwrap_or(defaults.broker.handshake_timeout_ms),
                send_queue_capacity: broker
                    .send_queue_capacity
                    .unwrap_or(defaults.broker.send_queue_capacity),
                write_timeout_ms: broker
                    .write_timeout_ms
                    .unwrap_or(defaults.broker.write_timeout_ms),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(defaults.logging.level),
            },
        }
    }
}
