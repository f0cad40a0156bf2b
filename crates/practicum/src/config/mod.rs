use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Deployment stage the service runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    /// Unrecognised stages fall back to development.
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Everything the placement service reads from its environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Read `APP_*` variables, after loading a `.env` file when one exists.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let port = match var("APP_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidPort)?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            environment: var("APP_ENV")
                .map(|raw| AppEnvironment::parse(&raw))
                .unwrap_or(AppEnvironment::Development),
            server: ServerConfig {
                host: var("APP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port,
            },
            telemetry: TelemetryConfig {
                log_level: var("APP_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            },
            storage: StorageConfig {
                database_path: var("APP_DATABASE_PATH").map(PathBuf::from),
                upload_dir: var("APP_UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// `localhost` binds the IPv4 loopback; anything else must be a literal address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host
                .parse::<IpAddr>()
                .map_err(|source| ConfigError::InvalidHost { source })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where placement records and uploaded documents live.
///
/// Without a database path the service keeps everything in process memory.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
    pub upload_dir: PathBuf,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must be 'localhost' or an IPv4/IPv6 address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).expect("defaults load");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.storage.database_path.is_none());
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn localhost_binds_loopback() {
        let config = config_from(&[("APP_HOST", "LocalHost"), ("APP_PORT", "8081")])
            .expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8081));
    }

    #[test]
    fn hostnames_other_than_localhost_are_rejected() {
        let config = config_from(&[("APP_HOST", "placements.internal")]).expect("config loads");
        assert!(matches!(
            config.server.socket_addr(),
            Err(ConfigError::InvalidHost { .. })
        ));
    }

    #[test]
    fn non_numeric_port_is_an_error() {
        assert!(matches!(
            config_from(&[("APP_PORT", "eighty")]),
            Err(ConfigError::InvalidPort)
        ));
    }

    #[test]
    fn blank_database_path_means_in_memory() {
        let config = config_from(&[
            ("APP_ENV", "ci"),
            ("APP_DATABASE_PATH", "   "),
            ("APP_UPLOAD_DIR", "/srv/practicum/files"),
        ])
        .expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Test);
        assert!(config.storage.database_path.is_none());
        assert_eq!(
            config.storage.upload_dir,
            PathBuf::from("/srv/practicum/files")
        );
    }
}
