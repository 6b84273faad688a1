use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub matching: MatchingConfig,
    pub directory: DirectoryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let invitation_ttl_minutes = numeric_var("APP_INVITATION_TTL_MINUTES", 15)?;
        let open_job_ttl_minutes = numeric_var("APP_OPEN_JOB_TTL_MINUTES", 15)?;
        let sweep_interval_seconds = numeric_var("APP_SWEEP_INTERVAL_SECONDS", 60)?;
        if invitation_ttl_minutes == 0 {
            return Err(ConfigError::InvalidNumber {
                var: "APP_INVITATION_TTL_MINUTES",
            });
        }
        if sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidNumber {
                var: "APP_SWEEP_INTERVAL_SECONDS",
            });
        }

        let default_city = env::var("APP_DEFAULT_CITY").unwrap_or_else(|_| "Nairobi".to_string());
        let roster_csv = env::var("APP_DIRECTORY_CSV")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            matching: MatchingConfig {
                invitation_ttl: Duration::minutes(invitation_ttl_minutes as i64),
                open_job_ttl: (open_job_ttl_minutes > 0)
                    .then(|| Duration::minutes(open_job_ttl_minutes as i64)),
                sweep_interval: StdDuration::from_secs(sweep_interval_seconds),
                default_city,
            },
            directory: DirectoryConfig { roster_csv },
        })
    }
}

fn numeric_var(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { var }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Time windows and defaults used by the matching engines.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// How long a cleaner has to answer a direct invitation.
    pub invitation_ttl: Duration,
    /// Age after which an unmatched open job is cancelled. `None` disables it.
    pub open_job_ttl: Option<Duration>,
    pub sweep_interval: StdDuration,
    /// Used when invitation details do not carry a city.
    pub default_city: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            invitation_ttl: Duration::minutes(15),
            open_job_ttl: Some(Duration::minutes(15)),
            sweep_interval: StdDuration::from_secs(60),
            default_city: "Nairobi".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    pub roster_csv: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var } => {
                write!(f, "{var} must be a positive whole number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_INVITATION_TTL_MINUTES",
            "APP_OPEN_JOB_TTL_MINUTES",
            "APP_SWEEP_INTERVAL_SECONDS",
            "APP_DEFAULT_CITY",
            "APP_DIRECTORY_CSV",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.matching.invitation_ttl, Duration::minutes(15));
        assert_eq!(config.matching.open_job_ttl, Some(Duration::minutes(15)));
        assert_eq!(config.matching.sweep_interval, StdDuration::from_secs(60));
        assert_eq!(config.matching.default_city, "Nairobi");
        assert!(config.directory.roster_csv.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn zero_open_job_ttl_disables_stale_job_sweep() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_OPEN_JOB_TTL_MINUTES", "0");
        let config = AppConfig::load().expect("config loads");
        assert!(config.matching.open_job_ttl.is_none());
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_windows() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_INVITATION_TTL_MINUTES", "soon");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { var }) => {
                assert_eq!(var, "APP_INVITATION_TTL_MINUTES")
            }
            other => panic!("expected invalid number, got {other:?}"),
        }
        reset_env();
    }
}
