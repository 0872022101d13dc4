/// Configuration management for the barangay portal
use crate::error::{PortalError, PortalResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Longest lock a configuration may ask for (30 days)
pub const MAX_LOCKOUT_DURATION_SECS: i64 = 30 * 86_400;

/// Longest session lifetime a configuration may ask for (30 days)
pub const MAX_SESSION_TTL_SECS: i64 = 30 * 86_400;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub lockout: LockoutConfig,
    pub email: Option<EmailConfig>,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Externally reachable URL, used in notification emails
    pub public_url: Option<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Session token lifetime in seconds
    pub session_ttl_secs: i64,
    /// Administrator account created at startup when absent
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Initial administrator credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Login lockout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// Consecutive failures before the account is locked
    pub max_attempts: u32,
    /// Fixed lock length in seconds
    pub lockout_duration_secs: i64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            lockout_duration_secs: 60,
        }
    }
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Sustained requests per second for unauthenticated callers
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PortalResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("PORTAL_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("PORTAL_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| PortalError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("PORTAL_PUBLIC_URL").ok();

        let data_directory: PathBuf = env::var("PORTAL_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("PORTAL_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("portal.sqlite"));

        let jwt_secret = env::var("PORTAL_JWT_SECRET")
            .map_err(|_| PortalError::Validation("JWT secret required".to_string()))?;
        let session_ttl_secs = env::var("PORTAL_SESSION_TTL_SECS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .unwrap_or(86400);

        let bootstrap_admin = match (env::var("PORTAL_ADMIN_EMAIL"), env::var("PORTAL_ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(BootstrapAdmin {
                email,
                password,
                name: env::var("PORTAL_ADMIN_NAME")
                    .unwrap_or_else(|_| "Barangay Administrator".to_string()),
            }),
            _ => None,
        };

        let defaults = LockoutConfig::default();
        let max_attempts = env::var("PORTAL_LOCKOUT_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_attempts);
        let lockout_duration_secs = env::var("PORTAL_LOCKOUT_DURATION_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.lockout_duration_secs);

        let email = if let Ok(smtp_url) = env::var("PORTAL_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("PORTAL_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let rate_limit_enabled = env::var("PORTAL_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let requests_per_second = env::var("PORTAL_RATE_LIMIT_REQUESTS_PER_SECOND")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let burst_size = env::var("PORTAL_RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "barangay_portal=debug,tower_http=debug".to_string());
        let log_json = env::var("PORTAL_LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                jwt_secret,
                session_ttl_secs,
                bootstrap_admin,
            },
            lockout: LockoutConfig {
                max_attempts,
                lockout_duration_secs,
            },
            email,
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                requests_per_second,
                burst_size,
            },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> PortalResult<()> {
        if self.service.hostname.is_empty() {
            return Err(PortalError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(PortalError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.session_ttl_secs <= 0 {
            return Err(PortalError::Validation(
                "Session lifetime must be positive".to_string(),
            ));
        }

        if self.authentication.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(PortalError::Validation(format!(
                "Session lifetime must be at most {} seconds",
                MAX_SESSION_TTL_SECS
            )));
        }

        if self.lockout.max_attempts == 0 {
            return Err(PortalError::Validation(
                "Lockout max attempts must be at least 1".to_string(),
            ));
        }

        if self.lockout.lockout_duration_secs <= 0 {
            return Err(PortalError::Validation(
                "Lockout duration must be positive".to_string(),
            ));
        }

        if self.lockout.lockout_duration_secs > MAX_LOCKOUT_DURATION_SECS {
            return Err(PortalError::Validation(format!(
                "Lockout duration must be at most {} seconds",
                MAX_LOCKOUT_DURATION_SECS
            )));
        }

        if let Some(admin) = &self.authentication.bootstrap_admin {
            if !admin.email.contains('@') || admin.password.is_empty() {
                return Err(PortalError::Validation(
                    "Bootstrap admin needs a valid email and a password".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Base URL used in outbound links
    pub fn public_url(&self) -> String {
        self.service
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.service.hostname, self.service.port))
    }

    /// Minimal configuration for tests
    #[cfg(test)]
    pub fn for_tests() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8080,
                public_url: None,
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                database: PathBuf::from(":memory:"),
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
                session_ttl_secs: 3600,
                bootstrap_admin: None,
            },
            lockout: LockoutConfig::default(),
            email: None,
            rate_limit: RateLimitConfig {
                enabled: false,
                requests_per_second: 100,
                burst_size: 100,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lockout() {
        let lockout = LockoutConfig::default();
        assert_eq!(lockout.max_attempts, 3);
        assert_eq!(lockout.lockout_duration_secs, 60);
    }

    #[test]
    fn test_validate_accepts_test_config() {
        assert!(ServerConfig::for_tests().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = ServerConfig::for_tests();
        config.authentication.jwt_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(PortalError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = ServerConfig::for_tests();
        config.lockout.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::for_tests();
        config.lockout.lockout_duration_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_durations() {
        let mut config = ServerConfig::for_tests();
        config.lockout.lockout_duration_secs = MAX_LOCKOUT_DURATION_SECS;
        assert!(config.validate().is_ok());

        config.lockout.lockout_duration_secs = 10_000_000_000_000;
        assert!(matches!(config.validate(), Err(PortalError::Validation(_))));

        let mut config = ServerConfig::for_tests();
        config.authentication.session_ttl_secs = MAX_SESSION_TTL_SECS + 1;
        assert!(matches!(config.validate(), Err(PortalError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_bad_bootstrap_admin() {
        let mut config = ServerConfig::for_tests();
        config.authentication.bootstrap_admin = Some(BootstrapAdmin {
            email: "not-an-email".to_string(),
            password: "secret".to_string(),
            name: "Admin".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_public_url_fallback() {
        let mut config = ServerConfig::for_tests();
        assert_eq!(config.public_url(), "http://localhost:8080");

        config.service.public_url = Some("https://portal.example.gov.ph".to_string());
        assert_eq!(config.public_url(), "https://portal.example.gov.ph");
    }
}
