use std::{env, fmt, net::SocketAddr, path::PathBuf};

use crate::DEFAULT_PORT;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Payment-processor credentials and webhook verification settings.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    /// Freshness window for the signature timestamp, in seconds.
    pub webhook_tolerance_secs: i64,
}

/// SMTP relay settings for receipt delivery.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    /// Empty credentials mean an unauthenticated relay.
    pub username: String,
    pub password: String,
    pub from_address: String,
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub stripe: StripeConfig,
    /// `None` when `EMAIL_HOST` is unset; receipts are then skipped.
    pub email: Option<EmailConfig>,
    /// CORS origin and base for the success/cancel redirect URLs.
    pub frontend_url: String,
    pub orders_file: PathBuf,
    /// Served as the frontend when the directory exists.
    pub static_dir: PathBuf,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;

        let port = match env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(value))?,
            Err(_) => DEFAULT_PORT,
        };
        let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let stripe = StripeConfig {
            secret_key: require("STRIPE_SECRET_KEY")?,
            webhook_secret: require("STRIPE_WEBHOOK_SECRET")?,
            webhook_tolerance_secs: match env::var("WEBHOOK_TOLERANCE_SECS") {
                Ok(value) => value
                    .parse::<i64>()
                    .map_err(|_| ConfigError::InvalidTolerance(value))?,
                Err(_) => 300,
            },
        };

        let email = match env::var("EMAIL_HOST") {
            Ok(host) => Some(EmailConfig {
                host,
                port: match env::var("EMAIL_PORT") {
                    Ok(value) => value
                        .parse::<u16>()
                        .map_err(|_| ConfigError::InvalidEmailPort(value))?,
                    Err(_) => 587,
                },
                username: env::var("EMAIL_USER").unwrap_or_default(),
                password: env::var("EMAIL_PASS").unwrap_or_default(),
                from_address: require("EMAIL_FROM")?,
            }),
            Err(_) => None,
        };

        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let orders_file = env::var("ORDERS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("orders.json"));
        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("build"));

        Ok(Self {
            bind_addr,
            environment,
            stripe,
            email,
            frontend_url,
            orders_file,
            static_dir,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    MissingVar(&'static str),
    InvalidPort(String),
    InvalidTolerance(String),
    InvalidEmailPort(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::MissingVar(name) => write!(f, "{name} must be set"),
            Self::InvalidPort(value) => write!(f, "PORT must be a port number (got {value})"),
            Self::InvalidTolerance(value) => write!(
                f,
                "WEBHOOK_TOLERANCE_SECS must be a number of seconds (got {value})"
            ),
            Self::InvalidEmailPort(value) => {
                write!(f, "EMAIL_PORT must be a port number (got {value})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    static ENV_GUARD: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    fn clear_env() {
        for name in [
            "APP_ENV",
            "PORT",
            "STRIPE_SECRET_KEY",
            "STRIPE_WEBHOOK_SECRET",
            "WEBHOOK_TOLERANCE_SECS",
            "EMAIL_HOST",
            "EMAIL_PORT",
            "EMAIL_USER",
            "EMAIL_PASS",
            "EMAIL_FROM",
            "FRONTEND_URL",
            "ORDERS_FILE",
            "STATIC_DIR",
        ] {
            env::remove_var(name);
        }
    }

    fn set_required() {
        env::set_var("STRIPE_SECRET_KEY", "sk_test_key");
        env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_test");
    }

    #[test]
    fn loads_defaults_in_development() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        set_required();

        let config = AppConfig::from_env().expect("config should load with defaults");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.stripe.webhook_tolerance_secs, 300);
        assert!(config.email.is_none());
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert_eq!(config.orders_file, PathBuf::from("orders.json"));

        clear_env();
    }

    #[test]
    fn missing_stripe_secret_is_an_error() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_test");

        let err = AppConfig::from_env().expect_err("missing key should error");
        assert!(matches!(err, ConfigError::MissingVar("STRIPE_SECRET_KEY")));

        clear_env();
    }

    #[test]
    fn rejects_invalid_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        set_required();
        env::set_var("APP_ENV", "invalid");

        let err = AppConfig::from_env().expect_err("invalid env should error");
        assert!(matches!(err, ConfigError::InvalidEnvironment(value) if value == "invalid"));

        clear_env();
    }

    #[test]
    fn parses_production_with_custom_port_and_email() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        set_required();
        env::set_var("APP_ENV", "production");
        env::set_var("PORT", "9000");
        env::set_var("EMAIL_HOST", "smtp.example.com");
        env::set_var("EMAIL_FROM", "orders@example.com");
        env::set_var("FRONTEND_URL", "https://shop.example.com/");

        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.bind_addr.port(), 9000);
        let email = config.email.expect("email config");
        assert_eq!(email.host, "smtp.example.com");
        assert_eq!(email.port, 587);
        assert_eq!(email.from_address, "orders@example.com");
        // Trailing slash is stripped so URL joins stay clean.
        assert_eq!(config.frontend_url, "https://shop.example.com");

        clear_env();
    }

    #[test]
    fn email_host_without_sender_is_an_error() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        set_required();
        env::set_var("EMAIL_HOST", "smtp.example.com");

        let err = AppConfig::from_env().expect_err("missing sender should error");
        assert!(matches!(err, ConfigError::MissingVar("EMAIL_FROM")));

        clear_env();
    }
}
