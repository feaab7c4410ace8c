pub mod config;

pub use config::{AppConfig, ConfigError, EmailConfig, Environment, StripeConfig};

/// Port the HTTP server listens on when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 5000;

/// Loads environment variables from `.env` when available.
///
/// Missing files are ignored so the function is safe in production builds
/// where dotenv files are not deployed.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}
