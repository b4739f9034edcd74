//! Application configuration module
//! Resolves every setting once at startup from environment variables (and `.env`).

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub mpesa: MpesaConfig,
    pub email: Option<EmailConfig>,
    pub subscription: SubscriptionConfig,
    /// Run without Postgres (in-memory stores)
    pub skip_externals: bool,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// M-Pesa Daraja credentials and STK push defaults
#[derive(Clone)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
    pub callback_path: String,
    pub base_url: String,
    pub transaction_type: String,
    pub account_reference: String,
    pub transaction_desc: String,
    pub timeout_secs: u64,
}

/// SMTP settings for payment alerts
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub recipient: String,
    pub from_name: String,
}

/// Subscription plan settings
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub price: i64,
    pub days: i64,
}

pub const DEFAULT_MPESA_BASE_URL: &str = "https://sandbox.safaricom.co.ke";

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        let skip_externals = env::var("SKIP_EXTERNALS")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env(skip_externals)?,
            logging: LoggingConfig::from_env()?,
            mpesa: MpesaConfig::from_env()?,
            email: EmailConfig::from_env()?,
            subscription: SubscriptionConfig::from_env()?,
            skip_externals,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if !self.skip_externals {
            self.database.validate()?;
        }
        self.logging.validate()?;
        self.mpesa.validate()?;
        if let Some(email) = &self.email {
            email.validate()?;
        }
        self.subscription.validate()?;

        Ok(())
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVariable(name.to_string())),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("PORT cannot be 0".to_string()));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue("HOST cannot be empty".to_string()));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env(skip_externals: bool) -> Result<Self, ConfigError> {
        let url = if skip_externals {
            env::var("DATABASE_URL").unwrap_or_default()
        } else {
            required("DATABASE_URL")?
        };

        Ok(DatabaseConfig {
            url,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl MpesaConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(MpesaConfig {
            consumer_key: required("MPESA_CONSUMER_KEY")?,
            consumer_secret: required("MPESA_CONSUMER_SECRET")?,
            shortcode: required("MPESA_SHORTCODE")?,
            passkey: required("MPESA_PASSKEY")?,
            callback_url: required("MPESA_CALLBACK_URL")?,
            callback_path: env::var("MPESA_CALLBACK_PATH")
                .unwrap_or_else(|_| "/mpesa/callback".to_string()),
            base_url: env::var("MPESA_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_MPESA_BASE_URL.to_string()),
            transaction_type: env::var("MPESA_TRANSACTION_TYPE")
                .unwrap_or_else(|_| "CustomerPayBillOnline".to_string()),
            account_reference: env::var("MPESA_ACCOUNT_REFERENCE")
                .unwrap_or_else(|_| "Subscription".to_string()),
            transaction_desc: env::var("MPESA_TRANSACTION_DESC")
                .unwrap_or_else(|_| "Subscription payment".to_string()),
            timeout_secs: env::var("MPESA_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MPESA_TIMEOUT_SECS".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.shortcode.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidValue(
                "MPESA_SHORTCODE must be numeric".to_string(),
            ));
        }

        for (name, url) in [
            ("MPESA_BASE_URL", &self.base_url),
            ("MPESA_CALLBACK_URL", &self.callback_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be a valid URL",
                    name
                )));
            }
        }

        if !self.callback_path.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "MPESA_CALLBACK_PATH must start with '/'".to_string(),
            ));
        }
        if crate::api::FIXED_ROUTES.contains(&self.callback_path.as_str())
            || self.callback_path.contains(['{', '}', '*'])
        {
            return Err(ConfigError::InvalidValue(format!(
                "MPESA_CALLBACK_PATH {} collides with a built-in route",
                self.callback_path
            )));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("MPESA_TIMEOUT_SECS".to_string()));
        }

        Ok(())
    }
}

// Secrets stay out of Debug output
impl std::fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("shortcode", &self.shortcode)
            .field("callback_url", &self.callback_url)
            .field("callback_path", &self.callback_path)
            .field("base_url", &self.base_url)
            .field("transaction_type", &self.transaction_type)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl EmailConfig {
    /// Email is optional as a group: absent `EMAIL_HOST` disables it,
    /// a partial group is a startup error.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let smtp_host = match env::var("EMAIL_HOST") {
            Ok(host) if !host.trim().is_empty() => host,
            _ => return Ok(None),
        };

        Ok(Some(EmailConfig {
            smtp_host,
            smtp_port: env::var("EMAIL_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMAIL_PORT".to_string()))?,
            username: required("EMAIL_USERNAME")?,
            password: required("EMAIL_PASSWORD")?,
            recipient: required("EMAIL_TO")?,
            from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "M-Pesa Alerts".to_string()),
        }))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smtp_port == 0 {
            return Err(ConfigError::InvalidValue("EMAIL_PORT".to_string()));
        }

        if !self.recipient.contains('@') || !self.username.contains('@') {
            return Err(ConfigError::InvalidValue(
                "EMAIL_TO and EMAIL_USERNAME must be email addresses".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("recipient", &self.recipient)
            .finish_non_exhaustive()
    }
}

impl SubscriptionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(SubscriptionConfig {
            price: env::var("SUBSCRIPTION_PRICE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            days: env::var("SUBSCRIPTION_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.price <= 0 {
            return Err(ConfigError::InvalidValue("SUBSCRIPTION_PRICE".to_string()));
        }
        if self.days <= 0 {
            return Err(ConfigError::InvalidValue("SUBSCRIPTION_DAYS".to_string()));
        }
        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

impl From<std::num::ParseIntError> for ConfigError {
    fn from(_: std::num::ParseIntError) -> Self {
        ConfigError::InvalidValue("Failed to parse integer value".to_string())
    }
}

#[cfg(test)]
pub(crate) fn test_mpesa_config(base_url: &str) -> MpesaConfig {
    MpesaConfig {
        consumer_key: "key".to_string(),
        consumer_secret: "secret".to_string(),
        shortcode: "174379".to_string(),
        passkey: "passkey".to_string(),
        callback_url: "https://example.com/mpesa/callback".to_string(),
        callback_path: "/mpesa/callback".to_string(),
        base_url: base_url.to_string(),
        transaction_type: "CustomerPayBillOnline".to_string(),
        account_reference: "TestRef".to_string(),
        transaction_desc: "Test Payment".to_string(),
        timeout_secs: 5,
    }
}
