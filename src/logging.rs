//! Tracing setup and log-safe formatting helpers

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. `RUST_LOG` wins over `LOG_LEVEL` when set.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match config.format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Plain => builder.with_ansi(false).try_init(),
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}

/// Mask the middle of a phone number, keeping the prefix and the last four digits.
pub fn mask_phone(phone: &str) -> String {
    let len = phone.chars().count();
    if len <= 8 {
        return "*".repeat(len);
    }
    let head: String = phone.chars().take(4).collect();
    let tail: String = phone.chars().skip(len - 4).collect();
    format!("{}{}{}", head, "*".repeat(len - 8), tail)
}
