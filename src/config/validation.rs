use super::models::{Config, RestConfig, SyncConfig};
use reqwest::header::HeaderName;
use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("max_parallel_downloads must be at least 1")]
    InvalidParallelism,

    #[error("Timeout must be positive: {field} = 0")]
    InvalidTimeout { field: &'static str },

    #[error("Invalid core_api_base '{url}': {reason}")]
    InvalidCoreApiBase { url: String, reason: String },

    #[error("Invalid device_key_header '{0}'")]
    InvalidHeaderName(String),

    #[error("rest.service_unit must not be empty")]
    EmptyServiceUnit,

    #[error("rest.{field} must not contain control characters")]
    InvalidCommand { field: &'static str },

    #[error("rest.{field} must not contain '%', cron turns it into a newline")]
    PercentInCommand { field: &'static str },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_sync(&config.sync)?;
    validate_core_api_base(&config.sync)?;
    validate_rest(&config.rest)?;
    Ok(())
}

fn validate_sync(sync: &SyncConfig) -> Result<(), ValidationError> {
    if sync.max_parallel_downloads == 0 {
        return Err(ValidationError::InvalidParallelism);
    }

    for (field, value) in [
        ("connect_timeout_secs", sync.connect_timeout_secs),
        ("request_timeout_secs", sync.request_timeout_secs),
        ("idle_poll_secs", sync.idle_poll_secs),
    ] {
        if value == 0 {
            return Err(ValidationError::InvalidTimeout { field });
        }
    }

    if HeaderName::from_bytes(sync.device_key_header.as_bytes()).is_err() {
        return Err(ValidationError::InvalidHeaderName(
            sync.device_key_header.clone(),
        ));
    }

    Ok(())
}

/// An unset base URL is allowed; syncs then fail with a configuration error
fn validate_core_api_base(sync: &SyncConfig) -> Result<(), ValidationError> {
    let Some(raw) = sync.core_api_base.as_deref().map(str::trim) else {
        return Ok(());
    };
    if raw.is_empty() {
        return Ok(());
    }

    let invalid = |reason: &str| ValidationError::InvalidCoreApiBase {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL"));
    }

    Ok(())
}

fn validate_rest(rest: &RestConfig) -> Result<(), ValidationError> {
    if rest.service_unit.trim().is_empty() {
        return Err(ValidationError::EmptyServiceUnit);
    }

    for (field, value) in [
        ("service_unit", &rest.service_unit),
        ("stop_command", &rest.stop_command),
        ("start_command", &rest.start_command),
        ("crontab_user", &rest.crontab_user),
    ] {
        if value.chars().any(char::is_control) {
            return Err(ValidationError::InvalidCommand { field });
        }
        if field != "crontab_user" && value.contains('%') {
            return Err(ValidationError::PercentInCommand { field });
        }
    }

    Ok(())
}
