//! Request validation utilities

use std::fmt;

use super::RequestConfig;

/// Request configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum RequestValidationError {
    /// Temperature out of valid range
    InvalidTemperature { value: f32, min: f32, max: f32 },
    /// Top-p out of valid range
    InvalidTopP { value: f32, min: f32, max: f32 },
    /// Max tokens is zero
    InvalidMaxTokens,
    /// Context window of zero messages
    InvalidContextCount,
}

impl fmt::Display for RequestValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTemperature { value, min, max } => {
                write!(
                    f,
                    "Invalid temperature {}: must be between {} and {}",
                    value, min, max
                )
            }
            Self::InvalidTopP { value, min, max } => {
                write!(
                    f,
                    "Invalid top_p {}: must be between {} and {}",
                    value, min, max
                )
            }
            Self::InvalidMaxTokens => write!(f, "max_tokens must be greater than 0"),
            Self::InvalidContextCount => write!(f, "context_count must be greater than 0"),
        }
    }
}

impl std::error::Error for RequestValidationError {}

/// Validate temperature value
pub fn validate_temperature(temp: f32) -> Result<(), RequestValidationError> {
    const MIN: f32 = 0.0;
    const MAX: f32 = 2.0;

    if !(MIN..=MAX).contains(&temp) {
        return Err(RequestValidationError::InvalidTemperature {
            value: temp,
            min: MIN,
            max: MAX,
        });
    }

    Ok(())
}

/// Validate top_p value
pub fn validate_top_p(top_p: f32) -> Result<(), RequestValidationError> {
    const MIN: f32 = 0.0;
    const MAX: f32 = 1.0;

    if !(MIN..=MAX).contains(&top_p) {
        return Err(RequestValidationError::InvalidTopP {
            value: top_p,
            min: MIN,
            max: MAX,
        });
    }

    Ok(())
}

/// Validate a complete RequestConfig
pub fn validate_request_config(config: &RequestConfig) -> Result<(), RequestValidationError> {
    if let Some(temp) = config.temperature {
        validate_temperature(temp)?;
    }

    if let Some(top_p) = config.top_p {
        validate_top_p(top_p)?;
    }

    if config.max_tokens == Some(0) {
        return Err(RequestValidationError::InvalidMaxTokens);
    }

    if config.context_count == Some(0) {
        return Err(RequestValidationError::InvalidContextCount);
    }

    Ok(())
}
