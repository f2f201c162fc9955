//! Configuration error types and validation traits.

use super::errors::DepthError;
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A numeric field is NaN or infinite.
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: String, value: f32 },

    /// A numeric field falls outside of its allowed range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        min: f32,
        max: f32,
        value: f32,
    },

    /// Error indicating that a configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Error indicating that a configuration file could not be parsed or written.
    #[error("configuration format error: {message}")]
    Format { message: String },
}

/// A trait for validating configuration parameters.
///
/// Implementors provide `validate` and `get_defaults`; the provided helpers
/// cover the numeric checks shared by the depth pipeline settings.
pub trait ConfigValidator {
    /// Validates the configuration.
    ///
    /// # Returns
    ///
    /// A Result indicating success or a ConfigError if validation fails.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Returns the default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Validates that a float value is finite.
    fn validate_finite(&self, value: f32, field_name: &str) -> Result<(), ConfigError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(ConfigError::NonFinite {
                field: field_name.to_string(),
                value,
            })
        }
    }

    /// Validates a float value is within a specified range.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to validate.
    /// * `min` - The minimum allowed value (inclusive).
    /// * `max` - The maximum allowed value (inclusive).
    /// * `field_name` - The name of the field being validated.
    ///
    /// # Returns
    ///
    /// A Result indicating success or a ConfigError if validation fails.
    fn validate_f32_range(
        &self,
        value: f32,
        min: f32,
        max: f32,
        field_name: &str,
    ) -> Result<(), ConfigError> {
        self.validate_finite(value, field_name)?;
        if value < min || value > max {
            Err(ConfigError::OutOfRange {
                field: field_name.to_string(),
                min,
                max,
                value,
            })
        } else {
            Ok(())
        }
    }

    /// Validates a float value is finite and not negative.
    fn validate_non_negative_f32(&self, value: f32, field_name: &str) -> Result<(), ConfigError> {
        self.validate_finite(value, field_name)?;
        if value < 0.0 {
            Err(ConfigError::InvalidConfig {
                message: format!("{field_name} must not be negative, got {value}"),
            })
        } else {
            Ok(())
        }
    }

    /// Validates a float value is strictly positive.
    fn validate_positive_f32(&self, value: f32, field_name: &str) -> Result<(), ConfigError> {
        self.validate_finite(value, field_name)?;
        if value <= 0.0 {
            Err(ConfigError::InvalidConfig {
                message: format!("{field_name} must be greater than 0, got {value}"),
            })
        } else {
            Ok(())
        }
    }

    /// Validates a usize value is positive.
    fn validate_positive_usize(&self, value: usize, field_name: &str) -> Result<(), ConfigError> {
        if value == 0 {
            Err(ConfigError::InvalidConfig {
                message: format!("{field_name} must be greater than 0, got {value}"),
            })
        } else {
            Ok(())
        }
    }
}

/// Extension trait that wraps validation failures into [`DepthError`].
pub trait ConfigValidatorExt: ConfigValidator {
    /// Validates configuration and wraps any errors into `DepthError::ConfigError`.
    fn validate_and_wrap(self) -> Result<Self, DepthError>
    where
        Self: Sized,
    {
        self.validate().map_err(|e| DepthError::ConfigError {
            message: e.to_string(),
        })?;
        Ok(self)
    }
}

impl<T: ConfigValidator> ConfigValidatorExt for T {}

impl From<ConfigError> for DepthError {
    fn from(error: ConfigError) -> Self {
        DepthError::ConfigError {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestValidator;
    impl ConfigValidator for TestValidator {
        fn validate(&self) -> Result<(), ConfigError> {
            Ok(())
        }

        fn get_defaults() -> Self {
            TestValidator
        }
    }

    #[test]
    fn test_validate_f32_range() {
        let validator = TestValidator;
        assert!(validator.validate_f32_range(0.0, 0.0, 1.0, "sharpness").is_ok());
        assert!(validator.validate_f32_range(1.0, 0.0, 1.0, "sharpness").is_ok());
        assert!(validator.validate_f32_range(1.5, 0.0, 1.0, "sharpness").is_err());
        assert!(
            validator
                .validate_f32_range(f32::NAN, 0.0, 1.0, "sharpness")
                .is_err()
        );
    }

    #[test]
    fn test_validate_non_negative() {
        let validator = TestValidator;
        assert!(validator.validate_non_negative_f32(0.0, "exposure").is_ok());
        assert!(validator.validate_non_negative_f32(-0.1, "exposure").is_err());
        assert!(
            validator
                .validate_non_negative_f32(f32::INFINITY, "exposure")
                .is_err()
        );
    }

    #[test]
    fn test_config_error_into_depth_error() {
        let error: DepthError = ConfigError::InvalidConfig {
            message: "bad".to_string(),
        }
        .into();
        assert!(matches!(error, DepthError::ConfigError { .. }));
    }
}
