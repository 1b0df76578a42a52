use std::{collections::HashSet, net::SocketAddr};

use crate::config::models::{Aggregation, Call, GatewayConfig};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Gateway configuration validator.
///
/// All invariants are checked in one pass and reported together so operators
/// can fix a config file in a single round trip.
pub struct GatewayConfigValidator;

impl GatewayConfigValidator {
    /// Validate the entire gateway configuration
    pub fn validate(config: &GatewayConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if config.aggregations.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "aggregations".to_string(),
            });
        } else {
            for aggregation in &config.aggregations {
                if let Err(mut aggregation_errors) = Self::validate_aggregation(aggregation) {
                    errors.append(&mut aggregation_errors);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Validate a single aggregation route
    fn validate_aggregation(aggregation: &Aggregation) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let path = &aggregation.path;

        if path.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "aggregation path".to_string(),
            });
        } else if !path.starts_with('/') {
            // Such a pattern can never match an incoming request path, but
            // loading is not refused over it.
            tracing::warn!(pattern = %path, "route pattern does not start with '/'");
        }

        if aggregation.calls.is_empty() {
            errors.push(ValidationError::InvalidField {
                field: format!("aggregation '{path}' calls"),
                message: "At least one call must be defined for each aggregation".to_string(),
            });
        }

        let mut call_names = HashSet::new();
        for call in &aggregation.calls {
            if let Err(mut call_errors) = Self::validate_call(path, call) {
                errors.append(&mut call_errors);
            }
            if !call.name.is_empty() && !call_names.insert(call.name.as_str()) {
                errors.push(ValidationError::InvalidField {
                    field: format!("aggregation '{path}' call '{}'", call.name),
                    message: "Call names must be unique within an aggregation".to_string(),
                });
            }
        }

        if let Some(rate_limit) = &aggregation.rate_limit {
            if (rate_limit.limit > 0) != (rate_limit.interval > 0) {
                errors.push(ValidationError::InvalidField {
                    field: format!("aggregation '{path}' rate_limit"),
                    message: "Both 'limit' and 'interval' must be set in rate_limit".to_string(),
                });
            }
        }

        if let Some(response) = &aggregation.response {
            for key in response.structure.keys() {
                if key != "error" && !call_names.contains(key.as_str()) {
                    errors.push(ValidationError::InvalidField {
                        field: format!("aggregation '{path}' response mapping"),
                        message: format!(
                            "'{key}' does not match any service call or 'error'"
                        ),
                    });
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Validate a single backend call
    fn validate_call(path: &str, call: &Call) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if call.name.is_empty() {
            errors.push(ValidationError::MissingField {
                field: format!("aggregation '{path}' call name"),
            });
        }
        if call.backend.is_empty() {
            errors.push(ValidationError::MissingField {
                field: format!("aggregation '{path}' call '{}' backend", call.name),
            });
        }

        for source in call.params.values() {
            if !Self::is_valid_param_source(source) {
                errors.push(ValidationError::InvalidField {
                    field: format!("aggregation '{path}' call '{}' params", call.name),
                    message: format!("invalid parameter reference: {source}"),
                });
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// A parameter source is empty or prefixed by one of the three bag selectors.
    fn is_valid_param_source(source: &str) -> bool {
        source.is_empty()
            || source.starts_with("$path.")
            || source.starts_with("$query.")
            || source.starts_with("$header.")
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        messages.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::models::{RateLimitConfig, ResponseMapping};

    fn call(name: &str, backend: &str) -> Call {
        Call {
            name: name.to_string(),
            backend: backend.to_string(),
            required: false,
            params: HashMap::new(),
        }
    }

    fn valid_config() -> GatewayConfig {
        GatewayConfig {
            listen_addr: "127.0.0.1:8080".to_string(),
            aggregations: vec![Aggregation {
                path: "/users/{id}".to_string(),
                calls: vec![call("user", "http://svc-user/u/{id}")],
                response: None,
                rate_limit: None,
            }],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(GatewayConfigValidator::validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_aggregations_rejected() {
        let config = GatewayConfig {
            aggregations: Vec::new(),
            ..valid_config()
        };
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_empty_path_rejected() {
        let mut config = valid_config();
        config.aggregations[0].path = String::new();
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_path_without_leading_slash_is_accepted() {
        let mut config = valid_config();
        config.aggregations[0].path = "users/{id}".to_string();
        assert!(GatewayConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_empty_calls_rejected() {
        let mut config = valid_config();
        config.aggregations[0].calls.clear();
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_empty_call_name_rejected() {
        let mut config = valid_config();
        config.aggregations[0].calls[0].name = String::new();
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_empty_backend_rejected() {
        let mut config = valid_config();
        config.aggregations[0].calls[0].backend = String::new();
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_call_names_rejected() {
        let mut config = valid_config();
        let duplicate = config.aggregations[0].calls[0].clone();
        config.aggregations[0].calls.push(duplicate);
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_param_source_prefixes() {
        let mut config = valid_config();
        config.aggregations[0].calls[0].params = HashMap::from([
            ("a".to_string(), "$path.id".to_string()),
            ("b".to_string(), "$query.page".to_string()),
            ("c".to_string(), "$header.x-token".to_string()),
            ("d".to_string(), String::new()),
        ]);
        assert!(GatewayConfigValidator::validate(&config).is_ok());

        config.aggregations[0]
            .calls[0]
            .params
            .insert("e".to_string(), "$cookie.session".to_string());
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_rate_limit_must_be_paired() {
        let mut config = valid_config();
        config.aggregations[0].rate_limit = Some(RateLimitConfig {
            limit: 100,
            interval: 0,
        });
        assert!(GatewayConfigValidator::validate(&config).is_err());

        config.aggregations[0].rate_limit = Some(RateLimitConfig {
            limit: 0,
            interval: 60,
        });
        assert!(GatewayConfigValidator::validate(&config).is_err());

        config.aggregations[0].rate_limit = Some(RateLimitConfig {
            limit: 0,
            interval: 0,
        });
        assert!(GatewayConfigValidator::validate(&config).is_ok());

        config.aggregations[0].rate_limit = Some(RateLimitConfig {
            limit: 100,
            interval: 60,
        });
        assert!(GatewayConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_response_structure_keys_must_name_calls() {
        let mut config = valid_config();
        config.aggregations[0].response = Some(ResponseMapping {
            structure: HashMap::from([
                ("user".to_string(), "user".to_string()),
                ("error".to_string(), "error".to_string()),
            ]),
        });
        assert!(GatewayConfigValidator::validate(&config).is_ok());

        config.aggregations[0].response = Some(ResponseMapping {
            structure: HashMap::from([("ghost".to_string(), "ghost".to_string())]),
        });
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_all_errors_reported_together() {
        let mut config = valid_config();
        config.aggregations[0].path = String::new();
        config.aggregations[0].calls[0].backend = String::new();

        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("path"));
        assert!(message.contains("backend"));
    }
}
