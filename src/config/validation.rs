use super::{AppConfig, ConfigError};

/// Validate a parsed configuration.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] for unusable field values.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.timeout == 0 {
        return Err(ConfigError::Validation(
            "server.timeout must be greater than zero".into(),
        ));
    }

    let base_url = config.upstream.base_url.trim_end_matches('/');
    if base_url.is_empty() {
        return Err(ConfigError::Validation(
            "upstream.base_url must not be empty".into(),
        ));
    }
    if url::Url::parse(base_url).is_err() {
        return Err(ConfigError::Validation(format!(
            "upstream.base_url is not a valid URL: {base_url}"
        )));
    }

    if config.upstream.api_version.is_empty() {
        return Err(ConfigError::Validation(
            "upstream.api_version must not be empty".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;

    #[test]
    fn test_defaults_validate() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let config = AppConfig {
            upstream: UpstreamConfig {
                base_url: "not a url".into(),
                ..UpstreamConfig::default()
            },
            ..AppConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = AppConfig::default();
        config.server.timeout = 0;
        assert!(validate_config(&config).is_err());
    }
}
