//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * server / metrics / logging settings
//!   * service endpoints resolve (namespace / domain present where required)
//!   * token endpoint path, timeouts and the replay target
//!   * injection rules
//!
//! Unknown injection types and a condition that does not compile are only
//! warned about: the injector skips the former, the evaluator fails open on the latter.

use tracing::{error, info, warn};

use crate::config::endpoints::HttpServiceConfig;
use crate::config::service::ServiceConfig;
use crate::config::settings::SettingsConfig;
use crate::config::token::{InjectionType, RetryTarget, TokenConfig};
use crate::observability::metrics::get_metrics;
use crate::parser::condition::compile_condition;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_service("upstream", Some(&cfg.upstream), &mut errors);

    if cfg.token_config.enabled {
        validate_service("token_service", cfg.token_service.as_ref(), &mut errors);
        if cfg.token_config.retry_target == RetryTarget::GatewayService {
            validate_service("gateway_service", cfg.gateway_service.as_ref(), &mut errors);
        }
        validate_token_config(&cfg.token_config, &mut errors);
    }

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc();
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.is_empty() {
        errors.push(format!(
            "settings.server.host '{}' must be valid",
            settings.server.host
        ));
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be an integer in range 0-65535",
            settings.server.port
        ));
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    if settings.body_limit_bytes == 0 {
        errors.push("settings.body_limit_bytes must be > 0".to_string());
    }

    // logging level
    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_service(name: &str, service: Option<&HttpServiceConfig>, errors: &mut Vec<String>) {
    let Some(service) = service else {
        errors.push(format!("{} must be configured", name));
        return;
    };
    if let Err(e) = service.endpoint.host() {
        errors.push(format!("{}.endpoint: {}", name, e));
    }
    if service.endpoint.service_port == 0 {
        errors.push(format!("{}.endpoint.service_port must be > 0", name));
    }
    if service.timeout == Some(0) {
        errors.push(format!("{}.timeout must be > 0", name));
    }
}

/// TOKEN HANDLING INVARIANTS
fn validate_token_config(token: &TokenConfig, errors: &mut Vec<String>) {
    if !token.token_path.starts_with('/') {
        errors.push(format!(
            "token_config.token_path '{}' must start with '/'",
            token.token_path
        ));
    }
    if token.timeout == 0 {
        errors.push("token_config.timeout must be > 0".to_string());
    }
    if token.retry_timeout == 0 {
        errors.push("token_config.retry_timeout must be > 0".to_string());
    }
    if token
        .token_extraction
        .response_path
        .split('.')
        .any(|segment| segment.is_empty())
        && !token.token_extraction.response_path.is_empty()
    {
        errors.push(format!(
            "token_config.token_extraction.response_path '{}' has an empty segment",
            token.token_extraction.response_path
        ));
    }

    for (i, rule) in token.token_injection.iter().enumerate() {
        match &rule.injection_type {
            InjectionType::Header => {
                if rule.key.trim().is_empty() {
                    errors.push(format!("token_config.token_injection[{}]: header key cannot be empty", i));
                }
            }
            InjectionType::FormBody => {}
            InjectionType::Unknown(kind) => {
                warn!("token_config.token_injection[{}]: unknown type '{}' will be ignored", i, kind);
            }
        }
    }

    // a broken condition only disables the check, every response then passes as valid
    let condition = token.invalid_token_condition.trim();
    if !condition.is_empty() {
        if let Err(e) = compile_condition(condition) {
            warn!("token_config.invalid_token_condition '{}' will never fire: {}", condition, e);
        }
    }
}
