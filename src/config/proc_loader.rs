use std::{fs, path::Path};

use anyhow::{anyhow, bail, Result};
use regex::Regex;
use tracing::{debug, error, warn};

use crate::config::proc_validator;
use crate::config::service::ServiceConfig;
use crate::config::settings::{LogFormat, LoggingConfig};
use crate::config::token::TokenConfig;
use crate::observability::metrics::get_metrics;

const TOKEN_CONFIG_KEY: &str = "token_config";

/// How parse and validation problems in `token_config` are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigMode {
    /// any problem aborts startup
    #[default]
    Strict,
    /// problems are logged and the token feature is switched off
    Lenient,
}

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path, mode: ConfigMode) -> Result<ServiceConfig> {
    let content = fs::read_to_string(path)?;

    let expanded = expand_env_vars(&content);
    parse_config(expanded, mode).await
}

pub async fn parse_config(content: String, mode: ConfigMode) -> Result<ServiceConfig> {
    let metrics = get_metrics().await;
    let mut document: serde_yaml::Value = serde_yaml::from_str(&content).inspect_err(|e| {
        error!("parse config error: {}", e);
        metrics.config_parse_failures.inc();
    })?;

    // token_config is parsed on its own so lenient mode can drop just that section
    let token_section = document
        .as_mapping_mut()
        .and_then(|mapping| mapping.remove(TOKEN_CONFIG_KEY));

    let mut service_config: ServiceConfig = serde_yaml::from_value(document).inspect_err(|e| {
        error!("parse config error: {}", e);
        metrics.config_parse_failures.inc();
    })?;

    if let Some(section) = token_section {
        match serde_yaml::from_value::<TokenConfig>(section) {
            Ok(token_config) => service_config.token_config = token_config,
            Err(e) => {
                metrics.config_parse_failures.inc();
                match mode {
                    ConfigMode::Strict => bail!("{}: {}", TOKEN_CONFIG_KEY, e),
                    ConfigMode::Lenient => {
                        warn!("{} ignored, token handling disabled: {}", TOKEN_CONFIG_KEY, e);
                        service_config.token_config = TokenConfig::default();
                    }
                }
            }
        }
    }

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig::new("info".to_owned(), LogFormat::Compact));
    }

    debug!("validation config ...");
    if let Err(errors) = proc_validator::validate_service_config(&service_config).await {
        match mode {
            ConfigMode::Strict => {
                return Err(anyhow!(
                    "config is not valid, total errors: {}\n{}",
                    errors.len(),
                    errors.join("\n")
                ))
            }
            ConfigMode::Lenient => {
                warn!("config has {} errors, token handling disabled", errors.len());
                service_config.token_config.enabled = false;
            }
        }
    }

    Ok(service_config)
}

/// Replace `${VAR}` and `${VAR:default}` with environment values.
pub fn expand_env_vars(input: &str) -> String {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}").expect("env placeholder pattern is valid");
    re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}
