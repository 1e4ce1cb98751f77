use serde::Deserialize;

use crate::config::endpoints::HttpServiceConfig;
use crate::config::settings::SettingsConfig;
use crate::config::token::TokenConfig;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    /// where inbound exchanges are forwarded
    pub upstream: HttpServiceConfig,
    pub token_service: Option<HttpServiceConfig>,
    pub gateway_service: Option<HttpServiceConfig>,
    #[serde(default)]
    pub token_config: TokenConfig,
}
