use serde::Deserialize;
use std::collections::BTreeMap;

use crate::utils::constants::{
    DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_RESPONSE_PATH, INJECTION_FORM, INJECTION_FORM_BODY,
    INJECTION_HEADER, TOKEN_PLACEHOLDER,
};

/// ================================
/// Token handling
/// ================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TokenConfig {
    /// master switch; when false every exchange is forwarded untouched
    pub enabled: bool,
    pub credential: Credential,
    /// token endpoint path on `token_service`
    pub token_path: String,
    /// token endpoint call timeout, milliseconds
    pub timeout: u32,
    pub token_extraction: TokenExtraction,
    pub token_injection: Vec<TokenInjection>,
    /// boolean expression over the upstream JSON response; empty disables the check
    pub invalid_token_condition: String,
    /// maximum replays per exchange
    pub retry_send_times: u32,
    /// which transport replays go through
    pub retry_target: RetryTarget,
    /// replay call timeout, milliseconds
    pub retry_timeout: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            credential: Credential::default(),
            token_path: String::new(),
            timeout: DEFAULT_HTTP_TIMEOUT_MS,
            token_extraction: TokenExtraction::default(),
            token_injection: Vec::new(),
            invalid_token_condition: String::new(),
            retry_send_times: 0,
            retry_target: RetryTarget::default(),
            retry_timeout: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

/// Fixed fields presented to the token endpoint.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Credential {
    pub form_fields: BTreeMap<String, String>,
    pub head_fields: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TokenExtraction {
    /// dot separated path into the token response JSON, e.g. `result.token`
    pub response_path: String,
}

impl Default for TokenExtraction {
    fn default() -> Self {
        Self { response_path: DEFAULT_RESPONSE_PATH.to_owned() }
    }
}

/// One placement rule for the credential.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenInjection {
    #[serde(rename = "type")]
    pub injection_type: InjectionType,
    #[serde(default)]
    pub key: String,
    /// value template, `{token}` is replaced by the credential
    #[serde(default = "default_format")]
    pub format: String,
}

impl TokenInjection {
    pub fn new(injection_type: InjectionType, key: &str, format: &str) -> Self {
        Self {
            injection_type,
            key: key.to_owned(),
            format: format.to_owned(),
        }
    }
}

/// Placement of an injected credential.
///
/// Unknown names are kept so they can be reported when the rule fires.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(from = "String")]
pub enum InjectionType {
    Header,
    FormBody,
    Unknown(String),
}

impl From<String> for InjectionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            INJECTION_HEADER => InjectionType::Header,
            INJECTION_FORM_BODY | INJECTION_FORM => InjectionType::FormBody,
            _ => InjectionType::Unknown(value),
        }
    }
}

/// Transport used to resend a rejected request.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetryTarget {
    /// the same upstream the exchange was forwarded to
    #[default]
    Upstream,
    TokenService,
    GatewayService,
}

fn default_format() -> String {
    TOKEN_PLACEHOLDER.to_owned()
}
