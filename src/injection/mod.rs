//! Places the credential into an outbound request according to the configured rules.

use http::{HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::config::token::{InjectionType, TokenInjection};
use crate::transport::OutboundRequest;
use crate::utils::constants::{DEFAULT_FORM_TOKEN_FIELD, TOKEN_PLACEHOLDER};

#[derive(Debug, Clone, Default)]
pub struct Injector {
    rules: Vec<TokenInjection>,
}

impl Injector {
    pub fn new(rules: Vec<TokenInjection>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order. Rules that cannot be applied are logged and skipped.
    pub fn inject(&self, token: &str, request: &mut OutboundRequest) {
        for rule in &self.rules {
            let template = if rule.format.is_empty() { TOKEN_PLACEHOLDER } else { rule.format.as_str() };
            let value = template.replace(TOKEN_PLACEHOLDER, token);

            match &rule.injection_type {
                InjectionType::Header => append_header(request, &rule.key, &value),
                InjectionType::FormBody => {
                    let field = if rule.key.is_empty() { DEFAULT_FORM_TOKEN_FIELD } else { rule.key.as_str() };
                    request.body = set_form_field(&request.body, field, &value);
                    debug!("token injected into form field '{}'", field);
                }
                InjectionType::Unknown(kind) => warn!("unknown injection type '{}', rule skipped", kind),
            }
        }
    }
}

fn append_header(request: &mut OutboundRequest, key: &str, value: &str) {
    let name = match HeaderName::from_bytes(key.as_bytes()) {
        Ok(name) => name,
        Err(e) => {
            warn!("cannot inject header '{}': {}", key, e);
            return;
        }
    };
    match HeaderValue::from_str(value) {
        Ok(value) => {
            request.headers.append(name, value);
            debug!("token injected into header '{}'", key);
        }
        Err(e) => warn!("cannot inject header '{}': {}", key, e),
    }
}

/// Parse `body` as a URL-encoded form, set `field` to `value` (replacing any
/// previous values) and re-encode with keys in sorted order.
fn set_form_field(body: &[u8], field: &str, value: &str) -> Vec<u8> {
    let mut pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).unwrap_or_else(|e| {
        warn!("request body is not a form, starting an empty one: {}", e);
        Vec::new()
    });

    pairs.retain(|(key, _)| key != field);
    pairs.push((field.to_owned(), value.to_owned()));
    pairs.sort_by(|(a, _), (b, _)| a.cmp(b));

    serde_urlencoded::to_string(&pairs)
        .unwrap_or_default()
        .into_bytes()
}
