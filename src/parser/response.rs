use serde_json::Value;

use crate::error::ExtractError;
use crate::utils::constants::DEFAULT_RESPONSE_PATH;

/// Pull the credential out of a token endpoint response.
///
/// `response_path` is dot separated (`result.token`); every segment but the last
/// must name a nested object and the last one a non-empty string.
pub fn extract_token(body: &[u8], response_path: &str) -> Result<String, ExtractError> {
    let response_path = if response_path.is_empty() {
        DEFAULT_RESPONSE_PATH
    } else {
        response_path
    };

    let document: Value = serde_json::from_slice(body)?;
    let mut current = document.as_object().ok_or(ExtractError::NotAnObject)?;

    let fields: Vec<&str> = response_path.split('.').collect();
    let (last, parents) = fields
        .split_last()
        .ok_or_else(|| ExtractError::Missing(response_path.to_owned()))?;

    for field in parents {
        current = current
            .get(*field)
            .and_then(Value::as_object)
            .ok_or_else(|| ExtractError::Interrupted((*field).to_owned()))?;
    }

    current
        .get(*last)
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ExtractError::Missing(response_path.to_owned()))
}
