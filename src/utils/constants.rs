//! Shared constants and invariants

pub const DEFAULT_HTTP_TIMEOUT_MS: u32 = 5000;
pub const DEFAULT_SERVICE_PORT: u16 = 80;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 4 * 1024 * 1024;

pub const DEFAULT_RESPONSE_PATH: &str = "datas";
pub const DEFAULT_FORM_TOKEN_FIELD: &str = "token";
pub const TOKEN_PLACEHOLDER: &str = "{token}";

// Supported injection types
pub const INJECTION_HEADER: &str = "header";
pub const INJECTION_FORM_BODY: &str = "form_body";
pub const INJECTION_FORM: &str = "form";

// Synthesized response bodies
pub const FAILED_TO_FETCH_TOKEN: &str = "Failed to fetch token";
pub const INVALID_REQUEST: &str = "Invalid request";
pub const REQUEST_FAILED: &str = "Request failed";
pub const UPSTREAM_UNAVAILABLE: &str = "Upstream unavailable";
pub const BODY_TOO_LARGE: &str = "Request body too large";

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPES: [&str; 2] = ["application/json", "application/json; charset=utf-8"];
