use http::{HeaderName, HeaderValue, Method};
use tracing::debug;

use crate::error::ReconstructionError;
use crate::transport::OutboundRequest;

pub const PSEUDO_METHOD: &str = ":method";
pub const PSEUDO_PATH: &str = ":path";
pub const PSEUDO_AUTHORITY: &str = ":authority";
pub const PSEUDO_SCHEME: &str = ":scheme";

/// Headers never carried over to a rebuilt request.
const TRANSPORT_HEADERS: [&str; 6] = [PSEUDO_METHOD, PSEUDO_PATH, PSEUDO_AUTHORITY, PSEUDO_SCHEME, "host", "Host"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Captured,
    AwaitingToken,
    Replaying,
    Done,
    Exhausted,
}

/// Inbound request head in arrival order. Values are kept as raw bytes so
/// opaque (non-ASCII) values survive the forward and every replay.
pub type CapturedHeaders = Vec<(String, HeaderValue)>;

/// Everything one exchange needs to resend its request.
#[derive(Debug, Clone)]
pub struct RetryContext {
    headers: CapturedHeaders,
    body: Vec<u8>,
    retry_count: u32,
    max_retries: u32,
    state: RetryState,
}

impl RetryContext {
    /// `headers` keep their original order and may include `:`-prefixed pseudo-headers.
    pub fn initialize(headers: CapturedHeaders, max_retries: u32) -> Self {
        Self {
            headers,
            body: Vec::new(),
            retry_count: 0,
            max_retries,
            state: RetryState::Captured,
        }
    }

    pub fn attach_body(&mut self, body: &[u8]) {
        self.body = body.to_vec();
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &[(String, HeaderValue)] {
        &self.headers
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Start another attempt; false (and `Exhausted`) once the budget is spent.
    pub(crate) fn begin_retry(&mut self) -> bool {
        if self.retry_count >= self.max_retries {
            self.state = RetryState::Exhausted;
            return false;
        }
        self.retry_count += 1;
        self.state = RetryState::AwaitingToken;
        true
    }

    pub(crate) fn set_state(&mut self, state: RetryState) {
        self.state = state;
    }

    /// First captured value of `name`, exact match. Values that are not
    /// visible ASCII read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.to_str().ok())
    }

    pub fn method(&self) -> &str {
        self.header(PSEUDO_METHOD).filter(|m| !m.is_empty()).unwrap_or("GET")
    }

    pub fn path(&self) -> &str {
        self.header(PSEUDO_PATH).unwrap_or_default()
    }

    pub fn authority(&self) -> &str {
        self.header(PSEUDO_AUTHORITY).unwrap_or_default()
    }

    /// `http` unless captured otherwise; a plain-http hop behind a TLS
    /// terminator is reported as `https`.
    pub fn scheme(&self) -> &str {
        let scheme = self
            .header(PSEUDO_SCHEME)
            .or_else(|| self.header("scheme"))
            .unwrap_or("http");
        if scheme == "http" && self.headers.iter().any(|(k, v)| k == "x-forwarded-proto" && v == "https") {
            return "https";
        }
        scheme
    }

    /// Original request URL, used for logging only.
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme(), self.authority(), self.path())
    }

    /// Request for the first forward; a missing path means `/`.
    pub fn forward_request(&self) -> Result<OutboundRequest, ReconstructionError> {
        let path = match self.path() {
            "" => "/",
            path => path,
        };
        self.build(path)
    }

    /// Request for a replay. Both `:path` and `:authority` must have been captured.
    pub fn replay_request(&self) -> Result<OutboundRequest, ReconstructionError> {
        let (path, authority) = (self.path(), self.authority());
        if path.is_empty() || authority.is_empty() {
            return Err(ReconstructionError::MissingRouting {
                path: path.to_owned(),
                authority: authority.to_owned(),
            });
        }
        self.build(path)
    }

    fn build(&self, path: &str) -> Result<OutboundRequest, ReconstructionError> {
        let method = Method::from_bytes(self.method().as_bytes())
            .map_err(|_| ReconstructionError::InvalidMethod(self.method().to_owned()))?;
        let mut request = OutboundRequest::new(method, path);

        for (key, value) in &self.headers {
            if key.starts_with(':') || TRANSPORT_HEADERS.contains(&key.as_str()) {
                continue;
            }
            match HeaderName::from_bytes(key.as_bytes()) {
                Ok(name) => {
                    request.headers.append(name, value.clone());
                }
                Err(_) => debug!("dropping header with invalid name '{}'", key),
            }
        }
        request.body = self.body.clone();
        Ok(request)
    }
}
