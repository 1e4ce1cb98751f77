pub mod bindings;
pub mod condition;
pub mod response;

pub use condition::{is_token_invalid, InvalidityEvaluator};
pub use response::extract_token;
