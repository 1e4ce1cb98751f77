pub mod context;
pub mod retry;

pub use context::{RetryContext, RetryState};
pub use retry::{RetryCoordinator, RetryOutcome};
