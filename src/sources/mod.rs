pub mod fetch;

pub use fetch::{CredentialSpec, FetchToken, HttpTokenFetcher};
