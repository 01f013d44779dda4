//! Usage: Video metadata API client on top of the bearer-token lifecycle.

pub mod fetcher;
pub mod transport;
pub mod videos;

pub use fetcher::{CredentialedFetcher, MAX_FETCH_ATTEMPTS};
pub use transport::{HttpTransport, ResourceTransport, TransportFailure, TransportResponse};
