pub(crate) mod blocking;
pub mod error;
pub(crate) mod mutex_ext;
pub(crate) mod security;
pub(crate) mod time;

/// Boxed future returned by the object-safe async seams (surface, verifier, transport, resolver).
pub type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// HTTP client for tests talking to loopback servers; ignores proxy environment variables.
#[cfg(test)]
pub(crate) fn loopback_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build loopback client")
}
