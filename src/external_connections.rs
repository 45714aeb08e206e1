use reqwest_middleware::ClientBuilder;
use reqwest_tracing::TracingMiddleware;

/// Gives driven adapters access to the clients they use to reach external systems, so business
/// logic stays agnostic of the systems it communicates with
pub trait ExternalConnectivity {
    fn http_client(&self) -> &reqwest_middleware::ClientWithMiddleware;
}

/// Data structure which owns clients for connecting to external systems.
/// Allows business logic to be agnostic of the external systems it communicates with
/// so driven adapters can easily be swapped out for other implementations
#[derive(Clone)]
pub struct HttpConnectivity {
    http_client: reqwest_middleware::ClientWithMiddleware,
}

impl HttpConnectivity {
    /// Builds the shared HTTP client. Every outgoing request gets a tracing span.
    pub fn new() -> Result<Self, anyhow::Error> {
        let base_client = reqwest::Client::builder().use_rustls_tls().build()?;
        let http_client = ClientBuilder::new(base_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(HttpConnectivity { http_client })
    }
}

impl ExternalConnectivity for HttpConnectivity {
    fn http_client(&self) -> &reqwest_middleware::ClientWithMiddleware {
        &self.http_client
    }
}
