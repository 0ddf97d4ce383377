use crate::config::AppConfig;
use crate::transport::UpstreamClient;

/// Process-wide shared state.
///
/// Holds only request-independent resources: configuration and the pooled
/// upstream HTTP client. All translation state is created per request.
pub struct AppState {
    pub config: AppConfig,
    pub upstream: UpstreamClient,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let upstream = UpstreamClient::new(&config);
        Self { config, upstream }
    }
}
