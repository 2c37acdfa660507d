use std::{sync::Arc, time::Duration};

use crate::{error_sink::LogErrorSink, Client, ErrorSink, PollerConfig, Result};

/// Configuration for [`Client`].
pub struct ClientConfig {
    pub(crate) project_api_key: String,
    pub(crate) personal_api_key: String,
    pub(crate) host: String,
    pub(crate) poller: PollerConfig,
    pub(crate) request_timeout: Duration,
    pub(crate) error_sink: Arc<dyn ErrorSink + Send + Sync>,
}

impl ClientConfig {
    /// Default host for API calls.
    pub const DEFAULT_HOST: &'static str = "https://app.posthog.com";

    /// Default timeout applied to every HTTP request.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a default configuration using the project key (sent with every request) and the
    /// personal key (authorizes flag definition downloads).
    ///
    /// ```
    /// # use featureflags::ClientConfig;
    /// ClientConfig::new("phc_project_key", "phx_personal_key");
    /// ```
    pub fn new(project_api_key: impl Into<String>, personal_api_key: impl Into<String>) -> Self {
        ClientConfig {
            project_api_key: project_api_key.into(),
            personal_api_key: personal_api_key.into(),
            host: ClientConfig::DEFAULT_HOST.to_owned(),
            poller: PollerConfig::default(),
            request_timeout: ClientConfig::DEFAULT_REQUEST_TIMEOUT,
            error_sink: Arc::new(LogErrorSink),
        }
    }

    /// Override host for API calls, e.g. for self-hosted deployments.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Interval between flag definition refreshes. Waits shorter than
    /// [`PollerConfig::MIN_POLL_WAIT`] are raised to it.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poller.interval = interval;
        self
    }

    /// Maximum random amount subtracted from each poll interval.
    pub fn poll_jitter(mut self, jitter: Duration) -> Self {
        self.poller.jitter = jitter;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the sink receiving background fetch and remote decision errors.
    ///
    /// ```
    /// # use featureflags::ClientConfig;
    /// let config = ClientConfig::new("phc_project_key", "phx_personal_key")
    ///     .error_sink(|context: &str, err: &featureflags::Error| {
    ///         eprintln!("{context}: {err}");
    ///     });
    /// ```
    pub fn error_sink(mut self, error_sink: impl ErrorSink + Send + Sync + 'static) -> Self {
        self.error_sink = Arc::new(error_sink);
        self
    }

    /// Create a new [`Client`] and start its poller thread.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHost`](crate::Error::InvalidHost) if the host is not a valid URL.
    /// - [`Error::Transport`](crate::Error::Transport) if the HTTP client cannot be built.
    /// - [`Error::Io`](crate::Error::Io) if the poller thread cannot be spawned.
    pub fn to_client(self) -> Result<Client> {
        Client::new(self)
    }
}
