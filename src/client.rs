use std::sync::Arc;

use crate::{
    decide::{DecisionSource, Groups, HttpDecideClient},
    error_sink::ErrorSink,
    fetcher::{FlagSource, HttpFlagFetcher},
    flag_store::{FlagSnapshot, FlagStore},
    flags::FlagValue,
    hasher::Sha1Hasher,
    poller::{PollerConfig, PollerState, PollerThread},
    properties::Properties,
    ClientConfig, Result,
};

/// A feature flag client.
///
/// Flags are evaluated locally against definitions kept current by a background poller thread.
/// Flags that cannot be evaluated locally are computed by the server.
///
/// # Examples
/// ```no_run
/// # use std::collections::HashMap;
/// # use featureflags::ClientConfig;
/// let client = ClientConfig::new("phc_project_key", "phx_personal_key")
///     .to_client()
///     .unwrap();
/// let enabled = client.is_feature_enabled("new-onboarding", "user-1", false, &HashMap::new(), &HashMap::new());
/// client.shutdown().unwrap();
/// ```
pub struct Client {
    store: Arc<FlagStore>,
    decider: Box<dyn DecisionSource + Send + Sync>,
    error_sink: Arc<dyn ErrorSink + Send + Sync>,
    poller: PollerThread,
}

impl Client {
    /// Create a new `Client` talking to the configured host, and start polling.
    pub fn new(config: ClientConfig) -> Result<Client> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("featureflags-rust/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        let fetcher = HttpFlagFetcher::new(
            http.clone(),
            &config.host,
            &config.project_api_key,
            config.personal_api_key.clone(),
        )?;
        let decider = HttpDecideClient::new(
            http,
            &config.host,
            config.project_api_key,
            config.personal_api_key,
        )?;

        Client::with_sources(fetcher, decider, config.error_sink, config.poller)
    }

    /// Create a `Client` with custom flag and decision sources, and start polling.
    pub fn with_sources(
        source: impl FlagSource + Send + 'static,
        decider: impl DecisionSource + Send + Sync + 'static,
        error_sink: Arc<dyn ErrorSink + Send + Sync>,
        poller_config: PollerConfig,
    ) -> Result<Client> {
        let store = Arc::new(FlagStore::new());
        let poller = PollerThread::start(
            source,
            Arc::clone(&store),
            Arc::clone(&error_sink),
            poller_config,
        )?;

        Ok(Client {
            store,
            decider: Box::new(decider),
            error_sink,
            poller,
        })
    }

    /// Returns `true` if the flag evaluates to anything other than `false` for the subject.
    ///
    /// Blocks until the first flag definitions are loaded.
    pub fn is_feature_enabled(
        &self,
        flag_key: &str,
        subject_id: &str,
        default: bool,
        person_properties: &Properties,
        group_properties: &Properties,
    ) -> bool {
        self.get_feature_flag(
            flag_key,
            subject_id,
            FlagValue::Boolean(default),
            person_properties,
            group_properties,
        )
        .is_enabled()
    }

    /// Evaluate a flag for the subject.
    ///
    /// Returns `default` when the flag is unknown or inactive, when its conditions cannot be
    /// evaluated against the supplied properties, or when a required remote decision fails.
    ///
    /// Flags the server has to decide are requested without group context. Use
    /// [`Client::get_remote_flag`] to decide group-aggregated flags for a set of groups.
    ///
    /// Blocks until the first flag definitions are loaded.
    pub fn get_feature_flag(
        &self,
        flag_key: &str,
        subject_id: &str,
        default: FlagValue,
        person_properties: &Properties,
        group_properties: &Properties,
    ) -> FlagValue {
        let snapshot = self.store.wait_for_snapshot();

        let Some(flag) = snapshot.get(flag_key) else {
            log::trace!(target: "featureflags", flag_key, subject_id; "flag not found, returning default");
            return default;
        };

        let evaluation = flag
            .evaluate(subject_id, person_properties, group_properties, &Sha1Hasher)
            .inspect_err(|err| {
                log::warn!(target: "featureflags",
                    flag_key,
                    subject_id,
                    person_properties:serde;
                    "error occurred while evaluating a flag: {}", err,
                );
            });

        let value = match evaluation {
            Ok(Some(value)) => value,
            Ok(None) => match self.get_remote_flag(flag_key, subject_id, &Groups::new()) {
                Some(value) => value,
                None => return default,
            },
            Err(_) => return default,
        };

        log::trace!(target: "featureflags",
                    flag_key,
                    subject_id,
                    value:serde = value;
                    "evaluated a flag");

        value
    }

    /// Ask the server for the value of `flag_key`. Flags missing from the response are `false`.
    ///
    /// Returns `None` if the request fails; the error goes to the error sink.
    pub fn get_remote_flag(
        &self,
        flag_key: &str,
        subject_id: &str,
        groups: &Groups,
    ) -> Option<FlagValue> {
        match self.decider.decide(subject_id, groups) {
            Ok(mut flags) => Some(
                flags
                    .remove(flag_key)
                    .unwrap_or(FlagValue::Boolean(false)),
            ),
            Err(err) => {
                log::warn!(target: "featureflags", flag_key, subject_id; "remote decision failed: {}", err);
                self.error_sink.report("error calling decide", &err);
                None
            }
        }
    }

    /// All active flag definitions.
    ///
    /// Blocks until the first flag definitions are loaded. Returns an empty snapshot if the client
    /// is shut down first.
    pub fn get_feature_flags(&self) -> Arc<FlagSnapshot> {
        self.store.wait_for_snapshot()
    }

    /// Refresh flag definitions now instead of waiting for the next poll.
    pub fn force_reload(&self) {
        self.poller.force_reload();
    }

    /// Lifecycle state of the poller thread.
    pub fn poller_state(&self) -> PollerState {
        self.poller.state()
    }

    /// Stop polling without waiting for the poller thread to exit.
    ///
    /// Readers blocked waiting for the first load are released and get their default. Later
    /// evaluations use whatever was loaded, possibly nothing.
    pub fn stop(&self) {
        self.poller.stop();
    }

    /// Stop polling and block waiting for the poller thread to exit.
    pub fn shutdown(self) -> Result<()> {
        self.poller.shutdown()
    }
}
