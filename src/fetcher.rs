//! An HTTP client that fetches flag definitions from the server.
use reqwest::{blocking::Response, StatusCode, Url};

use crate::{
    flags::{FlagDefinition, FlagListResponse},
    Error, Result,
};

const FLAG_LIST_ENDPOINT: &str = "/api/feature_flag/";

/// A source of flag definitions, polled by [`PollerThread`](crate::PollerThread).
pub trait FlagSource {
    /// Fetch the full list of flag definitions, inactive ones included.
    fn fetch_flags(&mut self) -> Result<Vec<FlagDefinition>>;
}

/// Fetches flag definitions from the flag-listing endpoint.
pub struct HttpFlagFetcher {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    url: Url,
    personal_api_key: String,
}

impl HttpFlagFetcher {
    pub fn new(
        client: reqwest::blocking::Client,
        host: &str,
        project_api_key: &str,
        personal_api_key: impl Into<String>,
    ) -> Result<HttpFlagFetcher> {
        let url = Url::parse_with_params(
            &format!("{}{}", host.trim_end_matches('/'), FLAG_LIST_ENDPOINT),
            &[("token", project_api_key)],
        )
        .map_err(Error::InvalidHost)?;

        Ok(HttpFlagFetcher {
            client,
            url,
            personal_api_key: personal_api_key.into(),
        })
    }
}

impl FlagSource for HttpFlagFetcher {
    fn fetch_flags(&mut self) -> Result<Vec<FlagDefinition>> {
        log::debug!(target: "featureflags", "fetching flag definitions");
        let response = self
            .client
            .get(self.url.clone())
            .bearer_auth(&self.personal_api_key)
            .send()?;

        let body = check_status(response)?.bytes()?;
        let flag_list: FlagListResponse = serde_json::from_slice(&body)?;

        log::debug!(target: "featureflags", count = flag_list.results.len(); "successfully fetched flag definitions");
        Ok(flag_list.results)
    }
}

/// Map non-success statuses to errors.
pub(crate) fn check_status(response: Response) -> Result<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            log::warn!(target: "featureflags", "client is not authorized. Check your personal API key");
            Err(Error::Unauthorized)
        }
        status => {
            log::warn!(target: "featureflags", status = status.as_u16(); "received non-success response");
            Err(Error::Status(status))
        }
    }
}
