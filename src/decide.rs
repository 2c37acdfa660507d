//! Remote decision client, consulted when a flag cannot be evaluated locally.
use std::collections::HashMap;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{fetcher::check_status, flags::FlagValue, Error, Result};

const DECIDE_ENDPOINT: &str = "/decide/?v=2";

/// Group context for a decision: group type to group key.
pub type Groups = HashMap<String, String>;

/// Computes flag values on the server.
pub trait DecisionSource {
    /// Returns every flag value the server computed for `subject_id`.
    fn decide(&self, subject_id: &str, groups: &Groups) -> Result<HashMap<String, FlagValue>>;
}

#[derive(Debug, Serialize)]
struct DecideRequest<'a> {
    api_key: &'a str,
    distinct_id: &'a str,
    groups: &'a Groups,
}

#[derive(Debug, Deserialize)]
struct DecideResponse {
    #[serde(rename = "featureFlags", default)]
    feature_flags: HashMap<String, serde_json::Value>,
}

/// Calls the decide endpoint.
pub struct HttpDecideClient {
    client: reqwest::blocking::Client,
    url: Url,
    project_api_key: String,
    personal_api_key: String,
}

impl HttpDecideClient {
    pub fn new(
        client: reqwest::blocking::Client,
        host: &str,
        project_api_key: impl Into<String>,
        personal_api_key: impl Into<String>,
    ) -> Result<HttpDecideClient> {
        let url = Url::parse(&format!("{}{}", host.trim_end_matches('/'), DECIDE_ENDPOINT))
            .map_err(Error::InvalidHost)?;

        Ok(HttpDecideClient {
            client,
            url,
            project_api_key: project_api_key.into(),
            personal_api_key: personal_api_key.into(),
        })
    }
}

impl DecisionSource for HttpDecideClient {
    fn decide(&self, subject_id: &str, groups: &Groups) -> Result<HashMap<String, FlagValue>> {
        log::debug!(target: "featureflags", subject_id; "requesting remote decision");
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.personal_api_key)
            .json(&DecideRequest {
                api_key: &self.project_api_key,
                distinct_id: subject_id,
                groups,
            })
            .send()?;

        let body = check_status(response)?.bytes()?;
        let decision: DecideResponse = serde_json::from_slice(&body)?;

        Ok(decision
            .feature_flags
            .into_iter()
            .map(|(key, value)| (key, to_flag_value(value)))
            .collect())
    }
}

fn to_flag_value(value: serde_json::Value) -> FlagValue {
    match value {
        serde_json::Value::Bool(b) => FlagValue::Boolean(b),
        serde_json::Value::Null => FlagValue::Boolean(false),
        serde_json::Value::String(s) => FlagValue::Variant(s),
        other => FlagValue::Variant(other.to_string()),
    }
}
