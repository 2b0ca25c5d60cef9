use async_trait::async_trait;
use tracing::debug;

use super::xml;
use crate::config::{ConfigError, VerificationConfig};
use crate::workflows::reconciliation::{
    AddressQuery, StreetCandidate, VerificationClient, VerificationError, ZipCandidate,
};

const CITY_STATE_LOOKUP: &str = "CityStateLookup";
const VERIFY: &str = "Verify";

#[derive(Debug, thiserror::Error)]
pub enum UspsClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build USPS HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// USPS Web Tools client for the `CityStateLookup` and `Verify` APIs.
#[derive(Debug, Clone)]
pub struct UspsClient {
    http: reqwest::Client,
    server: String,
    user_id: String,
}

impl UspsClient {
    pub fn new(config: &VerificationConfig) -> Result<Self, UspsClientError> {
        let user_id = config.require_user_id()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("address-recon/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            server: config.server.clone(),
            user_id,
        })
    }

    async fn call(&self, api: &str, request: String) -> Result<String, VerificationError> {
        debug!(api, server = %self.server, "calling USPS web tools");

        let response = self
            .http
            .get(&self.server)
            .query(&[("API", api), ("XML", request.as_str())])
            .send()
            .await
            .map_err(|err| VerificationError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerificationError::Transport(format!(
                "{api} returned HTTP {status}"
            )));
        }

        response
            .text()
            .await
            .map_err(|err| VerificationError::Transport(err.to_string()))
    }
}

#[async_trait]
impl VerificationClient for UspsClient {
    async fn lookup_by_zip(&self, zip5: &str) -> Result<ZipCandidate, VerificationError> {
        let request = xml::city_state_request(&self.user_id, zip5);
        let body = self.call(CITY_STATE_LOOKUP, request).await?;
        xml::parse_city_state(&body)
    }

    async fn lookup_by_address(
        &self,
        query: &AddressQuery,
    ) -> Result<StreetCandidate, VerificationError> {
        let request = xml::address_validate_request(&self.user_id, query);
        let body = self.call(VERIFY, request).await?;
        xml::parse_address_validate(&body)
    }
}
