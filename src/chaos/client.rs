//! HTTP client for the CHAOS v2 `broadband/info` call.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{parse_info_response, ChaosError, Circuit, CircuitSource, INFO_URL};
use crate::config::AaispCredentials;

const MAX_ERROR_BODY: usize = 500;

pub struct ChaosClient {
    client: reqwest::Client,
    url: String,
    credentials: AaispCredentials,
}

impl ChaosClient {
    pub fn new(credentials: AaispCredentials) -> Self {
        Self::with_url(INFO_URL, credentials)
    }

    pub fn with_url(url: impl Into<String>, credentials: AaispCredentials) -> Self {
        Self::with_client(reqwest::Client::new(), url, credentials)
    }

    pub fn with_client(
        client: reqwest::Client,
        url: impl Into<String>,
        credentials: AaispCredentials,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            credentials,
        }
    }
}

#[async_trait]
impl CircuitSource for ChaosClient {
    async fn fetch_circuits(&self) -> Result<Vec<Circuit>, ChaosError> {
        info!(
            "Connecting to AAISP CHAOSv2 endpoint as {}/{}",
            self.credentials.username,
            self.credentials.password.masked()
        );

        let resp = self
            .client
            .get(&self.url)
            .query(&[
                ("control_login", self.credentials.username.as_str()),
                ("control_password", self.credentials.password.expose()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "CHAOS response received");

        if !status.is_success() {
            return Err(ChaosError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        parse_info_response(&body)
    }
}
