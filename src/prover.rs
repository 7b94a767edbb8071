use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProverConfig;
use crate::error::RelayError;

/// Proof payload as returned by the proving service. Its shape is owned by the
/// service, so it stays an untyped JSON object.
pub type ProofResponse = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Serialize)]
struct ProofRequest<'a> {
    member: &'a str,
    expected_member: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProofEnvelope {
    proof: ProofResponse,
}

pub struct ProofClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ProofClient {
    pub fn new(config: &ProverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client for the proving service")?;

        Ok(Self {
            client,
            endpoint: format!("{}/generate-proof", config.base_url.trim_end_matches('/')),
        })
    }

    /// Ask the proving service for a membership proof. Makes one attempt.
    pub async fn request_proof(
        &self,
        member: &str,
        expected_member: &str,
    ) -> Result<ProofResponse, RelayError> {
        let request = ProofRequest {
            member,
            expected_member,
        };

        debug!("Requesting proof from {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(RelayError::Unreachable)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = error_detail(response.text().await);
            return Err(RelayError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(RelayError::Unreachable)?;
        let envelope: ProofEnvelope = serde_json::from_slice(&body).map_err(RelayError::Parse)?;

        debug!("Received proof with {} entries", envelope.proof.len());
        Ok(envelope.proof)
    }
}

/// Body of a failed response, for the user-facing error. A body that cannot
/// be read still yields a detail so the reply says what went wrong.
fn error_detail(body: Result<String, reqwest::Error>) -> String {
    match body {
        Ok(text) => text,
        Err(e) => {
            warn!("Could not read proving service error body: {}", e);
            format!("<unreadable response body: {}>", e)
        }
    }
}
