//! Reqwest-based implementation of the `GuessSubmitter` trait.
//!
//! Posts the JSON guess to the PasswordDB endpoint. The response body carries
//! nothing useful (the verdict arrives through the webhook), so only the
//! transport outcome is reported.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{GuessSubmission, GuessSubmitter, SubmitError};

/// Reqwest-backed submitter bound to a single verifier endpoint.
pub struct ReqwestGuessSubmitter {
    client: Client,
    endpoint: Url,
}

impl ReqwestGuessSubmitter {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, SubmitError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SubmitError::Transport(err.to_string()))?;

        Ok(Self { client, endpoint })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl GuessSubmitter for ReqwestGuessSubmitter {
    async fn submit(&self, submission: &GuessSubmission) -> Result<(), SubmitError> {
        let response = self
            .client
            .post(self.endpoint.as_str())
            .json(submission)
            .send()
            .await
            .map_err(|err| SubmitError::Transport(err.to_string()))?;

        log::trace!(
            "verifier answered {} for {}",
            response.status(),
            submission.password
        );
        Ok(())
    }
}
