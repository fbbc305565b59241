//! Dispatch Client: delivers play commands to the playback host
//!
//! Each attempt has its own timeout. Transient failures (connection refused,
//! timeout, 502/503/504) are retried up to `max_retries` times with linear
//! backoff; a definite rejection from the playback host is returned at once.
//! Duplicate deliveries are harmless because the playback host treats the
//! directory already playing as a no-op.

use crate::config::DispatchConfig;
use crate::error::Error;
use reqwest::StatusCode;
use rfmp_common::api::{ErrorResponse, PlayCommand, PlayResponse};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

const USER_AGENT: &str = concat!("rfmp-sh/", env!("CARGO_PKG_VERSION"));

/// Observable result of a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The playback host accepted the command
    Delivered { response: PlayResponse },
    /// The playback host refused the command; not retried
    Rejected { reason: String },
    /// No answer after the retry budget
    Unreachable { reason: String },
}

enum Attempt {
    Final(DispatchOutcome),
    Transient(String),
}

/// HTTP client for `POST /play` on the playback host
#[derive(Clone)]
pub struct DispatchClient {
    http: reqwest::Client,
    play_url: String,
    max_retries: u32,
    backoff: Duration,
}

impl DispatchClient {
    pub fn new(config: &DispatchConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| Error::Dispatch(e.to_string()))?;

        Ok(Self {
            http,
            play_url: format!("{}/play", config.endpoint.trim_end_matches('/')),
            max_retries: config.max_retries,
            backoff: config.backoff(),
        })
    }

    pub fn play_url(&self) -> &str {
        &self.play_url
    }

    /// Send `command`, retrying transient failures
    pub async fn dispatch(&self, command: &PlayCommand) -> DispatchOutcome {
        let attempts = self.max_retries + 1;
        let mut last_failure = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.backoff * (attempt - 1);
                tokio::time::sleep(delay).await;
            }

            match self.attempt(command).await {
                Attempt::Final(outcome) => {
                    match &outcome {
                        DispatchOutcome::Delivered { response } => info!(
                            card_id = %command.card_id,
                            directory = %command.directory,
                            outcome = %response.outcome,
                            "Play command delivered"
                        ),
                        DispatchOutcome::Rejected { reason } => warn!(
                            card_id = %command.card_id,
                            directory = %command.directory,
                            "Play command rejected: {}",
                            reason
                        ),
                        DispatchOutcome::Unreachable { .. } => {}
                    }
                    return outcome;
                }
                Attempt::Transient(reason) => {
                    warn!(
                        card_id = %command.card_id,
                        attempt,
                        attempts,
                        "Dispatch attempt failed: {}",
                        reason
                    );
                    last_failure = reason;
                }
            }
        }

        error!(
            card_id = %command.card_id,
            url = %self.play_url,
            "Playback host unreachable after {} attempts",
            attempts
        );
        DispatchOutcome::Unreachable {
            reason: last_failure,
        }
    }

    async fn attempt(&self, command: &PlayCommand) -> Attempt {
        let response = match self.http.post(&self.play_url).json(command).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Attempt::Transient(format!("timed out: {}", e)),
            Err(e) => return Attempt::Transient(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<PlayResponse>().await {
                Ok(body) => Attempt::Final(DispatchOutcome::Delivered { response: body }),
                // The command may have taken effect; retrying would not help
                Err(e) => Attempt::Final(DispatchOutcome::Rejected {
                    reason: format!("invalid response body: {}", e),
                }),
            };
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .map(|err| err.error)
            .unwrap_or(body);

        if is_transient(status) {
            Attempt::Transient(format!("{}: {}", status, detail))
        } else {
            Attempt::Final(DispatchOutcome::Rejected {
                reason: format!("{}: {}", status, detail),
            })
        }
    }
}

/// Gateway-style errors mean the playback host itself was not reached
fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}
