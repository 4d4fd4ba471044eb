//! HTTP transport for command envelopes.
//!
//! [`CommandClient`] issues exactly one `POST` per [`CommandClient::send`] and
//! never retries. Every failure is classified into a [`TransportError`] so the
//! worker can log it and stop.

use core::time::Duration;
use fleetcmd_core::{AckEnvelope, CommandEnvelope, TransportError};
use tokio::time::Instant;

/// Outcome of one acknowledged command.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub url: String,
    /// HTTP status of the response. Not interpreted: any body that decodes as
    /// an [`AckEnvelope`] counts as delivered.
    pub status: u16,
    pub ack: AckEnvelope,
    /// Time from issuing the request to decoding the acknowledgement.
    pub round_trip: Duration,
}

/// One worker's connection to the command endpoint.
#[derive(Clone, Debug)]
pub struct CommandClient {
    http: reqwest::Client,
    base: String,
    timeout: Option<Duration>,
}

impl CommandClient {
    /// Creates a client for `base` (no trailing `/`), with an optional
    /// per-request deadline.
    pub fn new(
        base: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let base = base.into();
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| TransportError::Request {
            url: base.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            http,
            base,
            timeout,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `{base}/{version}/{identity}/{command}` for `envelope`.
    pub fn url_for(&self, envelope: &CommandEnvelope) -> String {
        format!("{}{}", self.base, envelope.path())
    }

    /// Sends `envelope` and decodes the acknowledgement.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Connect`] if no connection could be established.
    /// - [`TransportError::Timeout`] if the configured deadline elapsed.
    /// - [`TransportError::Decode`] if the body is not an [`AckEnvelope`].
    /// - [`TransportError::Request`] for any other transport failure.
    pub async fn send(&self, envelope: &CommandEnvelope) -> Result<Delivery, TransportError> {
        let url = self.url_for(envelope);
        let started = Instant::now();

        let response = self
            .http
            .post(&url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| self.classify(&url, &e))?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.classify(&url, &e))?;

        let ack = serde_json::from_slice::<AckEnvelope>(&body).map_err(|e| {
            TransportError::Decode {
                url: url.clone(),
                status,
                reason: e.to_string(),
            }
        })?;

        Ok(Delivery {
            url,
            status,
            ack,
            round_trip: started.elapsed(),
        })
    }

    fn classify(&self, url: &str, err: &reqwest::Error) -> TransportError {
        let url = url.to_owned();
        if err.is_timeout() {
            TransportError::Timeout {
                url,
                after: self.timeout.unwrap_or_default(),
            }
        } else if err.is_connect() {
            TransportError::Connect {
                url,
                reason: error_chain(err),
            }
        } else {
            TransportError::Request {
                url,
                reason: error_chain(err),
            }
        }
    }
}

// reqwest's Display stops at "error sending request"; the cause is in the
// source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    reason
}
