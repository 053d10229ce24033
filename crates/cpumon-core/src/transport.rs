//! Network collaborator for pushing signals requests.
//!
//! Submission returns a classified outcome by value; only network outcomes
//! are worth the publisher's bounded retry, everything else is a permanent
//! failure for the batch at hand.

use std::fmt;
use std::time::Duration;

use tracing::debug;

/// Path of the signals ingestion endpoint, relative to the API host.
pub const API_PATH: &str = "/api/signals";

/// Per-request timeout. Each submission attempt resolves within this bound,
/// which the publisher's retry window relies on.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Classified result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The server accepted the request.
    Ok,
    /// The request could not be constructed or sent; permanent.
    Request(String),
    /// Transient network failure (resolve, connect, timeout); retry-worthy.
    Network(String),
    /// The endpoint is misconfigured (HTTP redirect received); permanent.
    Location(String),
    /// The server rejected the request; likely permanent.
    Server(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ok => write!(f, "ok"),
            Outcome::Request(reason) => write!(f, "request error: {}", reason),
            Outcome::Network(reason) => write!(f, "network error: {}", reason),
            Outcome::Location(reason) => write!(f, "location error: {}", reason),
            Outcome::Server(reason) => write!(f, "server error: {}", reason),
        }
    }
}

/// Accepts a serialized request body and reports the outcome.
pub trait Transport {
    fn submit(&self, body: &str) -> Outcome;
}

/// Error constructing the HTTP transport. Fatal at startup: there is no
/// recoverable partial-initialization state.
#[derive(Debug)]
pub struct TransportInitError(String);

impl fmt::Display for TransportInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to initialize HTTP transport: {}", self.0)
    }
}

impl std::error::Error for TransportInitError {}

/// HTTP transport POSTing signals documents to the ingestion API.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_token: String,
}

impl HttpTransport {
    /// Builds a client for `<api_host>/api/signals`.
    ///
    /// Redirects are not followed: a redirect response means the endpoint is
    /// misconfigured and is reported as a location outcome. Peer certificate
    /// verification is disabled to keep parity with deployments using
    /// self-signed ingestion endpoints.
    pub fn new(api_host: &str, api_token: &str) -> Result<Self, TransportInitError> {
        let client = reqwest::blocking::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportInitError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", api_host.trim_end_matches('/'), API_PATH),
            api_token: api_token.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn submit(&self, body: &str) -> Outcome {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("access-token", &self.api_token)
            .body(body.to_owned())
            .send();

        match response {
            Ok(response) => {
                let status = response.status();
                debug!("signals endpoint responded with HTTP {}", status.as_u16());

                if status.is_redirection() {
                    Outcome::Location(format!(
                        "invalid endpoint URL (received HTTP redirect {})",
                        status.as_u16()
                    ))
                } else if status.is_client_error() || status.is_server_error() {
                    Outcome::Server(format!("server returned HTTP {}", status.as_u16()))
                } else {
                    Outcome::Ok
                }
            }
            Err(e) if e.is_connect() || e.is_timeout() => Outcome::Network(e.to_string()),
            Err(e) => Outcome::Request(e.to_string()),
        }
    }
}
