//! reqwest-backed clients for the collaborator services.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::wire::{
    DraftRequest, DraftResponse, ErrorBody, GenerationRequest, GenerationResponse,
    GroundingRequest, GroundingResponse,
};
use super::{GenerationService, GroundingService, PersistenceService, ServiceFuture};
use crate::config::ServicesConfig;
use crate::{AppError, Result};

/// A JSON-over-HTTP endpoint with an optional bearer token.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    http: Client,
    name: &'static str,
    url: String,
    token: Option<String>,
}

impl ServiceEndpoint {
    /// Create an endpoint sharing the given client.
    #[must_use]
    pub fn new(http: Client, name: &'static str, url: String, token: Option<String>) -> Self {
        Self {
            http,
            name,
            url,
            token,
        }
    }

    /// Service name used in log lines and fallback error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// POST `body` as JSON and decode a JSON answer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Upstream` with the server's `{error}` message on
    /// non-2xx answers, or on transport failure, and `AppError::Malformed`
    /// when a 2xx body cannot be decoded.
    pub async fn post_json<Req, Resp>(&self, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let mut request = self.http.post(&self.url).json(body);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(service = self.name, %status, bytes = bytes.len(), "service responded");

        if !status.is_success() {
            let message = upstream_message(self.name, status, &bytes);
            warn!(service = self.name, %status, %message, "service call failed");
            return Err(AppError::Upstream(message));
        }

        serde_json::from_slice(&bytes).map_err(|err| {
            AppError::Malformed(format!("{} service returned invalid JSON: {err}", self.name))
        })
    }
}

/// Extract the `{error}` message from a failed answer, or describe the status.
fn upstream_message(name: &str, status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("{name} service returned HTTP {}", status.as_u16()))
}

/// Build the shared reqwest client.
///
/// # Errors
///
/// Returns `AppError::Config` if the TLS backend cannot be initialised.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("metagen-queue/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))
}

/// Grounding service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGroundingClient {
    endpoint: ServiceEndpoint,
}

impl HttpGroundingClient {
    /// Wrap an endpoint.
    #[must_use]
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        Self { endpoint }
    }
}

impl GroundingService for HttpGroundingClient {
    fn ground(&self, request: GroundingRequest) -> ServiceFuture<'_, GroundingResponse> {
        Box::pin(async move { self.endpoint.post_json(&request).await })
    }
}

/// Generation pipeline reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    endpoint: ServiceEndpoint,
}

impl HttpGenerationClient {
    /// Wrap an endpoint.
    #[must_use]
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        Self { endpoint }
    }
}

impl GenerationService for HttpGenerationClient {
    fn generate(&self, request: GenerationRequest) -> ServiceFuture<'_, GenerationResponse> {
        Box::pin(async move { self.endpoint.post_json(&request).await })
    }
}

/// Draft persistence reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPersistenceClient {
    endpoint: ServiceEndpoint,
}

impl HttpPersistenceClient {
    /// Wrap an endpoint.
    #[must_use]
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        Self { endpoint }
    }
}

impl PersistenceService for HttpPersistenceClient {
    fn save_draft(&self, request: DraftRequest) -> ServiceFuture<'_, DraftResponse> {
        Box::pin(async move {
            self.endpoint
                .post_json(&request)
                .await
                .map_err(|err| AppError::Persistence(err.message().to_owned()))
        })
    }
}

/// All three HTTP clients built from configuration.
#[derive(Debug, Clone)]
pub struct HttpServices {
    /// Grounding client.
    pub grounding: HttpGroundingClient,
    /// Generation client.
    pub generation: HttpGenerationClient,
    /// Persistence client.
    pub persistence: HttpPersistenceClient,
}

impl HttpServices {
    /// Build clients for every configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &ServicesConfig) -> Result<Self> {
        let http = build_client()?;
        let endpoint = |name: &'static str, url: &str| {
            ServiceEndpoint::new(http.clone(), name, url.to_owned(), config.token.clone())
        };
        Ok(Self {
            grounding: HttpGroundingClient::new(endpoint("grounding", &config.grounding_url)),
            generation: HttpGenerationClient::new(endpoint("generation", &config.generation_url)),
            persistence: HttpPersistenceClient::new(endpoint(
                "persistence",
                &config.persistence_url,
            )),
        })
    }
}
