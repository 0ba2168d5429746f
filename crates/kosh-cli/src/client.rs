//! Shared HTTP client, error types, and request wiring for the CLI.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use kosh_api_models::ErrorBody;
use kosh_core::{ClientError, ClientResult, CoreError, ErrorCategory, Inventory, ResourceClient};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, Response, Url};
use serde_json::Value;
use tracing::debug;

use crate::cli::Cli;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const USER_AGENT_VALUE: &str = concat!("kosh/", env!("CARGO_PKG_VERSION"));

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    /// Classify a resource client failure outside the core engines.
    pub(crate) fn client(operation: &str, err: &ClientError) -> Self {
        let message = format!("{operation} failed: {}", describe_client(err));
        match err.status() {
            Some(400 | 404 | 409 | 422) => Self::validation(message),
            _ => Self::failure(anyhow!(message)),
        }
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = describe_core(&err);
        match err.category() {
            ErrorCategory::InvalidInput
            | ErrorCategory::NotFound
            | ErrorCategory::Ambiguous
            | ErrorCategory::Conflict => Self::Validation(message),
            ErrorCategory::PartialFailure | ErrorCategory::Remote => {
                Self::Failure(anyhow!(message))
            }
        }
    }
}

fn describe_core(err: &CoreError) -> String {
    match err {
        CoreError::InvalidInput {
            row: Some(row),
            field,
            reason,
        } => format!("invalid input in record {row}: {field} {reason}"),
        CoreError::InvalidInput {
            row: None,
            field,
            reason,
        } => format!("invalid {field}: {reason}"),
        CoreError::MalformedDocument { source } => {
            format!("input must be a JSON array of records: {source}")
        }
        CoreError::NotFound { kind, key } => format!("{kind} '{key}' not found"),
        CoreError::Ambiguous { kind, key, matches } => {
            format!("{kind} '{key}' is ambiguous ({matches} matches); supply more characters")
        }
        CoreError::Conflict { rack_id, existing } => format!(
            "rack {rack_id} already has {existing} layout slot(s); pass --overwrite to replace them"
        ),
        CoreError::PartialFailure {
            rack_id,
            progress,
            source,
        } => format!(
            "layout replacement for rack {rack_id} stopped after deleting {}/{} \
             and creating {}/{} slots: {}; \
             the rack is partially updated, re-run the import to repair it",
            progress.deleted,
            progress.deletions_planned,
            progress.created,
            progress.creations_planned,
            describe_client(source)
        ),
        CoreError::Remote { operation, source } => {
            format!("{operation} failed: {}", describe_client(source))
        }
    }
}

fn describe_client(err: &ClientError) -> String {
    match err {
        ClientError::Transport { path, source } => format!("request to {path} failed: {source}"),
        ClientError::Decode { path, source } => {
            format!("unexpected response from {path}: {source}")
        }
        ClientError::Encode { path, source } => {
            format!("could not encode request for {path}: {source}")
        }
        other => {
            let status = other.status().unwrap_or_default();
            match other.message() {
                Some(message) => format!("{} returned {status}: {message}", other.path()),
                None => format!("{} returned {status}", other.path()),
            }
        }
    }
}

/// Dependencies constructed from environment flags and CLI options.
#[derive(Clone)]
pub(crate) struct CliDependencies {
    pub(crate) client: Client,
}

impl CliDependencies {
    /// Construct a configured HTTP client carrying the per-invocation headers.
    pub(crate) fn from_env(cli: &Cli, request_id: &str) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(request_id).map_err(|_| {
            CliError::failure(anyhow!("request identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        if let Some(token) = cli.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| CliError::validation("token contains invalid characters"))?;
            bearer.set_sensitive(true);
            default_headers.insert(AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(cli.timeout))
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        Ok(Self { client })
    }
}

/// Application context passed to command handlers.
pub(crate) struct AppContext {
    pub(crate) resources: HttpResourceClient,
}

impl AppContext {
    pub(crate) const fn new(resources: HttpResourceClient) -> Self {
        Self { resources }
    }

    pub(crate) const fn inventory(&self) -> Inventory<'_, HttpResourceClient> {
        Inventory::new(&self.resources)
    }
}

/// [`ResourceClient`] over reqwest.
///
/// Request paths are appended to the base URL, so a base such as
/// `https://conch.example.com/api` keeps its path prefix.
pub(crate) struct HttpResourceClient {
    client: Client,
    base_url: Url,
}

impl HttpResourceClient {
    pub(crate) const fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        let joined = format!("{}{path}", self.base_url.as_str().trim_end_matches('/'));
        Url::parse(&joined).map_err(|err| ClientError::Transport {
            path: path.to_string(),
            source: Box::new(err),
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ClientResult<Response> {
        let url = self.url(path)?;
        debug!(%method, path, "sending request");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|err| ClientError::Transport {
            path: path.to_string(),
            source: Box::new(err),
        })?;
        let status = response.status();
        debug!(path, status = status.as_u16(), "received response");
        if status.is_success() {
            Ok(response)
        } else {
            Err(classify_response(path, response).await)
        }
    }

    async fn body(path: &str, response: Response) -> ClientResult<Vec<u8>> {
        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|err| ClientError::Transport {
                path: path.to_string(),
                source: Box::new(err),
            })
    }
}

/// Classify a non-2xx response, preferring the service's `{"error": ...}`
/// document for the message.
pub(crate) async fn classify_response(path: &str, response: Response) -> ClientError {
    let status = response.status().as_u16();
    let bytes = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ErrorBody>(&bytes)
        .map(|body| body.error)
        .ok()
        .or_else(|| {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            (!text.is_empty()).then_some(text)
        });
    ClientError::from_status(path, status, message)
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn get(&self, path: &str) -> ClientResult<Vec<u8>> {
        let response = self.send(Method::GET, path, None).await?;
        Self::body(path, response).await
    }

    async fn post(&self, path: &str, body: &Value) -> ClientResult<Vec<u8>> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        Self::body(path, response).await
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        self.send(Method::DELETE, path, None).await.map(|_| ())
    }
}

/// Parse the service URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use kosh_core::{EntityKind, ReplaceProgress};
    use serde_json::json;
    use uuid::Uuid;

    fn resources(server: &MockServer, base_path: &str) -> Result<HttpResourceClient> {
        let base = format!("{}{base_path}", server.base_url()).parse()?;
        Ok(HttpResourceClient::new(Client::new(), base))
    }

    #[tokio::test]
    async fn get_preserves_base_path() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/rack");
            then.status(200).json_body(json!([]));
        });

        let client = resources(&server, "/api/")?;
        let body = client.get("/rack").await?;
        assert_eq!(body, b"[]");
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn error_documents_become_classified_errors() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/rack/missing");
            then.status(404).json_body(json!({"error": "rack not found"}));
        });
        server.mock(|when, then| {
            when.method(POST).path("/layout");
            then.status(409).body("slot taken");
        });
        server.mock(|when, then| {
            when.method(DELETE).path("/layout/x");
            then.status(500);
        });

        let client = resources(&server, "")?;
        match client.get("/rack/missing").await {
            Err(ClientError::NotFound { message, .. }) => {
                assert_eq!(message.as_deref(), Some("rack not found"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        match client.post("/layout", &json!({})).await {
            Err(ClientError::Conflict { message, .. }) => {
                assert_eq!(message.as_deref(), Some("slot taken"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let err = client.delete("/layout/x").await.expect_err("server error");
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.message(), None);
        Ok(())
    }

    #[tokio::test]
    async fn transport_failures_are_reported_as_such() -> Result<()> {
        let client = HttpResourceClient::new(Client::new(), "http://127.0.0.1:9".parse()?);
        let err = client.get("/rack").await.expect_err("nothing listening");
        assert!(matches!(err, ClientError::Transport { .. }));
        Ok(())
    }

    #[test]
    fn core_errors_map_to_exit_codes() {
        let invalid: CliError = CoreError::InvalidInput {
            row: Some(3),
            field: "ru_start",
            reason: "must be at least 1",
        }
        .into();
        assert_eq!(invalid.exit_code(), 2);
        assert_eq!(
            invalid.display_message(),
            "invalid input in record 3: ru_start must be at least 1"
        );

        let ambiguous: CliError = CoreError::Ambiguous {
            kind: EntityKind::Rack,
            key: "ab".into(),
            matches: 2,
        }
        .into();
        assert_eq!(ambiguous.exit_code(), 2);
        assert!(ambiguous.display_message().contains("2 matches"));

        let partial: CliError = CoreError::PartialFailure {
            rack_id: Uuid::nil(),
            progress: ReplaceProgress {
                deletions_planned: 2,
                deleted: 2,
                creations_planned: 3,
                created: 1,
            },
            source: ClientError::from_status("/layout", 500, None),
        }
        .into();
        assert_eq!(partial.exit_code(), 3);
        let message = partial.display_message();
        assert!(message.contains("deleting 2/2"));
        assert!(message.contains("creating 1/3"));
        assert!(message.contains("/layout returned 500"));
    }

    #[test]
    fn client_errors_split_on_status_class() {
        let missing = ClientError::from_status("/d", 404, None);
        let missing = CliError::client("fetch device settings", &missing);
        assert_eq!(missing.exit_code(), 2);
        let broken = ClientError::from_status("/d", 502, None);
        let broken = CliError::client("fetch device settings", &broken);
        assert_eq!(broken.exit_code(), 3);
    }

    #[test]
    fn parse_url_rejects_garbage() {
        assert!(parse_url("http://localhost:5000").is_ok());
        assert!(parse_url("not a url").is_err());
    }
}
