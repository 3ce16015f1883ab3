use std::env;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result, Stage};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::types::{ChatRequest, ErrorResponse, ModelInfo, ModelList};

/// The OpenRouter API root.
pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/";
/// Environment variable consulted by [`EnvApiKey`].
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
/// How long to wait for response headers when no timeout is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const REFERER_HEADER: &str = "http-referer";
const TITLE_HEADER: &str = "x-title";

/// A response body as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

///////////////////////////////////////// Credentials /////////////////////////////////////////

/// Supplies the API key for each request.
///
/// The key is looked up right before a request is sent, so a provider may rotate it.  A
/// provider that returns `None` or a blank key fails the request with [`Error::Config`] before
/// anything touches the network.
pub trait ApiKeyProvider: Send + Sync {
    /// Returns the current API key, if one is available.
    fn api_key(&self) -> Option<String>;
}

impl ApiKeyProvider for String {
    fn api_key(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl ApiKeyProvider for &'static str {
    fn api_key(&self) -> Option<String> {
        Some((*self).to_string())
    }
}

impl<P: ApiKeyProvider + ?Sized> ApiKeyProvider for Arc<P> {
    fn api_key(&self) -> Option<String> {
        (**self).api_key()
    }
}

/// Reads the key from the `OPENROUTER_API_KEY` environment variable on every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvApiKey;

impl ApiKeyProvider for EnvApiKey {
    fn api_key(&self) -> Option<String> {
        env::var(API_KEY_ENV).ok()
    }
}

fn resolve_api_key(provider: &dyn ApiKeyProvider) -> Result<String> {
    match provider.api_key() {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::config(format!(
            "API key not provided; set the {API_KEY_ENV} environment variable"
        ))),
    }
}

///////////////////////////////////////// Attribution /////////////////////////////////////////

/// Application attribution sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    /// URL of the application, sent as `HTTP-Referer`.
    pub app_url: String,
    /// Name of the application, sent as `X-Title`.
    pub app_name: String,
}

impl Attribution {
    /// Create a new attribution.
    pub fn new(app_url: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
            app_name: app_name.into(),
        }
    }
}

///////////////////////////////////////// Transport /////////////////////////////////////////

/// A successful (2xx) response whose body has not been read yet.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// The body; dropping it releases the connection.
    pub body: ByteStream,
}

impl TransportResponse {
    /// Create a response from its parts.
    pub fn new(status: u16, headers: HeaderMap, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Buffer the whole body.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Sends chat requests to the completion endpoint.
///
/// Implementations perform exactly one request per call and never retry.  Non-2xx responses
/// must be turned into [`Error::Api`] carrying the body verbatim, so that callers never see
/// an error body as a [`TransportResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response once its headers have arrived.
    ///
    /// If `cancel` fires before then, the request is abandoned with
    /// [`Error::Abort`] at [`Stage::Request`].
    async fn send(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse>;
}

/// reqwest-based [`Transport`] for the OpenRouter API.
#[derive(Clone)]
pub struct HttpTransport {
    api_key: Arc<dyn ApiKeyProvider>,
    attribution: Attribution,
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a new transport against the default endpoint.
    pub fn new(api_key: impl ApiKeyProvider + 'static, attribution: Attribution) -> Result<Self> {
        Self::with_options(api_key, attribution, None, None)
    }

    /// Create a new transport with custom settings.
    pub fn with_options(
        api_key: impl ApiKeyProvider + 'static,
        attribution: Attribution,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url)?;

        // The timeout bounds the wait for response headers only; bodies stream for as long as
        // the server keeps sending.
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::transport(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key: Arc::new(api_key),
            attribution,
            client,
            base_url,
            timeout,
        })
    }

    /// The API root requests are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The attribution sent with every request.
    pub fn attribution(&self) -> &Attribution {
        &self.attribution
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Create the headers shared by every request.
    ///
    /// Fails with [`Error::Config`] when no usable key is available.
    pub fn default_headers(&self) -> Result<HeaderMap> {
        let api_key = resolve_api_key(self.api_key.as_ref())?;
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| Error::config("API key contains characters not allowed in a header"))?,
        );
        headers.insert(
            REFERER_HEADER,
            HeaderValue::from_str(&self.attribution.app_url)
                .map_err(|_| Error::config("app URL is not a valid header value"))?,
        );
        headers.insert(
            TITLE_HEADER,
            HeaderValue::from_str(&self.attribution.app_name)
                .map_err(|_| Error::config("app name is not a valid header value"))?,
        );
        Ok(headers)
    }

    fn timed_out(&self, detail: impl fmt::Display) -> Error {
        Error::timeout(
            format!("Request timed out: {detail}"),
            Some(self.timeout.as_secs_f64()),
        )
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            self.timed_out(e)
        } else if e.is_connect() {
            Error::transport(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::transport(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Convert a non-2xx response into [`Error::Api`], keeping the body verbatim.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::transport(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };
        let message = ErrorResponse::message_from_body(&body).unwrap_or_else(|| body.clone());
        Error::api(status_code, message, body)
    }

    async fn execute(
        &self,
        builder: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(Error::abort(
                "request cancelled before a response arrived",
                Stage::Request,
            )),
            sent = tokio::time::timeout(self.timeout, builder.send()) => match sent {
                Ok(sent) => sent.map_err(|e| self.map_send_error(e)),
                Err(_) => Err(self.timed_out("no response headers")),
            },
        };
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let response = outcome.inspect_err(|_| CLIENT_REQUEST_ERRORS.click())?;
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    /// Fetch the model catalog, sorted by id.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("models")?;
        let builder = self.client.get(url).headers(self.default_headers()?);
        let response = self.execute(builder, &CancellationToken::new()).await?;
        let body = response.bytes().await.map_err(|e| {
            Error::transport(format!("Failed to read model list: {e}"), Some(Box::new(e)))
        })?;
        let mut models = serde_json::from_slice::<ModelList>(&body)
            .map_err(|e| {
                Error::serialization(
                    format!("Failed to parse model list: {e}"),
                    Some(Box::new(e)),
                )
            })?
            .data;
        models.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(models)
    }

    /// Check that the endpoint is reachable and accepts the key.
    pub async fn check_connection(&self) -> Result<()> {
        let url = self.endpoint("models")?;
        let builder = self.client.get(url).headers(self.default_headers()?);
        self.execute(builder, &CancellationToken::new()).await?;
        Ok(())
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("attribution", &self.attribution)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse> {
        let url = self.endpoint("chat/completions")?;
        let mut headers = self.default_headers()?;
        if request.stream {
            headers.insert(
                header::ACCEPT,
                HeaderValue::from_static("text/event-stream"),
            );
        }
        let body = serde_json::to_vec(request)?;
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            stream = request.stream,
            bytes = body.len(),
            "sending chat request"
        );

        let builder = self.client.post(url).headers(headers).body(body);
        let response = self.execute(builder, cancel).await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                Error::decode(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        Ok(TransportResponse::new(status, headers, Box::pin(body)))
    }
}
