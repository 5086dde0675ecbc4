use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{self, Request, STATUS, endpoint_url};
use crate::types::RawStatus;
use crate::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Status line and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP capability the client needs. Implemented by [`HttpTransport`]
/// for real units and by in-memory doubles in tests.
pub trait Transport: Send + Sync + 'static {
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse>> + Send;

    fn post(&self, url: &str, body: &Value) -> impl Future<Output = Result<HttpResponse>> + Send;
}

pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse>> + Send {
        async move {
            let resp = self.http.get(url).send().await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            Ok(HttpResponse { status, body })
        }
    }

    fn post(&self, url: &str, body: &Value) -> impl Future<Output = Result<HttpResponse>> + Send {
        async move {
            let resp = self.http.post(url).json(body).send().await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            Ok(HttpResponse { status, body })
        }
    }
}

pub struct DeviceClientBuilder {
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl Default for DeviceClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceClientBuilder {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record every request and status body as NDJSON at `path`.
    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<DeviceClient<HttpTransport>> {
        let transport = HttpTransport::new(self.timeout)?;
        self.build_with(transport)
    }

    pub fn build_with<T: Transport>(self, transport: T) -> Result<DeviceClient<T>> {
        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        Ok(DeviceClient {
            transport,
            timeout: self.timeout,
            logger,
        })
    }
}

/// Stateless access to the unit's HTTP API. One instance can serve any number
/// of devices; every call carries the device's base URL.
pub struct DeviceClient<T: Transport = HttpTransport> {
    transport: T,
    timeout: Duration,
    logger: Option<Mutex<MessageLogger>>,
}

impl DeviceClient<HttpTransport> {
    pub fn builder() -> DeviceClientBuilder {
        DeviceClientBuilder::new()
    }
}

impl<T: Transport> DeviceClient<T> {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn fetch_status(&self, base: &str) -> Result<RawStatus> {
        let url = endpoint_url(base, STATUS);
        trace!(url = %url, "fetching status");
        if let Some(ref logger) = self.logger {
            logger.lock().log_request("GET", &url);
        }

        let resp = tokio::time::timeout(self.timeout, self.transport.get(&url))
            .await
            .map_err(|_| Error::Timeout)??;

        if let Some(ref logger) = self.logger {
            let body_json = serde_json::from_str(&resp.body).unwrap_or(Value::Null);
            logger.lock().log_poll(&url, resp.status, &body_json);
        }

        if !resp.is_success() {
            return Err(Error::Status(resp.status));
        }
        protocol::parse_status_response(&resp.body)
    }

    pub async fn send_command(&self, base: &str, request: &Request) -> Result<()> {
        let url = endpoint_url(base, &request.endpoint);
        debug!(url = %url, payload = %request.payload, "sending command");
        if let Some(ref logger) = self.logger {
            logger.lock().log_command(&url, &request.payload);
        }

        let resp = tokio::time::timeout(self.timeout, self.transport.post(&url, &request.payload))
            .await
            .map_err(|_| Error::Timeout)??;

        if !resp.is_success() {
            return Err(Error::Status(resp.status));
        }
        protocol::parse_command_response(&resp.body)
    }
}
