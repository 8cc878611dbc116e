//! Authenticated session used to talk to the server
//!
//! The lock subsystem only needs three things from an account: whether it is
//! usable right now, who it is, and a way to send a request with a custom
//! verb and get back a status code plus body. [`DavSession`] is that seam;
//! [`HttpSession`] implements it over reqwest.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use url::Url;

use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Header asking the server for a user-owned lock rather than a WebDAV one
pub const USER_LOCK_HEADER: &str = "X-User-Lock";

/// One outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavRequest {
    /// Custom verb, e.g. `LOCK`
    pub verb: String,
    /// Resource path relative to the user's DAV root, starting with `/`
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl DavRequest {
    pub fn new(verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            path: path.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Status code plus optional body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResponse {
    pub status: u16,
    pub body: Option<String>,
}

impl DavResponse {
    pub fn new(status: u16, body: Option<String>) -> Self {
        Self { status, body }
    }
}

/// Connected account able to issue DAV requests
#[async_trait]
pub trait DavSession: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Account user id, compared against lock owner ids
    fn user_id(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Send one request
    ///
    /// Any HTTP status is a response; `Err` means no response was received.
    async fn send(&self, request: DavRequest) -> Result<DavResponse>;
}

/// reqwest-backed session against a Nextcloud-style DAV endpoint
pub struct HttpSession {
    client: reqwest::Client,
    base: Url,
    user_id: String,
    display_name: String,
    password: Option<String>,
    connected: AtomicBool,
}

impl HttpSession {
    /// Build a session from server configuration
    pub fn new(server: &ServerConfig, password: Option<String>) -> Result<Self> {
        let url = server
            .url
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig("server.url is not set".to_string()))?;
        if server.user.trim().is_empty() {
            return Err(Error::InvalidConfig("server.user is not set".to_string()));
        }

        let mut base = Url::parse(url)?;
        {
            let mut segments = base.path_segments_mut().map_err(|_| {
                Error::InvalidConfig(format!("server.url cannot be a base: {}", url))
            })?;
            segments.pop_if_empty();
            for segment in server.dav_root.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
            segments.push(&server.user);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.request_timeout_secs))
            .build()?;

        let display_name = if server.display_name.trim().is_empty() {
            server.user.clone()
        } else {
            server.display_name.clone()
        };

        Ok(Self {
            client,
            base,
            user_id: server.user.clone(),
            display_name,
            password,
            connected: AtomicBool::new(true),
        })
    }

    /// Mark the account online or offline
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Absolute URL of a DAV resource path
    pub fn resource_url(&self, path: &str) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::InvalidArgument(format!("cannot address {}", path)))?;
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl DavSession for HttpSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn send(&self, request: DavRequest) -> Result<DavResponse> {
        let method = Method::from_bytes(request.verb.as_bytes())
            .map_err(|_| Error::InvalidArgument(format!("invalid verb {}", request.verb)))?;
        let url = self.resource_url(&request.path)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidArgument(format!("invalid header {}", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| Error::InvalidArgument(format!("invalid header value {}", value)))?;
            headers.insert(name, value);
        }

        tracing::debug!(verb = %request.verb, %url, "sending DAV request");

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(password) = &self.password {
            builder = builder.basic_auth(&self.user_id, Some(password));
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.is_empty() { None } else { Some(text) };

        tracing::debug!(status, has_body = body.is_some(), "DAV response received");

        Ok(DavResponse::new(status, body))
    }
}
