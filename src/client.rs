//! Thin HTTP client for the crime API.
//!
//! One attempt per call: transport failures surface as
//! [`ApiError::Network`], non-2xx statuses as [`ApiError::Http`]. Nothing
//! is retried here; the dashboard reports the failure and the user decides
//! whether to try again.

use std::time::Duration;

use reqwest::{multipart, Method, StatusCode, Url};
use serde::de::DeserializeOwned;

/// Maximum length of the response body kept in [`ApiError::Http`].
const BODY_PREVIEW_LEN: usize = 500;

/// Errors produced by [`ApiClient`] and the crime service built on it.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response was received (connection refused, DNS, timeout, ...).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status.
        status: StatusCode,
        /// Response body, truncated.
        body: String,
    },

    /// The response body was not the JSON we expected.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The requested neighborhood does not exist.
    #[error("bairro '{bairro}' not found")]
    NotFound {
        /// Name that was looked up.
        bairro: String,
    },

    /// The configured base URL cannot have path segments appended.
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// Returns the HTTP status when the server responded with one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short text suitable for showing to a user.
    ///
    /// Prefers the server's `mensagem` field when the error body is the
    /// backend's JSON error shape.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Could not reach the crime API. Try again in a moment.".to_string(),
            Self::Http { status, body } => {
                let server_message = serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|v| v.get("mensagem").and_then(|m| m.as_str()).map(String::from));
                match server_message {
                    Some(message) => format!("{message} (HTTP {})", status.as_u16()),
                    None => format!("The server answered HTTP {}.", status.as_u16()),
                }
            }
            Self::Decode(_) => "The server sent a response we could not read.".to_string(),
            Self::NotFound { bairro } => format!("Bairro '{bairro}' was not found."),
            Self::InvalidBaseUrl(url) => format!("Invalid API URL: {url}"),
        }
    }
}

/// HTTP client bound to a base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Builds a client for `base_url`. `timeout` is applied per request
    /// when given; otherwise the transport default is used.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
        })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ApiError::InvalidBaseUrl(self.base_url.to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// `GET` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.url(segments)?;
        self.send(self.http.request(Method::GET, url)).await
    }

    /// `DELETE` and decode the JSON body.
    pub async fn delete_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.url(segments)?;
        self.send(self.http.request(Method::DELETE, url)).await
    }

    /// `POST` a multipart form and decode the JSON body.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        form: multipart::Form,
    ) -> Result<T, ApiError> {
        let url = self.url(segments)?;
        self.send(self.http.request(Method::POST, url).multipart(form)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let request = request.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        log::debug!("{method} {url}");

        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("{method} {url} failed: {e}");
                return Err(ApiError::Network(e));
            }
        };

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            log::warn!("{method} {url}: reading body failed: {e}");
            ApiError::Network(e)
        })?;

        if !status.is_success() {
            let body = if text.len() > BODY_PREVIEW_LEN {
                let mut end = BODY_PREVIEW_LEN;
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...", &text[..end])
            } else {
                text
            };
            log::warn!("{method} {url} -> HTTP {status}");
            return Err(ApiError::Http { status, body });
        }

        log::debug!("{method} {url} -> HTTP {status}, {} bytes", text.len());
        serde_json::from_str(&text).map_err(|e| {
            log::warn!("{method} {url}: JSON decode failed: {e}");
            ApiError::Decode(e)
        })
    }
}
