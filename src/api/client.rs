use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::request::{build_url, Auth, Method, RequestBody, RequestOptions};
use super::response::ResponseBody;
use crate::config::AppConfig;
use crate::error::{ApiError, HttpError, Result};
use crate::storage::{self, SessionStore};

pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Single chokepoint for every backend call: URL building, auth header,
/// per-call timeout, bounded retry on 429/503 and error normalization.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Arc<str>,
    store: Arc<dyn SessionStore>,
    default_timeout: Duration,
    default_retries: u32,
}

impl ApiClient {
    pub fn new(config: &AppConfig, store: Arc<dyn SessionStore>) -> Self {
        // No connect timeout here: the per-call timeout in `request` covers
        // connecting too, so a stalled connect still ends as a timeout.
        let http = Client::builder()
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            base_url: Arc::from(config.api_base_url.as_str()),
            store,
            default_timeout: config.request_timeout(),
            default_retries: config.default_retries,
        }
    }

    /// Client with stock defaults against `base_url`; handy for tools and tests.
    pub fn with_base_url(base_url: &str, store: Arc<dyn SessionStore>) -> Self {
        let config = AppConfig {
            api_base_url: base_url.to_string(),
            ..AppConfig::default()
        };
        Self::new(&config, store)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn url_for(&self, path: &str, options: &RequestOptions) -> String {
        build_url(&self.base_url, path, &options.query)
    }

    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<ResponseBody> {
        let url = Url::parse(&self.url_for(path, &options))?;
        let headers = self.build_headers(&options)?;
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let mut retries_left = options.retries.unwrap_or(self.default_retries);

        loop {
            debug!("{} {}", options.method.as_str(), url);
            let exchange = self.send_once(url.clone(), &options, headers.clone());
            let (status, response_headers, body) = match tokio::time::timeout(timeout, exchange).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!("{} {} timed out after {:?}", options.method.as_str(), url, timeout);
                    return Err(HttpError::timed_out(url.as_str()).into());
                }
            };

            if status.is_success() {
                return Ok(body);
            }

            if is_retryable(status) && retries_left > 0 {
                let delay = retry_after(&response_headers);
                warn!(
                    "{} {} returned {}, retrying in {:?} ({} left)",
                    options.method.as_str(),
                    url,
                    status.as_u16(),
                    delay,
                    retries_left
                );
                tokio::time::sleep(delay).await;
                retries_left -= 1;
                continue;
            }

            return Err(http_error(status, body, url.as_str()).into());
        }
    }

    /// `request` followed by a typed decode of the payload.
    pub async fn json<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T> {
        Ok(self.request(path, options).await?.decode()?)
    }

    pub async fn get(&self, path: &str) -> Result<ResponseBody> {
        self.request(path, RequestOptions::new()).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ResponseBody> {
        self.request(path, RequestOptions::new().method(Method::Post).json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ResponseBody> {
        self.request(path, RequestOptions::new().method(Method::Put).json(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<ResponseBody> {
        self.request(path, RequestOptions::new().method(Method::Patch).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ResponseBody> {
        self.request(path, RequestOptions::new().method(Method::Delete)).await
    }

    fn build_headers(&self, options: &RequestOptions) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let token = match &options.auth {
            Auth::Stored => storage::stored_token(self.store.as_ref()),
            Auth::Bearer(token) => Some(token.clone()),
            Auth::Anonymous => None,
        };
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidHeader("Authorization".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        for (name, value) in &options.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| ApiError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        if !headers.contains_key(CONTENT_TYPE) {
            match &options.body {
                Some(RequestBody::Json(_)) => {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Some(RequestBody::Text(_)) => {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_CONTENT_TYPE));
                }
                // Binary and multipart bodies keep the content type reqwest picks.
                Some(RequestBody::Bytes(_)) | Some(RequestBody::Form(_)) | None => {}
            }
        }

        Ok(headers)
    }

    async fn send_once(
        &self,
        url: Url,
        options: &RequestOptions,
        headers: HeaderMap,
    ) -> Result<(StatusCode, HeaderMap, ResponseBody)> {
        let mut builder = self.http.request(options.method.into(), url).headers(headers);
        builder = match &options.body {
            None => builder,
            Some(RequestBody::Json(value)) => builder.body(serde_json::to_vec(value)?),
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes.clone()),
            Some(RequestBody::Form(form)) => builder.multipart(form.to_multipart()?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = ResponseBody::read(response).await?;
        Ok((status, headers, body))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

/// Whole seconds from `Retry-After`. Missing, malformed and HTTP-date values fall back to one second.
pub(crate) fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

fn http_error(status: StatusCode, body: ResponseBody, url: &str) -> HttpError {
    let message = match body.message() {
        Some(message) => message.to_string(),
        None => format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        )
        .trim_end()
        .to_string(),
    };

    HttpError {
        status: status.as_u16(),
        message,
        body,
        url: url.to_string(),
    }
}
