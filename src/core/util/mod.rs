use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use http::{header::ACCEPT, Request, Response};
use tracing::debug;
use url::Url;

use super::error::FetchError;

/// Generic HTTP client.
///
/// A trait is used here so to facilitate native HTTP/TLS when compiled for mobile applications.
#[async_trait]
pub trait AsyncHttpClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

pub(crate) fn base_request() -> http::request::Builder {
    Request::builder().method("GET")
}

#[derive(Debug)]
pub struct ReqwestClient(reqwest::Client);

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("unable to build http_client")
            .map(Self)
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let response = self
            .0
            .execute(request.try_into().context("unable to convert request")?)
            .await
            .context("http request failed")?;

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());

        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(response.headers().clone());

        builder
            .body(
                response
                    .bytes()
                    .await
                    .context("failed to extract response body")?
                    .to_vec(),
            )
            .context("unable to construct response")
    }
}

/// Media types accepted when dereferencing a `request_uri`.
pub(crate) const REQUEST_OBJECT_ACCEPT: &str =
    "application/oauth-authz-req+jwt, application/jwt, application/json";

/// Media types accepted when fetching a JWK Set.
pub(crate) const JWKS_ACCEPT: &str = "application/jwk-set+json, application/json";

/// Performs GET requests over an [AsyncHttpClient], bounding each one by a timeout.
pub struct Fetcher<'a, H: ?Sized> {
    http_client: &'a H,
    timeout: Duration,
}

impl<'a, H: AsyncHttpClient + ?Sized> Fetcher<'a, H> {
    pub fn new(http_client: &'a H, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }

    /// Fetch `url` and return the body as a string.
    pub async fn fetch_string(&self, url: &Url, accept: &str) -> Result<String, FetchError> {
        let request = base_request()
            .uri(url.as_str())
            .header(ACCEPT, accept)
            .body(vec![])
            .map_err(|e| FetchError::NetworkError(e.into()))?;

        let response = tokio::time::timeout(self.timeout, self.http_client.execute(request))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.clone(),
                after: self.timeout,
            })?
            .map_err(FetchError::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            debug!("GET {url} was unsuccessful (status: {status})");
            return Err(FetchError::InvalidStatusCode(status.as_u16()));
        }

        String::from_utf8(response.into_body()).map_err(|_| FetchError::InvalidResponse(url.clone()))
    }
}
