use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::{
    config::WalletOpenId4VpConfig,
    core::{
        authorization_request::{validated::ValidatedRequest, AuthorizationRequestData},
        error::{AuthorizationError, ValidatedAuthorizationError},
        util::AsyncHttpClient,
    },
};

#[async_trait]
pub trait Wallet: Sync {
    type HttpClient: AsyncHttpClient + Send + Sync;

    fn config(&self) -> &WalletOpenId4VpConfig;
    fn http_client(&self) -> &Self::HttpClient;

    /// Parse a wallet invocation URL and validate the authorization request it carries.
    ///
    /// The URL must point at the configured authorization endpoint, if one is configured.
    async fn validate_request(&self, url: Url) -> Result<ValidatedRequest, AuthorizationError> {
        let data = match self.config().authorization_endpoint() {
            Some(endpoint) => AuthorizationRequestData::from_url(url, endpoint),
            None => AuthorizationRequestData::from_query_params(url.query().unwrap_or_default()),
        }
        .map_err(|e| {
            debug!("unable to parse authorization request: {e:#}");
            ValidatedAuthorizationError::InvalidAuthorizationData
        })?;

        data.into_raw_input()
            .validate(self.config(), self.http_client())
            .await
    }
}
