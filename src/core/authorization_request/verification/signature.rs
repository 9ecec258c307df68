use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use ssi::jwk::JWK;
use tracing::{debug, warn};

use crate::{
    config::{JwkSetSource, PreregisteredClient, SignaturePolicy, WalletOpenId4VpConfig},
    core::{
        authorization_request::{client::Client, parameters::ClientId},
        error::{AuthorizationError, ValidatedAuthorizationError},
        jws::UnverifiedJws,
        util::{AsyncHttpClient, Fetcher, JWKS_ACCEPT},
    },
};

use super::{
    verifier::{P256Verifier, Verifier},
    verify_jws,
};

#[derive(Deserialize)]
struct JwkSet {
    keys: Vec<JWK>,
}

/// Fail with [ClientIdMismatch](ValidatedAuthorizationError::ClientIdMismatch) when the caller
/// expected a different client.
pub(crate) fn ensure_client_id(
    expected: Option<&str>,
    actual: &str,
) -> Result<(), ValidatedAuthorizationError> {
    match expected {
        Some(expected) if expected != actual => {
            Err(ValidatedAuthorizationError::ClientIdMismatch {
                expected: expected.to_owned(),
                actual: actual.to_owned(),
            })
        }
        _ => Ok(()),
    }
}

/// Checks a request object against the key material of its resolved [Client].
pub struct SignatureValidator<'a, H: ?Sized> {
    config: &'a WalletOpenId4VpConfig,
    fetcher: Fetcher<'a, H>,
}

/// Why a signature check did not pass.
enum Failure {
    /// Fetching key material failed.
    Fetch(AuthorizationError),
    Invalid(anyhow::Error),
}

impl From<anyhow::Error> for Failure {
    fn from(e: anyhow::Error) -> Self {
        Failure::Invalid(e)
    }
}

impl<'a, H: AsyncHttpClient + Send + Sync + ?Sized> SignatureValidator<'a, H> {
    pub fn new(config: &'a WalletOpenId4VpConfig, http_client: &'a H) -> Self {
        Self {
            config,
            fetcher: Fetcher::new(http_client, config.fetch_timeout()),
        }
    }

    /// Validate `jws` for `client`.
    ///
    /// A client_id mismatch is always fatal. Other failures are fatal unless the configured
    /// [SignaturePolicy] is [AllowUnverified](SignaturePolicy::AllowUnverified).
    pub async fn validate(
        &self,
        jws: &UnverifiedJws,
        client: &Client,
        expected_client_id: Option<&str>,
    ) -> Result<(), AuthorizationError> {
        let claimed = jws.claims().get_lenient::<ClientId>();
        ensure_client_id(
            expected_client_id,
            claimed.as_ref().map_or(client.id(), |c| c.0.as_str()),
        )?;

        let failure = match self.check(jws, client).await {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };

        match (self.config.signature_policy(), failure) {
            (SignaturePolicy::Enforce, Failure::Fetch(e)) => Err(e),
            (SignaturePolicy::Enforce, Failure::Invalid(e)) => {
                debug!("request object rejected: {e:#}");
                Err(ValidatedAuthorizationError::validation(format!("{e:#}")).into())
            }
            (SignaturePolicy::AllowUnverified, Failure::Fetch(e)) => {
                warn!(
                    "accepting request object of '{}' without a verified signature: {e}",
                    client.id()
                );
                Ok(())
            }
            (SignaturePolicy::AllowUnverified, Failure::Invalid(e)) => {
                warn!(
                    "accepting request object of '{}' without a verified signature: {e:#}",
                    client.id()
                );
                Ok(())
            }
        }
    }

    async fn check(&self, jws: &UnverifiedJws, client: &Client) -> Result<(), Failure> {
        let alg = jws.header().alg.as_str();

        if let Client::RedirectUri { .. } = client {
            debug!("redirect_uri client carries no key material, request object not verified");
            return Ok(());
        }

        if alg == "none" {
            return Err(anyhow!("request object of '{}' is not signed", client.id()).into());
        }

        if !self
            .config
            .signing_algorithms_supported()
            .iter()
            .any(|supported| supported == alg)
        {
            return Err(anyhow!("request was signed with unsupported algorithm: {alg}").into());
        }

        self.check_temporal_claims(jws)?;

        match client {
            Client::X509SanUri {
                leaf_certificate, ..
            } => {
                let verifier =
                    P256Verifier::from_spki(leaf_certificate.subject_public_key_info(), alg)
                        .context("unable to parse SPKI")?;
                Ok(verify_jws(&verifier, jws)?)
            }
            Client::DidClient { did } => {
                debug!("request object already verified with key of '{}'", did.as_str());
                Ok(())
            }
            Client::PreRegistered { client_id, .. } => {
                let registration = self
                    .config
                    .preregistered_client(client_id)
                    .with_context(|| format!("'{client_id}' is not a pre-registered client"))?;
                self.check_preregistered(jws, registration).await
            }
            Client::RedirectUri { .. } => Ok(()),
        }
    }

    fn check_temporal_claims(&self, jws: &UnverifiedJws) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock is before the unix epoch")?
            .as_secs_f64();
        let skew = self.config.clock_skew().as_secs_f64();

        if let Some(exp) = jws.numeric_date("exp")? {
            if now - skew >= exp {
                bail!("request object expired at {exp}")
            }
        }
        if let Some(nbf) = jws.numeric_date("nbf")? {
            if now + skew < nbf {
                bail!("request object is not valid before {nbf}")
            }
        }
        if let Some(iat) = jws.numeric_date("iat")? {
            if now + skew < iat {
                bail!("request object was issued in the future ({iat})")
            }
        }
        Ok(())
    }

    async fn check_preregistered(
        &self,
        jws: &UnverifiedJws,
        registration: &PreregisteredClient,
    ) -> Result<(), Failure> {
        let alg = jws.header().alg.as_str();
        if let Some(expected) = &registration.jar_signing_alg {
            if expected != alg {
                return Err(anyhow!(
                    "'{}' signs request objects with '{expected}', received '{alg}'",
                    registration.client_id
                )
                .into());
            }
        }

        let keys = match &registration.jwk_set_source {
            None => {
                return Err(anyhow!(
                    "no key material registered for '{}'",
                    registration.client_id
                )
                .into())
            }
            Some(JwkSetSource::ByValue(keys)) => keys.clone(),
            Some(JwkSetSource::ByReference(url)) => {
                let body = self
                    .fetcher
                    .fetch_string(url, JWKS_ACCEPT)
                    .await
                    .map_err(|e| Failure::Fetch(e.into()))?;
                serde_json::from_str::<JwkSet>(&body)
                    .with_context(|| format!("{url} did not return a JWK Set"))?
                    .keys
            }
        };

        let kid = jws.header().kid.as_deref();
        let candidates: Vec<&JWK> = keys
            .iter()
            .filter(|key| match (kid, key.key_id.as_deref()) {
                (Some(kid), Some(key_id)) => kid == key_id,
                _ => true,
            })
            .collect();
        if candidates.is_empty() {
            return Err(anyhow!(
                "no key of '{}' matches kid {kid:?}",
                registration.client_id
            )
            .into());
        }

        for key in candidates {
            match jws.verify_with_jwk(key) {
                Ok(()) => return Ok(()),
                Err(e) => debug!("key {:?} rejected request object: {e:#}", key.key_id),
            }
        }

        Err(anyhow!(
            "request signature could not be verified with any key of '{}'",
            registration.client_id
        )
        .into())
    }
}
