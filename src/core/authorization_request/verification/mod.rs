use anyhow::{Context, Result};
use tracing::debug;
use url::Url;

use crate::{
    config::SupportedClientIdScheme,
    core::{error::ValidatedAuthorizationError, jws::UnverifiedJws},
};

use super::{client::Client, parameters::ClientIdScheme};

pub mod did;
pub mod signature;
pub mod verifier;
pub mod x509_san;

use x509_san::X509SanVariant;

/// Pick the configured scheme named by `hint`, falling back to the first configured scheme.
pub fn select_scheme<'a>(
    schemes: &'a [SupportedClientIdScheme],
    hint: Option<&ClientIdScheme>,
) -> Option<&'a SupportedClientIdScheme> {
    hint.and_then(|hint| schemes.iter().find(|s| s.scheme() == *hint))
        .or_else(|| schemes.first())
}

/// Resolve the [Client] behind `client_id` using one of the configured schemes.
///
/// Only the `did` scheme verifies the request signature at this point, every other scheme leaves
/// that to the [SignatureValidator](signature::SignatureValidator).
pub fn resolve_client(
    client_id: &str,
    jws: &UnverifiedJws,
    schemes: &[SupportedClientIdScheme],
    hint: Option<&ClientIdScheme>,
) -> Result<Client, ValidatedAuthorizationError> {
    let scheme = select_scheme(schemes, hint)
        .ok_or_else(|| ValidatedAuthorizationError::validation("no supported client id scheme"))?;

    debug!(
        "resolving client '{client_id}' with scheme '{}' (hint: {hint:?})",
        scheme.scheme()
    );

    match scheme {
        SupportedClientIdScheme::PreRegistered(clients) => clients
            .get(client_id)
            .map(|client| Client::PreRegistered {
                client_id: client_id.to_owned(),
                legal_name: client.legal_name.clone(),
            })
            .ok_or_else(|| {
                ValidatedAuthorizationError::validation(format!(
                    "'{client_id}' is not a pre-registered client"
                ))
            }),
        SupportedClientIdScheme::RedirectUri => Url::parse(client_id)
            .map(|client_id| Client::RedirectUri { client_id })
            .map_err(|_| {
                ValidatedAuthorizationError::validation(format!(
                    "client_id '{client_id}' is not an absolute URL"
                ))
            }),
        SupportedClientIdScheme::X509SanUri(trust) => {
            x509_san::resolve(X509SanVariant::Uri, client_id, jws, trust.as_ref())
        }
        SupportedClientIdScheme::X509SanDns(trust) => {
            x509_san::resolve(X509SanVariant::Dns, client_id, jws, trust.as_ref())
        }
        SupportedClientIdScheme::Did(lookup) => did::resolve(client_id, jws, lookup.as_ref()),
        SupportedClientIdScheme::VerifierAttestation { .. } => Err(
            ValidatedAuthorizationError::validation("verifier attestation not supported"),
        ),
    }
}

/// Check the signature of `jws` with `verifier`.
pub(crate) fn verify_jws<V: verifier::Verifier>(verifier: &V, jws: &UnverifiedJws) -> Result<()> {
    let signature = jws.signature()?;
    verifier
        .verify(jws.signing_input(), &signature)
        .context("request signature could not be verified")
}
