use ssi::dids::{DIDBuf, DIDURL};
use tracing::debug;

use crate::{
    config::DidPublicKeyLookup,
    core::{
        authorization_request::client::Client, error::ValidatedAuthorizationError,
        jws::UnverifiedJws,
    },
};

/// Whether `kid` names `client_id` itself or something inside its DID document.
fn kid_is_bound_to(kid: &str, client_id: &str) -> bool {
    match kid.strip_prefix(client_id) {
        Some(rest) => rest.is_empty() || rest.starts_with(['#', '/', '?', ';']),
        None => false,
    }
}

/// Resolve a client using `client_id_scheme` `did`.
///
/// Unlike the other schemes, the request signature is verified here, against the key returned by
/// `lookup`.
pub fn resolve(
    client_id: &str,
    jws: &UnverifiedJws,
    lookup: &dyn DidPublicKeyLookup,
) -> Result<Client, ValidatedAuthorizationError> {
    let kid = jws.header().kid.as_deref().ok_or_else(|| {
        ValidatedAuthorizationError::validation("'kid' was missing from jwt headers")
    })?;

    let kid = DIDURL::new(kid).map_err(|_| {
        ValidatedAuthorizationError::validation(format!(
            "expected a DID URL in 'kid' header, received '{kid}'"
        ))
    })?;

    if !kid_is_bound_to(kid.as_str(), client_id) {
        return Err(ValidatedAuthorizationError::validation(format!(
            "'kid' ({}) does not belong to 'client_id' ({client_id})",
            kid.as_str()
        )));
    }

    let did = DIDBuf::from_string(client_id.to_owned())
        .map_err(|_| ValidatedAuthorizationError::validation("invalid DID"))?;

    let jwk = lookup.lookup(&did).ok_or_else(|| {
        ValidatedAuthorizationError::validation(format!(
            "no public key found for '{}'",
            did.as_str()
        ))
    })?;

    jws.verify_with_jwk(&jwk)
        .map_err(|e| ValidatedAuthorizationError::validation(format!("{e:#}")))?;

    debug!("request object verified with key of '{}'", did.as_str());

    Ok(Client::DidClient { did })
}
