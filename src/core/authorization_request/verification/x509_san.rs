use tracing::debug;

use crate::{
    config::CertificateTrust,
    core::{
        authorization_request::{client::Client, parameters::ClientIdScheme},
        error::ValidatedAuthorizationError,
        jws::UnverifiedJws,
        x509::{parse_certificate_chain, SubjectAlternativeName},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum X509SanVariant {
    Uri,
    Dns,
}

impl X509SanVariant {
    fn scheme(self) -> &'static str {
        match self {
            X509SanVariant::Uri => ClientIdScheme::X509_SAN_URI,
            X509SanVariant::Dns => ClientIdScheme::X509_SAN_DNS,
        }
    }

    fn matches(self, san: &SubjectAlternativeName, client_id: &str) -> bool {
        match (self, san) {
            (X509SanVariant::Uri, SubjectAlternativeName::Uri(uri)) => uri == client_id,
            (X509SanVariant::Dns, SubjectAlternativeName::Dns(dns)) => dns == client_id,
            _ => false,
        }
    }
}

/// Bind `client_id` to the leaf certificate of the request object's `x5c` chain.
///
/// The leaf must carry a SAN of the right kind equal to `client_id` (with any `<scheme>:` prefix
/// removed), and the chain must be accepted by `trust`. The signature itself is checked later
/// against the leaf's public key.
pub fn resolve(
    variant: X509SanVariant,
    client_id: &str,
    jws: &UnverifiedJws,
    trust: &dyn CertificateTrust,
) -> Result<Client, ValidatedAuthorizationError> {
    let client_id_source = client_id
        .strip_prefix(&format!("{}:", variant.scheme()))
        .unwrap_or(client_id);

    let x5c = match jws.header().x5c.as_deref() {
        Some(x5c) if !x5c.is_empty() => x5c,
        Some(_) => return Err(ValidatedAuthorizationError::validation("'x5c' was an empty array")),
        None => {
            return Err(ValidatedAuthorizationError::validation(
                "'x5c' was missing from jwt headers",
            ))
        }
    };

    let chain = parse_certificate_chain(x5c).map_err(|e| {
        ValidatedAuthorizationError::validation(format!("invalid certificate chain: {e:#}"))
    })?;
    let Some(leaf) = chain.first() else {
        return Err(ValidatedAuthorizationError::validation("'x5c' was an empty array"));
    };

    debug!(
        "leaf certificate subject '{}', issuer '{}'",
        leaf.subject(),
        leaf.issuer()
    );

    if !leaf.subject_alternative_names().iter().any(|san| {
        debug!("comparing SAN {san:?} to client_id '{client_id_source}'");
        variant.matches(san, client_id_source)
    }) {
        return Err(ValidatedAuthorizationError::validation(match variant {
            X509SanVariant::Uri => "client_id does not match any URI Subject Alternative Name",
            X509SanVariant::Dns => "client_id does not match any DNS Subject Alternative Name",
        }));
    }

    if !trust.is_trusted(&chain) {
        return Err(ValidatedAuthorizationError::validation(
            "certificate chain is not trusted",
        ));
    }

    Ok(Client::X509SanUri {
        client_id: client_id.to_owned(),
        leaf_certificate: leaf.clone(),
    })
}
