use ssi::dids::DIDBuf;
use url::Url;

use crate::core::x509::X509Certificate;

/// The verifier an authorization request was resolved to.
///
/// Lives for a single validation call.
#[derive(Debug, Clone, PartialEq)]
pub enum Client {
    /// Found in the wallet's allow-list, or assumed for unsigned bare-parameter requests.
    PreRegistered {
        client_id: String,
        legal_name: String,
    },
    RedirectUri {
        client_id: Url,
    },
    /// Bound to the leaf of the request object's `x5c` chain. Used for both SAN schemes.
    X509SanUri {
        client_id: String,
        leaf_certificate: X509Certificate,
    },
    DidClient {
        did: DIDBuf,
    },
}

impl Client {
    pub fn id(&self) -> &str {
        match self {
            Client::PreRegistered { client_id, .. } | Client::X509SanUri { client_id, .. } => {
                client_id
            }
            Client::RedirectUri { client_id } => client_id.as_str(),
            Client::DidClient { did } => did.as_str(),
        }
    }

    /// Whether the identity was proven with key material.
    ///
    /// Pre-registered and redirect_uri clients are a weaker trust tier.
    pub fn has_cryptographic_binding(&self) -> bool {
        match self {
            Client::PreRegistered { .. } | Client::RedirectUri { .. } => false,
            Client::X509SanUri { .. } | Client::DidClient { .. } => true,
        }
    }
}
