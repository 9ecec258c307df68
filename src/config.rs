use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use ssi::{dids::DID, jwk::JWK};
use url::Url;

use crate::core::{
    authorization_request::parameters::ClientIdScheme, x509::X509Certificate,
};

const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "openid4vp://";
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(15);

/// Resolves the public key of a DID. Supplied by the host.
pub trait DidPublicKeyLookup: Send + Sync {
    fn lookup(&self, did: &DID) -> Option<JWK>;
}

impl<F> DidPublicKeyLookup for F
where
    F: Fn(&DID) -> Option<JWK> + Send + Sync,
{
    fn lookup(&self, did: &DID) -> Option<JWK> {
        self(did)
    }
}

/// Decides whether an `x5c` chain (leaf first) is trusted.
pub trait CertificateTrust: Send + Sync {
    fn is_trusted(&self, chain: &[X509Certificate]) -> bool;
}

impl<F> CertificateTrust for F
where
    F: Fn(&[X509Certificate]) -> bool + Send + Sync,
{
    fn is_trusted(&self, chain: &[X509Certificate]) -> bool {
        self(chain)
    }
}

/// Where the keys of a pre-registered client are found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JwkSetSource {
    ByValue(Vec<JWK>),
    ByReference(Url),
}

/// A verifier known to the wallet ahead of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreregisteredClient {
    pub client_id: String,
    pub legal_name: String,
    /// If set, request objects must be signed with exactly this algorithm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar_signing_alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwk_set_source: Option<JwkSetSource>,
}

impl PreregisteredClient {
    pub fn new(client_id: impl Into<String>, legal_name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            legal_name: legal_name.into(),
            jar_signing_alg: None,
            jwk_set_source: None,
        }
    }

    pub fn with_jar_signing_alg(mut self, alg: impl Into<String>) -> Self {
        self.jar_signing_alg = Some(alg.into());
        self
    }

    pub fn with_jwk_set_source(mut self, source: JwkSetSource) -> Self {
        self.jwk_set_source = Some(source);
        self
    }
}

/// A client identifier scheme the wallet accepts, with what it needs to authenticate clients.
#[derive(Clone)]
pub enum SupportedClientIdScheme {
    PreRegistered(HashMap<String, PreregisteredClient>),
    X509SanUri(Arc<dyn CertificateTrust>),
    X509SanDns(Arc<dyn CertificateTrust>),
    Did(Arc<dyn DidPublicKeyLookup>),
    VerifierAttestation {
        trust: Vec<JWK>,
        clock_skew: Duration,
    },
    RedirectUri,
}

impl SupportedClientIdScheme {
    /// Build the pre-registered allow-list, keyed by `client_id`.
    pub fn preregistered(clients: impl IntoIterator<Item = PreregisteredClient>) -> Self {
        Self::PreRegistered(
            clients
                .into_iter()
                .map(|c| (c.client_id.clone(), c))
                .collect(),
        )
    }

    pub fn scheme(&self) -> ClientIdScheme {
        match self {
            Self::PreRegistered(_) => ClientIdScheme::PreRegistered,
            Self::X509SanUri(_) => ClientIdScheme::X509SanUri,
            Self::X509SanDns(_) => ClientIdScheme::X509SanDns,
            Self::Did(_) => ClientIdScheme::Did,
            Self::VerifierAttestation { .. } => ClientIdScheme::VerifierAttestation,
            Self::RedirectUri => ClientIdScheme::RedirectUri,
        }
    }
}

impl fmt::Debug for SupportedClientIdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreRegistered(clients) => f
                .debug_tuple("PreRegistered")
                .field(&clients.keys().collect::<Vec<_>>())
                .finish(),
            Self::VerifierAttestation { trust, clock_skew } => f
                .debug_struct("VerifierAttestation")
                .field("trust", &trust.len())
                .field("clock_skew", clock_skew)
                .finish(),
            other => write!(f, "{}", other.scheme()),
        }
    }
}

/// Whether a request object whose signature cannot be verified is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignaturePolicy {
    #[default]
    Enforce,
    /// Downgrade signature failures to a warning. Only for interoperability testing.
    AllowUnverified,
}

/// Wallet-side configuration of the request validation pipeline.
///
/// Built once by the host and shared read-only between validations.
#[derive(Debug, Clone)]
pub struct WalletOpenId4VpConfig {
    supported_client_id_schemes: Vec<SupportedClientIdScheme>,
    signing_algorithms_supported: Vec<String>,
    signature_policy: SignaturePolicy,
    fetch_timeout: Duration,
    clock_skew: Duration,
    authorization_endpoint: Option<Url>,
}

impl Default for WalletOpenId4VpConfig {
    fn default() -> Self {
        Self {
            supported_client_id_schemes: vec![],
            signing_algorithms_supported: vec!["ES256".into()],
            signature_policy: SignaturePolicy::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            clock_skew: DEFAULT_CLOCK_SKEW,
            authorization_endpoint: Url::parse(DEFAULT_AUTHORIZATION_ENDPOINT).ok(),
        }
    }
}

impl WalletOpenId4VpConfig {
    pub fn new(supported_client_id_schemes: Vec<SupportedClientIdScheme>) -> Self {
        Self {
            supported_client_id_schemes,
            ..Default::default()
        }
    }

    pub fn with_scheme(mut self, scheme: SupportedClientIdScheme) -> Self {
        self.supported_client_id_schemes.push(scheme);
        self
    }

    pub fn with_signing_algorithms_supported(mut self, algs: Vec<String>) -> Self {
        self.signing_algorithms_supported = algs;
        self
    }

    pub fn with_signature_policy(mut self, policy: SignaturePolicy) -> Self {
        self.signature_policy = policy;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// `None` accepts invocation URLs of any authority and path.
    pub fn with_authorization_endpoint(mut self, endpoint: Option<Url>) -> Self {
        self.authorization_endpoint = endpoint;
        self
    }

    pub fn supported_client_id_schemes(&self) -> &[SupportedClientIdScheme] {
        &self.supported_client_id_schemes
    }

    pub fn signing_algorithms_supported(&self) -> &[String] {
        &self.signing_algorithms_supported
    }

    pub fn signature_policy(&self) -> SignaturePolicy {
        self.signature_policy
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    pub fn authorization_endpoint(&self) -> Option<&Url> {
        self.authorization_endpoint.as_ref()
    }

    /// The pre-registered entry for `client_id`, if that scheme is configured.
    pub fn preregistered_client(&self, client_id: &str) -> Option<&PreregisteredClient> {
        self.supported_client_id_schemes
            .iter()
            .find_map(|scheme| match scheme {
                SupportedClientIdScheme::PreRegistered(clients) => clients.get(client_id),
                _ => None,
            })
    }
}
