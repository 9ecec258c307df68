#![allow(dead_code)]

use std::{collections::HashMap, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use http::{Request, Response};
use p256::{
    ecdsa::{signature::Signer as _, Signature, SigningKey},
    pkcs8::EncodePublicKey,
};
use serde_json::{json, Value as Json};
use siop_openid4vp::core::util::AsyncHttpClient;
use ssi::jwk::{Algorithm, JWK};
use x509_cert::{
    certificate::{TbsCertificate, Version},
    der::{
        asn1::{BitString, Ia5String, ObjectIdentifier, OctetString},
        oid::AssociatedOid,
        Decode, Encode,
    },
    ext::{
        pkix::{name::GeneralName, SubjectAltName},
        Extension,
    },
    name::Name,
    serial_number::SerialNumber,
    spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
    time::Validity,
    Certificate,
};

pub const VERIFIER: &str = "https://verifier.example.org";
pub const ECDSA_WITH_SHA256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

/// Mints ES256 request objects and certificates for one P-256 key.
pub struct P256Signer {
    key: SigningKey,
    jwk: JWK,
}

impl P256Signer {
    pub fn new(seed: u8) -> Self {
        let key = SigningKey::from_slice(&[seed; 32]).unwrap();
        let pk: p256::PublicKey = key.verifying_key().into();
        let jwk = serde_json::from_str(&pk.to_jwk_string()).unwrap();
        Self { key, jwk }
    }

    pub fn jwk(&self) -> JWK {
        self.jwk.clone()
    }

    pub fn jwk_with_kid(&self, kid: &str) -> JWK {
        let mut jwk = self.jwk();
        jwk.key_id = Some(kid.to_owned());
        jwk
    }

    pub fn sign(&self, header: Json, claims: Json) -> String {
        let header_b64 = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
        let body_b64 = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let payload = [header_b64.as_bytes(), b".", body_b64.as_bytes()].concat();
        let signature: Signature = self.key.sign(&payload);
        let signature_b64 = BASE64_URL_SAFE_NO_PAD.encode(signature.to_bytes());
        format!("{header_b64}.{body_b64}.{signature_b64}")
    }

    /// A self-described certificate for this key, base64 encoded as in `x5c`.
    pub fn certificate(&self, subject: &str, san: GeneralName) -> String {
        let algorithm = AlgorithmIdentifierOwned {
            oid: ECDSA_WITH_SHA256,
            parameters: None,
        };
        let spki_der = self.key.verifying_key().to_public_key_der().unwrap();
        let san = SubjectAltName(vec![san]);

        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&[1]).unwrap(),
            signature: algorithm.clone(),
            issuer: Name::from_str("CN=Test CA").unwrap(),
            validity: Validity::from_now(Duration::from_secs(3600)).unwrap(),
            subject: Name::from_str(subject).unwrap(),
            subject_public_key_info: SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes())
                .unwrap(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(vec![Extension {
                extn_id: SubjectAltName::OID,
                critical: false,
                extn_value: OctetString::new(san.to_der().unwrap()).unwrap(),
            }]),
        };

        let certificate = Certificate {
            tbs_certificate,
            signature_algorithm: algorithm,
            signature: BitString::from_bytes(&[0; 64]).unwrap(),
        };

        BASE64_STANDARD.encode(certificate.to_der().unwrap())
    }
}

/// An Ed25519 key (RFC 8037, appendix A.1) identified by `kid`.
pub fn ed25519_jwk(kid: &str) -> JWK {
    let mut jwk: JWK = serde_json::from_value(json!({
        "kty": "OKP",
        "crv": "Ed25519",
        "d": "nWGxne_9WmC6hEr0kuwsxERJxWl7MmkZcDusAxyuf2A",
        "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"
    }))
    .unwrap();
    jwk.key_id = Some(kid.to_owned());
    jwk
}

/// EdDSA-signed request object, with `kid` taken from `jwk`.
pub fn sign_eddsa(jwk: &JWK, claims: &Json) -> String {
    ssi::claims::jwt::encode_sign(Algorithm::EdDSA, claims, jwk).unwrap()
}

pub fn uri_san(uri: &str) -> GeneralName {
    GeneralName::UniformResourceIdentifier(Ia5String::new(uri).unwrap())
}

pub fn dns_san(dns: &str) -> GeneralName {
    GeneralName::DnsName(Ia5String::new(dns).unwrap())
}

pub fn es256_header() -> Json {
    json!({ "alg": "ES256", "typ": "oauth-authz-req+jwt" })
}

/// Serves fixed responses by URL.
#[derive(Default)]
pub struct MockHttpClient {
    routes: HashMap<String, (u16, String)>,
    delay: Option<Duration>,
}

impl MockHttpClient {
    pub fn with_route(mut self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.routes.insert(url.to_owned(), (status, body.into()));
        self
    }

    /// Answer only after `delay`.
    pub fn slow(delay: Duration) -> Self {
        Self {
            routes: HashMap::new(),
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl AsyncHttpClient for MockHttpClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let url = request.uri().to_string();
        let (status, body) = self
            .routes
            .get(&url)
            .cloned()
            .unwrap_or((404, "not found".into()));
        Response::builder()
            .status(status)
            .body(body.into_bytes())
            .context("failed to build response")
    }
}
