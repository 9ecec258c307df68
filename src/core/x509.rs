use anyhow::{Context, Result};
use base64::prelude::*;
use tracing::debug;
use x509_cert::{
    der::{referenced::OwnedToRef, Decode},
    ext::pkix::{name::GeneralName, SubjectAltName},
    spki::SubjectPublicKeyInfoRef,
    Certificate,
};

/// A certificate taken from an `x5c` header, with its DER encoding.
#[derive(Debug, Clone)]
pub struct X509Certificate {
    der: Vec<u8>,
    certificate: Certificate,
}

/// Subject Alternative Name entries relevant to client identification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectAlternativeName {
    Dns(String),
    Uri(String),
    Other,
}

impl X509Certificate {
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let certificate = Certificate::from_der(&der).context("certificate was not valid DER")?;
        Ok(Self { der, certificate })
    }

    /// Decode an `x5c` entry.
    pub fn from_base64(b64: &str) -> Result<Self> {
        let der = BASE64_STANDARD_NO_PAD
            .decode(b64.trim_end_matches('='))
            .context("certificate in 'x5c' was not valid base64")?;
        Self::from_der(der)
    }

    pub fn subject(&self) -> String {
        self.certificate.tbs_certificate.subject.to_string()
    }

    pub fn issuer(&self) -> String {
        self.certificate.tbs_certificate.issuer.to_string()
    }

    pub fn subject_public_key_info(&self) -> SubjectPublicKeyInfoRef<'_> {
        self.certificate
            .tbs_certificate
            .subject_public_key_info
            .owned_to_ref()
    }

    pub fn subject_alternative_names(&self) -> Vec<SubjectAlternativeName> {
        self.certificate
            .tbs_certificate
            .filter::<SubjectAltName>()
            .filter_map(|r| match r {
                Ok((_crit, san)) => Some(san.0.into_iter()),
                Err(e) => {
                    debug!("unable to parse SubjectAlternativeName from DER: {e}");
                    None
                }
            })
            .flatten()
            .map(|gn| match gn {
                GeneralName::DnsName(dns) => SubjectAlternativeName::Dns(dns.to_string()),
                GeneralName::UniformResourceIdentifier(uri) => {
                    SubjectAlternativeName::Uri(uri.to_string())
                }
                _ => SubjectAlternativeName::Other,
            })
            .collect()
    }
}

impl PartialEq for X509Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for X509Certificate {}

/// Decode every entry of an `x5c` chain, leaf first.
pub fn parse_certificate_chain<S: AsRef<str>>(x5c: &[S]) -> Result<Vec<X509Certificate>> {
    x5c.iter()
        .enumerate()
        .map(|(i, b64)| {
            X509Certificate::from_base64(b64.as_ref())
                .with_context(|| format!("'x5c' entry {i} could not be decoded"))
        })
        .collect()
}
