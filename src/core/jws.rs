//! Decoding of compact JWS request objects without prior verification.
//!
//! The signature is checked later, against key material chosen by the client identifier scheme.

use anyhow::{Context, Result};
use base64::prelude::*;
use serde::Deserialize;
use serde_json::Value as Json;
use ssi::{claims::jws::split_jws, jwk::JWK};

use super::object::UntypedObject;

/// Protected header fields of a request object.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct JwsHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
    /// Certificate chain, leaf first, each entry base64 (not base64url) DER.
    #[serde(default)]
    pub x5c: Option<Vec<String>>,
}

/// A compact JWS whose header and claims have been decoded but not yet verified.
#[derive(Debug, Clone)]
pub struct UnverifiedJws {
    compact: String,
    header: JwsHeader,
    claims: UntypedObject,
}

/// Whether `s` is shaped like a compact JWS: three base64url segments, the first two non-empty.
pub fn is_compact_jws(s: &str) -> bool {
    let is_b64url = |segment: &str| {
        segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    };
    match split_jws(s) {
        Ok((h, p, sig)) => {
            !h.is_empty() && !p.is_empty() && [h, p, sig].into_iter().all(is_b64url)
        }
        Err(_) => false,
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>> {
    Ok(BASE64_URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))?)
}

impl UnverifiedJws {
    pub fn decode(jws: &str) -> Result<Self> {
        let (header_b64, _, _) = split_jws(jws)?;

        let header_bytes =
            decode_segment(header_b64).context("jwt headers were not valid base64url")?;
        let header: JwsHeader =
            serde_json::from_slice(&header_bytes).context("jwt headers were not valid json")?;

        let claims = ssi::claims::jwt::decode_unverified::<UntypedObject>(jws)
            .context("jwt payload was not a json object")?;

        Ok(Self {
            compact: jws.to_owned(),
            header,
            claims,
        })
    }

    pub fn header(&self) -> &JwsHeader {
        &self.header
    }

    pub fn claims(&self) -> &UntypedObject {
        &self.claims
    }

    pub fn as_str(&self) -> &str {
        &self.compact
    }

    /// The bytes covered by the signature: `header.payload`.
    pub fn signing_input(&self) -> &[u8] {
        let end = self.compact.rfind('.').unwrap_or(self.compact.len());
        self.compact[..end].as_bytes()
    }

    pub fn signature(&self) -> Result<Vec<u8>> {
        let (_, _, signature) = split_jws(&self.compact)?;
        decode_segment(signature).context("could not decode base64url encoded jwt signature")
    }

    /// A NumericDate claim such as `exp`, in seconds since the epoch. Fractional values are kept.
    pub fn numeric_date(&self, key: &str) -> Result<Option<f64>> {
        match self.claims.0.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .with_context(|| format!("'{key}' claim is not a NumericDate: {value}")),
        }
    }

    /// Verify the signature with `jwk`, using the algorithm named by the `alg` header.
    pub fn verify_with_jwk(&self, jwk: &JWK) -> Result<()> {
        let _: Json = ssi::claims::jwt::decode_verify(&self.compact, jwk)
            .context("request signature could not be verified")?;
        Ok(())
    }
}
