use std::fmt;

use crate::core::{
    error::ValidatedAuthorizationError,
    object::{field_name, ParsingErrorContext, TypedParameter, UntypedObject},
};
use crate::utils::NonEmptyVec;
use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;
use url::Url;

const DID: &str = "did";
const PREREGISTERED: &str = "pre-registered";
const REDIRECT_URI: &str = "redirect_uri";
const VERIFIER_ATTESTATION: &str = "verifier_attestation";
const X509_SAN_DNS: &str = "x509_san_dns";
const X509_SAN_URI: &str = "x509_san_uri";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ClientIdScheme {
    Did,
    PreRegistered,
    RedirectUri,
    VerifierAttestation,
    X509SanDns,
    X509SanUri,
    Other(String),
}

impl ClientIdScheme {
    pub const DID: &'static str = DID;
    pub const PREREGISTERED: &'static str = PREREGISTERED;
    pub const REDIRECT_URI: &'static str = REDIRECT_URI;
    pub const VERIFIER_ATTESTATION: &'static str = VERIFIER_ATTESTATION;
    pub const X509_SAN_DNS: &'static str = X509_SAN_DNS;
    pub const X509_SAN_URI: &'static str = X509_SAN_URI;

    pub fn as_str(&self) -> &str {
        match self {
            ClientIdScheme::Did => DID,
            ClientIdScheme::PreRegistered => PREREGISTERED,
            ClientIdScheme::RedirectUri => REDIRECT_URI,
            ClientIdScheme::VerifierAttestation => VERIFIER_ATTESTATION,
            ClientIdScheme::X509SanDns => X509_SAN_DNS,
            ClientIdScheme::X509SanUri => X509_SAN_URI,
            ClientIdScheme::Other(o) => o,
        }
    }
}

impl TypedParameter for ClientId {
    const KEY: &'static str = "client_id";
}

impl TryFrom<Json> for ClientId {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<ClientId> for Json {
    fn from(value: ClientId) -> Self {
        Json::String(value.0)
    }
}

impl TypedParameter for ClientIdScheme {
    const KEY: &'static str = "client_id_scheme";
}

impl From<String> for ClientIdScheme {
    fn from(s: String) -> Self {
        match s.as_str() {
            DID => ClientIdScheme::Did,
            PREREGISTERED => ClientIdScheme::PreRegistered,
            REDIRECT_URI => ClientIdScheme::RedirectUri,
            VERIFIER_ATTESTATION => ClientIdScheme::VerifierAttestation,
            X509_SAN_DNS => ClientIdScheme::X509SanDns,
            X509_SAN_URI => ClientIdScheme::X509SanUri,
            _ => ClientIdScheme::Other(s),
        }
    }
}

impl From<ClientIdScheme> for String {
    fn from(cis: ClientIdScheme) -> Self {
        match cis {
            ClientIdScheme::Other(o) => o,
            known => known.as_str().to_owned(),
        }
    }
}

impl TryFrom<Json> for ClientIdScheme {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
            .map(String::into)
            .map_err(Error::from)
    }
}

impl From<ClientIdScheme> for Json {
    fn from(value: ClientIdScheme) -> Self {
        Json::String(value.into())
    }
}

impl fmt::Display for ClientIdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// `client_metadata` field in the Authorization Request.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMetadata(pub UntypedObject);

impl TypedParameter for ClientMetadata {
    const KEY: &'static str = "client_metadata";
}

impl From<ClientMetadata> for Json {
    fn from(cm: ClientMetadata) -> Self {
        cm.0.into()
    }
}

impl TryFrom<Json> for ClientMetadata {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        UntypedObject::try_from(value).map(ClientMetadata)
    }
}

/// `client_metadata_uri` field in the Authorization Request.
#[derive(Debug, Clone)]
pub struct ClientMetadataUri(pub Url);

impl TypedParameter for ClientMetadataUri {
    const KEY: &'static str = "client_metadata_uri";
}

impl From<ClientMetadataUri> for Json {
    fn from(cmu: ClientMetadataUri) -> Self {
        cmu.0.to_string().into()
    }
}

impl TryFrom<Json> for ClientMetadataUri {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value).map(ClientMetadataUri)?)
    }
}

/// Where the verifier's metadata can be obtained from.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMetaDataSource {
    PassByValue(ClientMetadata),
    FetchByReference(Url),
}

impl ClientMetaDataSource {
    /// `client_metadata` takes precedence over `client_metadata_uri`; malformed values are ignored.
    pub fn from_object(object: &UntypedObject) -> Option<Self> {
        if let Some(metadata) = object.get_lenient::<ClientMetadata>() {
            return Some(Self::PassByValue(metadata));
        }
        object
            .get_lenient::<ClientMetadataUri>()
            .map(|ClientMetadataUri(uri)| Self::FetchByReference(uri))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nonce(pub String);

impl TypedParameter for Nonce {
    const KEY: &'static str = "nonce";
}

impl TryFrom<Json> for Nonce {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<Nonce> for Json {
    fn from(value: Nonce) -> Self {
        Json::String(value.0)
    }
}

/// `redirect_uri` field in the Authorization Request.
#[derive(Debug, Clone)]
pub struct RedirectUri(pub Url);

impl TypedParameter for RedirectUri {
    const KEY: &'static str = "redirect_uri";
}

impl From<RedirectUri> for Json {
    fn from(cmu: RedirectUri) -> Self {
        cmu.0.to_string().into()
    }
}

impl TryFrom<Json> for RedirectUri {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value).map(RedirectUri)?)
    }
}

/// `response_uri` field in the Authorization Request.
#[derive(Debug, Clone)]
pub struct ResponseUri(pub Url);

impl TypedParameter for ResponseUri {
    const KEY: &'static str = "response_uri";
}

impl From<ResponseUri> for Json {
    fn from(cmu: ResponseUri) -> Self {
        cmu.0.to_string().into()
    }
}

impl TryFrom<Json> for ResponseUri {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value).map(ResponseUri)?)
    }
}

const DIRECT_POST: &str = "direct_post";
const DIRECT_POST_JWT: &str = "direct_post.jwt";
const QUERY: &str = "query";
const FRAGMENT: &str = "fragment";
const NONE: &str = "none";

/// Raw `response_mode` value.
#[derive(Debug, Clone)]
pub struct ResponseModeName(pub String);

impl TypedParameter for ResponseModeName {
    const KEY: &'static str = "response_mode";
}

impl TryFrom<Json> for ResponseModeName {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<ResponseModeName> for Json {
    fn from(value: ResponseModeName) -> Self {
        Json::String(value.0)
    }
}

/// How, and where, the authorization response is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseMode {
    /// The `direct_post` response mode as defined in OID4VP.
    DirectPost(Url),
    /// The `direct_post.jwt` response mode as defined in OID4VP.
    DirectPostJwt(Url),
    Query(Url),
    Fragment(Url),
    None,
}

/// `value` as it appeared in the request, without JSON string quoting.
fn unquoted(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Array(items) => items.iter().map(unquoted).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}

impl ResponseMode {
    /// Classify `response_mode`, pairing it with `response_uri` or `redirect_uri`.
    ///
    /// An absent `response_mode` means `fragment`.
    pub fn classify(object: &UntypedObject) -> Result<Self, ValidatedAuthorizationError> {
        let name = match object.get::<ResponseModeName>() {
            None => return Ok(Self::Fragment(required_uri::<RedirectUri>(object)?.0)),
            Some(Ok(ResponseModeName(name))) => name,
            Some(Err(_)) => {
                return Err(ValidatedAuthorizationError::UnsupportedResponseMode(
                    object
                        .0
                        .get(ResponseModeName::KEY)
                        .map(unquoted)
                        .unwrap_or_default(),
                ))
            }
        };

        match name.as_str() {
            DIRECT_POST => Ok(Self::DirectPost(required_uri::<ResponseUri>(object)?.0)),
            DIRECT_POST_JWT => Ok(Self::DirectPostJwt(required_uri::<ResponseUri>(object)?.0)),
            QUERY => Ok(Self::Query(required_uri::<RedirectUri>(object)?.0)),
            FRAGMENT => Ok(Self::Fragment(required_uri::<RedirectUri>(object)?.0)),
            NONE => Ok(Self::None),
            _ => Err(ValidatedAuthorizationError::UnsupportedResponseMode(name)),
        }
    }

    pub fn uri(&self) -> Option<&Url> {
        match self {
            ResponseMode::DirectPost(uri)
            | ResponseMode::DirectPostJwt(uri)
            | ResponseMode::Query(uri)
            | ResponseMode::Fragment(uri) => Some(uri),
            ResponseMode::None => None,
        }
    }

    pub fn is_jarm(&self) -> bool {
        matches!(self, ResponseMode::DirectPostJwt(_))
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::DirectPost(_) => DIRECT_POST,
            ResponseMode::DirectPostJwt(_) => DIRECT_POST_JWT,
            ResponseMode::Query(_) => QUERY,
            ResponseMode::Fragment(_) => FRAGMENT,
            ResponseMode::None => NONE,
        }
        .fmt(f)
    }
}

/// A URI parameter the chosen response mode cannot do without; unparsable counts as missing.
fn required_uri<T: TypedParameter>(object: &UntypedObject) -> Result<T, ValidatedAuthorizationError> {
    object
        .get_lenient::<T>()
        .ok_or_else(|| ValidatedAuthorizationError::MissingRequiredField(field_name(T::KEY)))
}

const ID_TOKEN: &str = "id_token";
const VP_TOKEN: &str = "vp_token";
const VP_TOKEN_ID_TOKEN: &str = "vp_token id_token";
const CODE: &str = "code";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(into = "String", from = "String")]
pub enum ResponseType {
    IdToken,
    VpToken,
    VpAndIdToken,
    Code,
    Unsupported(String),
}

impl ResponseType {
    /// Classify `response_type`; unknown values are rejected here, `code` is left to the caller.
    pub fn classify(object: &UntypedObject) -> Result<Self, ValidatedAuthorizationError> {
        match object.get::<ResponseType>().parsing_error()? {
            ResponseType::Unsupported(s) => {
                Err(ValidatedAuthorizationError::UnsupportedResponseType(s))
            }
            rt => Ok(rt),
        }
    }
}

impl From<ResponseType> for String {
    fn from(rt: ResponseType) -> Self {
        match rt {
            ResponseType::IdToken => ID_TOKEN.into(),
            ResponseType::VpToken => VP_TOKEN.into(),
            ResponseType::VpAndIdToken => VP_TOKEN_ID_TOKEN.into(),
            ResponseType::Code => CODE.into(),
            ResponseType::Unsupported(s) => s,
        }
    }
}

impl From<String> for ResponseType {
    fn from(s: String) -> Self {
        let mut values: Vec<&str> = s.split_whitespace().collect();
        values.sort_unstable();
        match values.as_slice() {
            [ID_TOKEN] => ResponseType::IdToken,
            [VP_TOKEN] => ResponseType::VpToken,
            [ID_TOKEN, VP_TOKEN] => ResponseType::VpAndIdToken,
            [CODE] => ResponseType::Code,
            _ => ResponseType::Unsupported(s),
        }
    }
}

impl TypedParameter for ResponseType {
    const KEY: &'static str = "response_type";
}

impl TryFrom<Json> for ResponseType {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        let s: String = serde_json::from_value(value)?;
        Ok(s.into())
    }
}

impl From<ResponseType> for Json {
    fn from(rt: ResponseType) -> Self {
        Json::String(rt.into())
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        String::from(self.clone()).fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State(pub String);

impl TypedParameter for State {
    const KEY: &'static str = "state";
}

impl TryFrom<Json> for State {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<State> for Json {
    fn from(value: State) -> Self {
        Json::String(value.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope(pub String);

impl TypedParameter for Scope {
    const KEY: &'static str = "scope";
}

impl TryFrom<Json> for Scope {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<Scope> for Json {
    fn from(value: Scope) -> Self {
        Json::String(value.0)
    }
}

const SUBJECT_SIGNED_ID_TOKEN: &str = "subject_signed_id_token";
const ATTESTER_SIGNED_ID_TOKEN: &str = "attester_signed_id_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdTokenType {
    SubjectSigned,
    AttesterSigned,
}

impl fmt::Display for IdTokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdTokenType::SubjectSigned => SUBJECT_SIGNED_ID_TOKEN,
            IdTokenType::AttesterSigned => ATTESTER_SIGNED_ID_TOKEN,
        }
        .fmt(f)
    }
}

/// `id_token_type`: a space separated, non-empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTokenTypes(pub NonEmptyVec<IdTokenType>);

impl TypedParameter for IdTokenTypes {
    const KEY: &'static str = "id_token_type";
}

impl TryFrom<Json> for IdTokenTypes {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        let s: String = serde_json::from_value(value)?;
        let types = s
            .split_whitespace()
            .map(|t| match t {
                SUBJECT_SIGNED_ID_TOKEN => Ok(IdTokenType::SubjectSigned),
                ATTESTER_SIGNED_ID_TOKEN => Ok(IdTokenType::AttesterSigned),
                other => bail!("unknown id_token_type '{other}'"),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(types.try_into()?))
    }
}

impl From<IdTokenTypes> for Json {
    fn from(value: IdTokenTypes) -> Self {
        value
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
            .into()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentationDefinition(pub Json);

impl TypedParameter for PresentationDefinition {
    const KEY: &'static str = "presentation_definition";
}

impl TryFrom<Json> for PresentationDefinition {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        if !value.is_object() {
            bail!("presentation definition must be a JSON object")
        }
        Ok(Self(value))
    }
}

impl From<PresentationDefinition> for Json {
    fn from(value: PresentationDefinition) -> Self {
        value.0
    }
}

#[derive(Debug, Clone)]
pub struct PresentationDefinitionUri(pub Url);

impl TypedParameter for PresentationDefinitionUri {
    const KEY: &'static str = "presentation_definition_uri";
}

impl TryFrom<Json> for PresentationDefinitionUri {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value).map(Self)?)
    }
}

impl From<PresentationDefinitionUri> for Json {
    fn from(value: PresentationDefinitionUri) -> Self {
        value.0.to_string().into()
    }
}

/// Where the presentation definition can be obtained from.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationDefinitionSource {
    PassByValue(PresentationDefinition),
    FetchByReference(Url),
    /// Pre-agreed between wallet and verifier, keyed by `scope`.
    Implied(Scope),
}

impl PresentationDefinitionSource {
    pub fn from_object(object: &UntypedObject) -> Result<Self, ValidatedAuthorizationError> {
        match (
            object.get::<PresentationDefinition>(),
            object.get::<PresentationDefinitionUri>(),
        ) {
            (Some(_), Some(_)) => Err(ValidatedAuthorizationError::validation(
                "'presentation_definition' and 'presentation_definition_uri' are mutually exclusive",
            )),
            (Some(by_value), None) => Ok(Self::PassByValue(Some(by_value).parsing_error()?)),
            (None, Some(by_reference)) => {
                Ok(Self::FetchByReference(Some(by_reference).parsing_error()?.0))
            }
            (None, None) => match object.get_lenient::<Scope>() {
                Some(scope) if !scope.0.trim().is_empty() => {
                    debug!("presentation definition implied by scope '{}'", scope.0);
                    Ok(Self::Implied(scope))
                }
                _ => Err(ValidatedAuthorizationError::MissingRequiredField(
                    field_name(PresentationDefinition::KEY),
                )),
            },
        }
    }
}
