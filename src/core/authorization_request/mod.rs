use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::debug;
use url::Url;

use crate::config::WalletOpenId4VpConfig;

use self::{
    client::Client,
    parameters::{ClientId, ClientIdScheme, Nonce, ResponseType},
    validated::{assemble, Common, ValidatedRequest},
    verification::{
        resolve_client,
        signature::{ensure_client_id, SignatureValidator},
    },
};

use super::{
    error::{AuthorizationError, ValidatedAuthorizationError},
    jws::{is_compact_jws, UnverifiedJws},
    object::{ParsingErrorContext, UntypedObject},
    util::{AsyncHttpClient, Fetcher, REQUEST_OBJECT_ACCEPT},
};

pub mod client;
pub mod parameters;
pub mod validated;
pub mod verification;

/// An unprocessed authorization request, as found in the query of a wallet invocation URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequestData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id_scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_type: Option<String>,
    /// JSON encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_metadata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_metadata_uri: Option<String>,
    /// JSON encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_definition_uri: Option<String>,
}

impl AuthorizationRequestData {
    /// Parse from urlencoded query parameters.
    /// ```
    /// # use siop_openid4vp::core::authorization_request::AuthorizationRequestData;
    /// let query = "client_id=xyz&request=test";
    ///
    /// let data = AuthorizationRequestData::from_query_params(query).unwrap();
    ///
    /// assert_eq!(data.client_id.as_deref(), Some("xyz"));
    /// assert_eq!(data.request.as_deref(), Some("test"));
    /// ```
    pub fn from_query_params(query_params: &str) -> Result<Self> {
        serde_urlencoded::from_str(query_params)
            .context("unable to parse Authorization Request from query params")
    }

    /// Parse from [Url], validating the authorization_endpoint.
    pub fn from_url(url: Url, authorization_endpoint: &Url) -> Result<Self> {
        let query = url
            .query()
            .ok_or(anyhow!("missing query params in Authorization Request uri"))?
            .to_string();
        let fnd = url.authority();
        let exp = authorization_endpoint.authority();
        if fnd != exp {
            bail!("unexpected authorization_endpoint authority, expected '{exp}', received '{fnd}'")
        }
        let fnd = url.path();
        let exp = authorization_endpoint.path();
        if fnd != exp {
            bail!("unexpected authorization_endpoint path, expected '{exp}', received '{fnd}'")
        }
        Self::from_query_params(&query)
    }

    /// Decide how the request is delivered: `request` wins over `request_uri`, which wins over bare
    /// parameters.
    pub fn into_raw_input(mut self) -> RawRequestInput {
        if let Some(jwt) = self.request.take() {
            return RawRequestInput::ByValue {
                jwt,
                client_id: self.client_id,
            };
        }
        if let Some(request_uri) = self.request_uri.take() {
            return RawRequestInput::ByReference {
                request_uri,
                client_id: self.client_id,
            };
        }
        RawRequestInput::ByParameters(Box::new(self))
    }

    fn into_object(self) -> UntypedObject {
        let Self {
            request: _,
            request_uri: _,
            client_id,
            client_id_scheme,
            response_type,
            response_mode,
            response_uri,
            redirect_uri,
            nonce,
            state,
            scope,
            id_token_type,
            client_metadata,
            client_metadata_uri,
            presentation_definition,
            presentation_definition_uri,
        } = self;

        let mut object = Map::new();
        let mut put = |key: &str, value: Option<Json>| {
            if let Some(value) = value {
                object.insert(key.to_owned(), value);
            }
        };

        put("client_id", client_id.map(Json::String));
        put("client_id_scheme", client_id_scheme.map(Json::String));
        put("response_type", response_type.map(Json::String));
        put("response_mode", response_mode.map(Json::String));
        put("response_uri", response_uri.map(Json::String));
        put("redirect_uri", redirect_uri.map(Json::String));
        put("nonce", nonce.map(Json::String));
        put("state", state.map(Json::String));
        put("scope", scope.map(Json::String));
        put("id_token_type", id_token_type.map(Json::String));
        put("client_metadata", client_metadata.map(decode_json_parameter));
        put("client_metadata_uri", client_metadata_uri.map(Json::String));
        put(
            "presentation_definition",
            presentation_definition.map(decode_json_parameter),
        );
        put(
            "presentation_definition_uri",
            presentation_definition_uri.map(Json::String),
        );

        object.into()
    }
}

/// JSON valued query parameter. Left as a string when it does not parse, so that typed parsing
/// reports it as malformed.
fn decode_json_parameter(value: String) -> Json {
    serde_json::from_str(&value).unwrap_or(Json::String(value))
}

/// The three shapes an incoming authorization request can take.
///
/// Consumed by a single call to [validate](RawRequestInput::validate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRequestInput {
    /// A compact JWS request object.
    ByValue {
        jwt: String,
        /// The `client_id` outside the request object, if any.
        client_id: Option<String>,
    },
    ByReference {
        request_uri: String,
        client_id: Option<String>,
    },
    /// An unsigned request carried entirely in query parameters.
    ByParameters(Box<AuthorizationRequestData>),
}

impl RawRequestInput {
    /// Validate the request, resolving and authenticating its client.
    pub async fn validate<H: AsyncHttpClient + Send + Sync + ?Sized>(
        self,
        config: &WalletOpenId4VpConfig,
        http_client: &H,
    ) -> Result<ValidatedRequest, AuthorizationError> {
        match self {
            RawRequestInput::ByValue { jwt, client_id } => {
                validate_request_object(&jwt, client_id.as_deref(), config, http_client).await
            }
            RawRequestInput::ByReference {
                request_uri,
                client_id,
            } => {
                let url = Url::parse(&request_uri)
                    .map_err(|_| ValidatedAuthorizationError::InvalidRequestUri(request_uri))?;
                let body = Fetcher::new(http_client, config.fetch_timeout())
                    .fetch_string(&url, REQUEST_OBJECT_ACCEPT)
                    .await?;
                let jwt = extract_jwt(&body)?;
                validate_request_object(&jwt, client_id.as_deref(), config, http_client).await
            }
            RawRequestInput::ByParameters(data) => Ok(validate_parameters(data.into_object())?),
        }
    }
}

/// Validate `input` against `config`, for hosts without a [Wallet](crate::wallet::Wallet) type.
pub async fn validate_authorization_request<H: AsyncHttpClient + Send + Sync + ?Sized>(
    input: RawRequestInput,
    config: &WalletOpenId4VpConfig,
    http_client: &H,
) -> Result<ValidatedRequest, AuthorizationError> {
    input.validate(config, http_client).await
}

/// Find the request object in a `request_uri` response: a bare compact JWS, a JSON string holding
/// one, or `{"jwt": "<compact JWS>"}`.
pub(crate) fn extract_jwt(body: &str) -> Result<String, ValidatedAuthorizationError> {
    let body = body.trim();
    if is_compact_jws(body) {
        return Ok(body.to_owned());
    }
    let jwt = match serde_json::from_str::<Json>(body) {
        Ok(Json::Object(mut envelope)) => envelope.remove("jwt"),
        Ok(string @ Json::String(_)) => Some(string),
        Ok(_) | Err(_) => None,
    };
    match jwt {
        Some(Json::String(jwt)) if is_compact_jws(&jwt) => Ok(jwt),
        _ => {
            debug!("request_uri response did not contain a request object");
            Err(ValidatedAuthorizationError::InvalidJwtPayload)
        }
    }
}

/// Classify the response type, rejecting `code` up front.
fn classify_response_type(
    object: &UntypedObject,
) -> Result<ResponseType, ValidatedAuthorizationError> {
    match ResponseType::classify(object)? {
        ResponseType::Code => Err(ValidatedAuthorizationError::UnsupportedResponseType(
            ResponseType::Code.to_string(),
        )),
        rt => Ok(rt),
    }
}

async fn validate_request_object<H: AsyncHttpClient + Send + Sync + ?Sized>(
    jwt: &str,
    expected_client_id: Option<&str>,
    config: &WalletOpenId4VpConfig,
    http_client: &H,
) -> Result<ValidatedRequest, AuthorizationError> {
    let jws = UnverifiedJws::decode(jwt).map_err(|e| {
        debug!("unable to decode request object: {e:#}");
        ValidatedAuthorizationError::InvalidAuthorizationData
    })?;
    let claims = jws.claims();

    let response_type = classify_response_type(claims)?;
    let ClientId(client_id) = claims.get().parsing_error()?;
    let Nonce(nonce) = claims.get().parsing_error()?;
    ensure_client_id(expected_client_id, &client_id)?;

    let hint = claims.get_lenient::<ClientIdScheme>();
    let client = resolve_client(
        &client_id,
        &jws,
        config.supported_client_id_schemes(),
        hint.as_ref(),
    )?;

    SignatureValidator::new(config, http_client)
        .validate(&jws, &client, expected_client_id)
        .await?;

    Ok(assemble(
        claims,
        response_type,
        Common {
            client_id,
            client,
            nonce,
        },
    )?)
}

fn validate_parameters(
    object: UntypedObject,
) -> Result<ValidatedRequest, ValidatedAuthorizationError> {
    let response_type = classify_response_type(&object)?;
    let ClientId(client_id) = object.get().parsing_error()?;
    let Nonce(nonce) = object.get().parsing_error()?;

    debug!("unsigned request from '{client_id}', treating it as pre-registered");
    let client = Client::PreRegistered {
        client_id: client_id.clone(),
        legal_name: client_id.clone(),
    };

    assemble(
        &object,
        response_type,
        Common {
            client_id,
            client,
            nonce,
        },
    )
}
