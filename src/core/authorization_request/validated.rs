use tracing::debug;

use crate::{
    core::{
        error::ValidatedAuthorizationError,
        object::{ParsingErrorContext, UntypedObject},
    },
    utils::NonEmptyVec,
};

use super::{
    client::Client,
    parameters::{
        ClientIdScheme, ClientMetaDataSource, IdTokenType, IdTokenTypes,
        PresentationDefinitionSource, ResponseMode, ResponseType, Scope, State,
    },
};

/// A SIOP request for an `id_token`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdTokenRequest {
    pub id_token_type: NonEmptyVec<IdTokenType>,
    pub client_meta_data_source: Option<ClientMetaDataSource>,
    pub client_id_scheme: Option<ClientIdScheme>,
    pub client_id: String,
    pub client: Client,
    pub nonce: String,
    pub scope: String,
    pub response_mode: Option<ResponseMode>,
    pub state: Option<String>,
}

/// An OpenID4VP request for a `vp_token`.
#[derive(Debug, Clone, PartialEq)]
pub struct VpTokenRequest {
    pub presentation_definition_source: PresentationDefinitionSource,
    pub client_meta_data_source: Option<ClientMetaDataSource>,
    pub client_id_scheme: Option<ClientIdScheme>,
    pub client_id: String,
    pub client: Client,
    pub nonce: String,
    pub response_mode: Option<ResponseMode>,
    pub state: Option<String>,
}

/// A combined request for both a `vp_token` and an `id_token`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdAndVpTokenRequest {
    pub id_token_type: NonEmptyVec<IdTokenType>,
    pub presentation_definition_source: PresentationDefinitionSource,
    pub client_meta_data_source: Option<ClientMetaDataSource>,
    pub client_id_scheme: Option<ClientIdScheme>,
    pub client_id: String,
    pub client: Client,
    pub nonce: String,
    pub scope: String,
    pub response_mode: Option<ResponseMode>,
    pub state: Option<String>,
}

/// An authorization request which passed validation, by response type.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedRequest {
    IdToken(IdTokenRequest),
    VpToken(VpTokenRequest),
    IdAndVpToken(IdAndVpTokenRequest),
}

impl ValidatedRequest {
    pub fn response_type(&self) -> ResponseType {
        match self {
            ValidatedRequest::IdToken(_) => ResponseType::IdToken,
            ValidatedRequest::VpToken(_) => ResponseType::VpToken,
            ValidatedRequest::IdAndVpToken(_) => ResponseType::VpAndIdToken,
        }
    }

    pub fn client(&self) -> &Client {
        match self {
            ValidatedRequest::IdToken(r) => &r.client,
            ValidatedRequest::VpToken(r) => &r.client,
            ValidatedRequest::IdAndVpToken(r) => &r.client,
        }
    }

    pub fn client_id(&self) -> &str {
        match self {
            ValidatedRequest::IdToken(r) => &r.client_id,
            ValidatedRequest::VpToken(r) => &r.client_id,
            ValidatedRequest::IdAndVpToken(r) => &r.client_id,
        }
    }

    pub fn nonce(&self) -> &str {
        match self {
            ValidatedRequest::IdToken(r) => &r.nonce,
            ValidatedRequest::VpToken(r) => &r.nonce,
            ValidatedRequest::IdAndVpToken(r) => &r.nonce,
        }
    }

    pub fn state(&self) -> Option<&str> {
        match self {
            ValidatedRequest::IdToken(r) => r.state.as_deref(),
            ValidatedRequest::VpToken(r) => r.state.as_deref(),
            ValidatedRequest::IdAndVpToken(r) => r.state.as_deref(),
        }
    }

    pub fn response_mode(&self) -> Option<&ResponseMode> {
        match self {
            ValidatedRequest::IdToken(r) => r.response_mode.as_ref(),
            ValidatedRequest::VpToken(r) => r.response_mode.as_ref(),
            ValidatedRequest::IdAndVpToken(r) => r.response_mode.as_ref(),
        }
    }
}

/// Fields shared by every variant.
pub(crate) struct Common {
    pub client_id: String,
    pub client: Client,
    pub nonce: String,
}

/// Build the variant for `response_type`, enforcing the fields that variant requires.
pub(crate) fn assemble(
    object: &UntypedObject,
    response_type: ResponseType,
    Common {
        client_id,
        client,
        nonce,
    }: Common,
) -> Result<ValidatedRequest, ValidatedAuthorizationError> {
    let client_meta_data_source = ClientMetaDataSource::from_object(object);
    let client_id_scheme = object.get_lenient::<ClientIdScheme>();
    let state = object.get_lenient::<State>().map(|State(s)| s);
    let response_mode = match ResponseMode::classify(object) {
        Ok(mode) => Some(mode),
        Err(e) => {
            debug!("ignoring response mode: {e}");
            None
        }
    };
    let scope = || object.get_lenient::<Scope>().unwrap_or_default().0;
    let id_token_type = || {
        object
            .get::<IdTokenTypes>()
            .parsing_error()
            .map(|IdTokenTypes(types)| types)
    };

    let request = match response_type {
        ResponseType::IdToken => ValidatedRequest::IdToken(IdTokenRequest {
            id_token_type: id_token_type()?,
            client_meta_data_source,
            client_id_scheme,
            client_id,
            client,
            nonce,
            scope: scope(),
            response_mode,
            state,
        }),
        ResponseType::VpToken => ValidatedRequest::VpToken(VpTokenRequest {
            presentation_definition_source: PresentationDefinitionSource::from_object(object)?,
            client_meta_data_source,
            client_id_scheme,
            client_id,
            client,
            nonce,
            response_mode,
            state,
        }),
        ResponseType::VpAndIdToken => ValidatedRequest::IdAndVpToken(IdAndVpTokenRequest {
            id_token_type: id_token_type()?,
            presentation_definition_source: PresentationDefinitionSource::from_object(object)?,
            client_meta_data_source,
            client_id_scheme,
            client_id,
            client,
            nonce,
            scope: scope(),
            response_mode,
            state,
        }),
        ResponseType::Code | ResponseType::Unsupported(_) => {
            return Err(ValidatedAuthorizationError::ConflictingData)
        }
    };

    Ok(request)
}
