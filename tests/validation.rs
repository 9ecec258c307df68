use std::time::Duration;

use serde_json::{json, Value as Json};
use siop_openid4vp::{
    config::{
        JwkSetSource, PreregisteredClient, SignaturePolicy, SupportedClientIdScheme,
        WalletOpenId4VpConfig,
    },
    core::{
        authorization_request::{
            client::Client,
            parameters::{
                ClientMetaDataSource, IdTokenType, PresentationDefinition,
                PresentationDefinitionSource, ResponseMode, ResponseType, Scope,
            },
            validate_authorization_request,
            validated::ValidatedRequest,
            AuthorizationRequestData, RawRequestInput,
        },
        error::{AuthorizationError, FetchError, ValidatedAuthorizationError},
        util::AsyncHttpClient,
    },
    wallet::Wallet,
};

mod support;

use support::{es256_header, MockHttpClient, P256Signer, VERIFIER};

const CLIENT_ID: &str = "V";
const REQUEST_URI: &str = "https://verifier.example.org/request/1";
const JWKS_URI: &str = "https://verifier.example.org/jwks.json";
const PD_URI: &str = "https://verifier.example.org/pd/1";
const RESPONSE_URI: &str = "https://verifier.example.org/response";

fn verifier_key() -> P256Signer {
    P256Signer::new(1)
}

fn config_with(source: Option<JwkSetSource>) -> WalletOpenId4VpConfig {
    let mut client = PreregisteredClient::new(CLIENT_ID, CLIENT_ID);
    client.jwk_set_source = source;
    WalletOpenId4VpConfig::new(vec![SupportedClientIdScheme::preregistered([client])])
}

fn config() -> WalletOpenId4VpConfig {
    config_with(Some(JwkSetSource::ByValue(vec![verifier_key().jwk()])))
}

fn claims(response_type: &str) -> Json {
    json!({
        "client_id": CLIENT_ID,
        "client_id_scheme": "pre-registered",
        "response_type": response_type,
        "response_mode": "direct_post",
        "response_uri": RESPONSE_URI,
        "nonce": "n-0S6_WzA2Mj",
        "state": "af0ifjsldkj",
        "id_token_type": "subject_signed_id_token",
        "presentation_definition": { "id": "pd", "input_descriptors": [] },
        "client_metadata": { "client_name": "Verifier" }
    })
}

fn by_value(claims: Json) -> RawRequestInput {
    RawRequestInput::ByValue {
        jwt: verifier_key().sign(es256_header(), claims),
        client_id: Some(CLIENT_ID.into()),
    }
}

fn without(mut claims: Json, key: &str) -> Json {
    claims.as_object_mut().unwrap().remove(key);
    claims
}

async fn validate(
    input: RawRequestInput,
    config: &WalletOpenId4VpConfig,
    http_client: &MockHttpClient,
) -> Result<ValidatedRequest, AuthorizationError> {
    validate_authorization_request(input, config, http_client).await
}

fn invalid(result: Result<ValidatedRequest, AuthorizationError>) -> ValidatedAuthorizationError {
    match result {
        Err(AuthorizationError::Invalid(e)) => e,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn each_response_type_yields_its_variant() {
    let http_client = MockHttpClient::default();

    let request = validate(by_value(claims("id_token")), &config(), &http_client)
        .await
        .unwrap();
    let ValidatedRequest::IdToken(request) = request else {
        panic!("expected an id_token request")
    };
    assert_eq!(request.scope, "");
    assert_eq!(request.nonce, "n-0S6_WzA2Mj");
    assert_eq!(request.state.as_deref(), Some("af0ifjsldkj"));
    assert_eq!(*request.id_token_type.head(), IdTokenType::SubjectSigned);
    assert!(matches!(
        request.client_meta_data_source,
        Some(ClientMetaDataSource::PassByValue(_))
    ));

    let request = validate(by_value(claims("vp_token")), &config(), &http_client)
        .await
        .unwrap();
    let ValidatedRequest::VpToken(request) = request else {
        panic!("expected a vp_token request")
    };
    assert_eq!(
        request.presentation_definition_source,
        PresentationDefinitionSource::PassByValue(PresentationDefinition(
            json!({ "id": "pd", "input_descriptors": [] })
        ))
    );
    assert_eq!(
        request.client,
        Client::PreRegistered {
            client_id: CLIENT_ID.into(),
            legal_name: CLIENT_ID.into()
        }
    );

    let request = validate(by_value(claims("vp_token id_token")), &config(), &http_client)
        .await
        .unwrap();
    assert_eq!(request.response_type(), ResponseType::VpAndIdToken);
    assert_eq!(
        request.response_mode(),
        Some(&ResponseMode::DirectPost(RESPONSE_URI.parse().unwrap()))
    );
}

#[tokio::test]
async fn code_is_always_rejected() {
    let jwt = verifier_key().sign(es256_header(), claims("code"));
    let http_client = MockHttpClient::default().with_route(REQUEST_URI, 200, jwt.clone());

    let inputs = [
        RawRequestInput::ByValue {
            jwt,
            client_id: None,
        },
        RawRequestInput::ByReference {
            request_uri: REQUEST_URI.into(),
            client_id: None,
        },
        RawRequestInput::ByParameters(Box::new(AuthorizationRequestData {
            client_id: Some(CLIENT_ID.into()),
            response_type: Some("code".into()),
            nonce: Some("n".into()),
            ..Default::default()
        })),
    ];

    for input in inputs {
        assert_eq!(
            invalid(validate(input, &config(), &http_client).await),
            ValidatedAuthorizationError::UnsupportedResponseType("code".into())
        );
    }
}

#[tokio::test]
async fn nonce_is_required_for_every_input_shape() {
    let jwt = verifier_key().sign(es256_header(), without(claims("vp_token"), "nonce"));
    let http_client = MockHttpClient::default().with_route(
        REQUEST_URI,
        200,
        json!({ "jwt": jwt }).to_string(),
    );

    let inputs = [
        RawRequestInput::ByValue {
            jwt,
            client_id: None,
        },
        RawRequestInput::ByReference {
            request_uri: REQUEST_URI.into(),
            client_id: None,
        },
        RawRequestInput::ByParameters(Box::new(AuthorizationRequestData {
            client_id: Some(CLIENT_ID.into()),
            response_type: Some("vp_token".into()),
            scope: Some("com.example.pid".into()),
            ..Default::default()
        })),
    ];

    for input in inputs {
        assert_eq!(
            invalid(validate(input, &config(), &http_client).await),
            ValidatedAuthorizationError::MissingRequiredField(".nonce".into())
        );
    }
}

#[tokio::test]
async fn request_by_reference() {
    let claims = json!({
        "client_id": CLIENT_ID,
        "client_id_scheme": "pre-registered",
        "response_type": "vp_token",
        "response_mode": "direct_post",
        "response_uri": RESPONSE_URI,
        "presentation_definition_uri": PD_URI,
        "nonce": "n-0S6_WzA2Mj"
    });
    let jwt = verifier_key().sign(es256_header(), claims);
    let http_client = MockHttpClient::default().with_route(REQUEST_URI, 200, jwt);

    let request = validate(
        RawRequestInput::ByReference {
            request_uri: REQUEST_URI.into(),
            client_id: Some(CLIENT_ID.into()),
        },
        &config(),
        &http_client,
    )
    .await
    .unwrap();

    let ValidatedRequest::VpToken(request) = request else {
        panic!("expected a vp_token request")
    };
    assert_eq!(
        request.response_mode,
        Some(ResponseMode::DirectPost(RESPONSE_URI.parse().unwrap()))
    );
    assert_eq!(
        request.presentation_definition_source,
        PresentationDefinitionSource::FetchByReference(PD_URI.parse().unwrap())
    );
}

#[tokio::test]
async fn request_uri_failures() {
    let http_client = MockHttpClient::default()
        .with_route(REQUEST_URI, 200, "<html>not a request</html>")
        .with_route("https://verifier.example.org/request/2", 503, "busy");
    let by_reference = |request_uri: &str| RawRequestInput::ByReference {
        request_uri: request_uri.into(),
        client_id: None,
    };

    assert_eq!(
        invalid(validate(by_reference(REQUEST_URI), &config(), &http_client).await),
        ValidatedAuthorizationError::InvalidJwtPayload
    );
    assert!(matches!(
        invalid(validate(by_reference("not a uri"), &config(), &http_client).await),
        ValidatedAuthorizationError::InvalidRequestUri(_)
    ));

    let err = validate(
        by_reference("https://verifier.example.org/request/404"),
        &config(),
        &http_client,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        AuthorizationError::Fetch(FetchError::InvalidStatusCode(404))
    ));
    assert!(!err.is_retryable());

    let err = validate(
        by_reference("https://verifier.example.org/request/2"),
        &config(),
        &http_client,
    )
    .await
    .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn request_uri_times_out() {
    let config = config().with_fetch_timeout(Duration::from_millis(20));
    let http_client = MockHttpClient::slow(Duration::from_secs(5));

    let err = validate(
        RawRequestInput::ByReference {
            request_uri: REQUEST_URI.into(),
            client_id: None,
        },
        &config,
        &http_client,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AuthorizationError::Fetch(FetchError::Timeout { .. })));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn outer_client_id_must_match() {
    let input = RawRequestInput::ByValue {
        jwt: verifier_key().sign(es256_header(), claims("vp_token")),
        client_id: Some("W".into()),
    };
    assert_eq!(
        invalid(validate(input, &config(), &MockHttpClient::default()).await),
        ValidatedAuthorizationError::ClientIdMismatch {
            expected: "W".into(),
            actual: CLIENT_ID.into()
        }
    );
}

#[tokio::test]
async fn signature_failures_are_fatal_by_default() {
    let forged = RawRequestInput::ByValue {
        jwt: P256Signer::new(2).sign(es256_header(), claims("vp_token")),
        client_id: None,
    };
    assert!(matches!(
        invalid(validate(forged.clone(), &config(), &MockHttpClient::default()).await),
        ValidatedAuthorizationError::ValidationError(_)
    ));

    let lenient = config().with_signature_policy(SignaturePolicy::AllowUnverified);
    let request = validate(forged, &lenient, &MockHttpClient::default())
        .await
        .unwrap();
    assert_eq!(request.client_id(), CLIENT_ID);
}

#[tokio::test]
async fn client_id_mismatch_survives_lenient_policy() {
    let lenient = config().with_signature_policy(SignaturePolicy::AllowUnverified);
    let input = RawRequestInput::ByValue {
        jwt: P256Signer::new(2).sign(es256_header(), claims("vp_token")),
        client_id: Some("W".into()),
    };
    assert!(matches!(
        invalid(validate(input, &lenient, &MockHttpClient::default()).await),
        ValidatedAuthorizationError::ClientIdMismatch { .. }
    ));
}

#[tokio::test]
async fn preregistered_client_needs_key_material() {
    let result = validate(
        by_value(claims("vp_token")),
        &config_with(None),
        &MockHttpClient::default(),
    )
    .await;
    assert!(matches!(
        invalid(result),
        ValidatedAuthorizationError::ValidationError(_)
    ));
}

#[tokio::test]
async fn unsupported_algorithms_and_unsigned_objects() {
    let unsigned = RawRequestInput::ByValue {
        jwt: verifier_key().sign(json!({ "alg": "none" }), claims("vp_token")),
        client_id: None,
    };
    assert!(matches!(
        invalid(validate(unsigned, &config(), &MockHttpClient::default()).await),
        ValidatedAuthorizationError::ValidationError(_)
    ));

    let es384 = RawRequestInput::ByValue {
        jwt: verifier_key().sign(json!({ "alg": "ES384" }), claims("vp_token")),
        client_id: None,
    };
    assert!(matches!(
        invalid(validate(es384, &config(), &MockHttpClient::default()).await),
        ValidatedAuthorizationError::ValidationError(_)
    ));
}

#[tokio::test]
async fn jwks_by_reference_selects_key_by_kid() {
    let key = verifier_key();
    let jwks = json!({
        "keys": [P256Signer::new(3).jwk_with_kid("old"), key.jwk_with_kid("current")]
    });
    let http_client = MockHttpClient::default().with_route(JWKS_URI, 200, jwks.to_string());
    let config = config_with(Some(JwkSetSource::ByReference(JWKS_URI.parse().unwrap())));

    let input = RawRequestInput::ByValue {
        jwt: key.sign(
            json!({ "alg": "ES256", "kid": "current" }),
            claims("vp_token"),
        ),
        client_id: None,
    };
    assert!(validate(input, &config, &http_client).await.is_ok());

    let missing_jwks = validate(by_value(claims("vp_token")), &config, &MockHttpClient::default())
        .await
        .unwrap_err();
    assert!(matches!(
        missing_jwks,
        AuthorizationError::Fetch(FetchError::InvalidStatusCode(404))
    ));
}

#[tokio::test]
async fn temporal_claims_are_enforced() {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();

    for (claim, value) in [
        ("exp", json!(1_000_000_000)),
        ("exp", json!(1_000_000_000.5)),
        ("exp", json!("4102444800")),
        ("nbf", json!(now + 3600)),
        ("iat", json!(now + 3600)),
    ] {
        let mut claims = claims("vp_token");
        claims[claim] = value.clone();
        assert!(
            matches!(
                invalid(validate(by_value(claims), &config(), &MockHttpClient::default()).await),
                ValidatedAuthorizationError::ValidationError(_)
            ),
            "{claim}: {value} was accepted"
        );
    }

    // Within the clock skew, and fractional dates in the future.
    let mut claims = claims("vp_token");
    claims["exp"] = json!(now as f64 + 600.25);
    claims["nbf"] = json!(now + 5);
    claims["iat"] = json!(now);
    assert!(validate(by_value(claims), &config(), &MockHttpClient::default())
        .await
        .is_ok());
}

#[tokio::test]
async fn preregistered_jar_signing_alg_is_enforced() {
    let config_for = |alg: &str| {
        WalletOpenId4VpConfig::new(vec![SupportedClientIdScheme::preregistered([
            PreregisteredClient::new(CLIENT_ID, CLIENT_ID)
                .with_jar_signing_alg(alg)
                .with_jwk_set_source(JwkSetSource::ByValue(vec![verifier_key().jwk()])),
        ])])
        .with_signing_algorithms_supported(vec!["ES256".into(), "EdDSA".into()])
    };

    let result = validate(
        by_value(claims("vp_token")),
        &config_for("EdDSA"),
        &MockHttpClient::default(),
    )
    .await;
    assert!(matches!(
        invalid(result),
        ValidatedAuthorizationError::ValidationError(_)
    ));

    assert!(validate(
        by_value(claims("vp_token")),
        &config_for("ES256"),
        &MockHttpClient::default()
    )
    .await
    .is_ok());
}

#[tokio::test]
async fn jwks_by_value_without_matching_kid() {
    let key = verifier_key();
    let config = config_with(Some(JwkSetSource::ByValue(vec![
        key.jwk_with_kid("current")
    ])));

    let input = RawRequestInput::ByValue {
        jwt: key.sign(json!({ "alg": "ES256", "kid": "rotated" }), claims("vp_token")),
        client_id: None,
    };
    assert!(matches!(
        invalid(validate(input, &config, &MockHttpClient::default()).await),
        ValidatedAuthorizationError::ValidationError(_)
    ));

    let input = RawRequestInput::ByValue {
        jwt: key.sign(json!({ "alg": "ES256", "kid": "current" }), claims("vp_token")),
        client_id: None,
    };
    assert!(validate(input, &config, &MockHttpClient::default())
        .await
        .is_ok());
}

#[tokio::test]
async fn bare_parameters_degrade_to_preregistered() {
    let data = AuthorizationRequestData::from_query_params(
        "client_id=https%3A%2F%2Fclient.example.org%2Fcb\
         &response_type=vp_token%20id_token\
         &id_token_type=subject_signed_id_token\
         &nonce=n\
         &scope=openid%20com.example.pid\
         &presentation_definition=%7B%22id%22%3A%22pd%22%7D\
         &redirect_uri=https%3A%2F%2Fclient.example.org%2Fcb",
    )
    .unwrap();

    // No scheme is needed, nothing is verified.
    let config = WalletOpenId4VpConfig::default();
    let request = validate(data.into_raw_input(), &config, &MockHttpClient::default())
        .await
        .unwrap();

    let ValidatedRequest::IdAndVpToken(request) = request else {
        panic!("expected an id_token and vp_token request")
    };
    assert_eq!(
        request.client,
        Client::PreRegistered {
            client_id: "https://client.example.org/cb".into(),
            legal_name: "https://client.example.org/cb".into()
        }
    );
    assert!(!request.client.has_cryptographic_binding());
    assert_eq!(request.scope, "openid com.example.pid");
    assert_eq!(
        request.presentation_definition_source,
        PresentationDefinitionSource::PassByValue(PresentationDefinition(json!({ "id": "pd" })))
    );
    assert_eq!(
        request.response_mode,
        Some(ResponseMode::Fragment(
            "https://client.example.org/cb".parse().unwrap()
        ))
    );
}

#[tokio::test]
async fn bare_parameters_with_implied_presentation_definition() {
    let data = AuthorizationRequestData {
        client_id: Some(CLIENT_ID.into()),
        response_type: Some("vp_token".into()),
        response_mode: Some("direct_post".into()),
        nonce: Some("n".into()),
        scope: Some("com.example.pid".into()),
        ..Default::default()
    };
    let request = validate(
        data.into_raw_input(),
        &WalletOpenId4VpConfig::default(),
        &MockHttpClient::default(),
    )
    .await
    .unwrap();

    let ValidatedRequest::VpToken(request) = request else {
        panic!("expected a vp_token request")
    };
    assert_eq!(
        request.presentation_definition_source,
        PresentationDefinitionSource::Implied(Scope("com.example.pid".into()))
    );
    // `direct_post` without `response_uri` is dropped rather than failing the request.
    assert_eq!(request.response_mode, None);
}

struct TestWallet {
    config: WalletOpenId4VpConfig,
    http_client: MockHttpClient,
}

impl Wallet for TestWallet {
    type HttpClient = MockHttpClient;

    fn config(&self) -> &WalletOpenId4VpConfig {
        &self.config
    }

    fn http_client(&self) -> &Self::HttpClient {
        &self.http_client
    }
}

#[tokio::test]
async fn wallet_validates_invocation_urls() {
    let jwt = verifier_key().sign(es256_header(), claims("vp_token"));
    let wallet = TestWallet {
        config: config(),
        http_client: MockHttpClient::default().with_route(REQUEST_URI, 200, jwt),
    };

    let mut url: url::Url = "openid4vp://".parse().unwrap();
    url.query_pairs_mut()
        .append_pair("client_id", CLIENT_ID)
        .append_pair("request_uri", REQUEST_URI);
    let request = wallet.validate_request(url).await.unwrap();
    assert_eq!(request.nonce(), "n-0S6_WzA2Mj");

    let wrong_endpoint: url::Url = format!("{VERIFIER}/authorize?client_id=V")
        .parse()
        .unwrap();
    assert_eq!(
        invalid(wallet.validate_request(wrong_endpoint).await),
        ValidatedAuthorizationError::InvalidAuthorizationData
    );
}

#[test]
fn mock_client_is_an_http_client() {
    fn assert_http_client<H: AsyncHttpClient + Send + Sync>() {}
    assert_http_client::<MockHttpClient>();
}

#[tokio::test]
async fn wallet_without_endpoint_accepts_any_invocation_url() {
    let jwt = verifier_key().sign(es256_header(), claims("vp_token"));
    let wallet = TestWallet {
        config: config().with_authorization_endpoint(None),
        http_client: MockHttpClient::default().with_route(REQUEST_URI, 200, jwt),
    };

    let mut url: url::Url = "https://wallet.example.org/any/path".parse().unwrap();
    url.query_pairs_mut()
        .append_pair("client_id", CLIENT_ID)
        .append_pair("request_uri", REQUEST_URI);
    let request = wallet.validate_request(url).await.unwrap();
    assert_eq!(request.client_id(), CLIENT_ID);
}
