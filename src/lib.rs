//! Wallet-side validation of [SIOPv2] and [OID4VP] authorization requests.
//!
//! [SIOPv2]: <https://openid.net/specs/openid-connect-self-issued-v2-1_0.html>
//! [OID4VP]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>
//!
//! An authorization request reaches the wallet by value (a signed request object), by reference
//! (a `request_uri` the wallet dereferences) or as bare query parameters. This crate turns it into
//! a [`ValidatedRequest`] after establishing who the verifier (the "client") is.
//!
//! # Wallet Usage
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use siop_openid4vp::config::{
//!     PreregisteredClient, SupportedClientIdScheme, WalletOpenId4VpConfig,
//! };
//! use siop_openid4vp::core::util::ReqwestClient;
//! use siop_openid4vp::wallet::Wallet;
//!
//! struct MyWallet {
//!     config: WalletOpenId4VpConfig,
//!     http_client: ReqwestClient,
//! }
//!
//! #[async_trait]
//! impl Wallet for MyWallet {
//!     type HttpClient = ReqwestClient;
//!
//!     fn config(&self) -> &WalletOpenId4VpConfig {
//!         &self.config
//!     }
//!
//!     fn http_client(&self) -> &Self::HttpClient {
//!         &self.http_client
//!     }
//! }
//!
//! let wallet = MyWallet {
//!     config: WalletOpenId4VpConfig::new(vec![
//!         SupportedClientIdScheme::X509SanDns(Arc::new(|chain: &[_]| check_chain(chain))),
//!         SupportedClientIdScheme::Did(Arc::new(|did: &DID| resolve_key(did))),
//!         SupportedClientIdScheme::preregistered([PreregisteredClient::new(
//!             "verifier-backend",
//!             "Verifier Backend",
//!         )]),
//!     ]),
//!     http_client: ReqwestClient::new()?,
//! };
//!
//! let request = wallet.validate_request(request_url).await?;
//! if !request.client().has_cryptographic_binding() {
//!     // Show the verifier as unverified.
//! }
//! ```
//!
//! [`ValidatedRequest`]: crate::core::authorization_request::validated::ValidatedRequest
//!
//! # Pipeline
//!
//! 1. *Payload extraction*: the request object is decoded without verification
//!    ([`core::jws`]).
//! 2. *Response classification*: `response_type` and `response_mode` are classified, `code` is
//!    rejected ([`core::authorization_request::parameters`]).
//! 3. *Client resolution*: the configured [client identifier scheme] matching the
//!    `client_id_scheme` hint (or the first configured one) resolves the [`Client`].
//! 4. *Signature validation*: the request object is verified against the client's key material
//!    (x5c leaf, DID key or pre-registered JWK Set).
//! 5. *Assembly*: the [`ValidatedRequest`] variant for the response type is built, enforcing the
//!    fields it requires.
//!
//! Remote lookups are bounded by a timeout and fail with a
//! [`FetchError`](crate::core::error::FetchError), which callers may retry. Validation failures
//! are permanent.
//!
//! [client identifier scheme]: crate::config::SupportedClientIdScheme
//! [`Client`]: crate::core::authorization_request::client::Client

pub mod config;
pub mod core;
pub mod utils;
pub mod wallet;
