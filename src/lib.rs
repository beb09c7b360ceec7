//! Resilient advertising-platform API client with an OAuth 2.0 token lifecycle, quota-aware rate
//! limiting, and a classifying circuit breaker wrapped around every outbound call.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod resilience;
pub mod store;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		api::ApiClient,
		auth::{CredentialId, ScopeSet, Token, TokenSecret},
		clock::{Clock, ManualClock},
		config::{ClientConfig, PlatformDescriptor},
		flows::TokenManager,
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		resilience::{CircuitBreaker, CircuitBreakerConfig, RateLimitConfig, RateLimiter},
		store::{self, KeyValueStore, MemoryStore},
	};

	/// API client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = ApiClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;
	/// Token manager type alias used by reqwest-backed integration tests.
	pub type ReqwestTestTokens = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Client identifier shared by the test fixtures.
	pub const TEST_CLIENT_ID: &str = "client-test";
	/// Client secret shared by the test fixtures.
	pub const TEST_CLIENT_SECRET: &str = "secret-test";
	/// Developer token shared by the test fixtures.
	pub const TEST_DEVELOPER_TOKEN: &str = "dev-token-test";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a descriptor whose endpoints all point at the provided mock server base URL.
	pub fn test_descriptor(base: &str) -> PlatformDescriptor {
		let url = |path: &str| {
			Url::parse(&format!("{}{path}", base.trim_end_matches('/')))
				.expect("Mock endpoint URL should parse successfully.")
		};

		PlatformDescriptor::builder()
			.authorization_endpoint(url("/authorize"))
			.token_endpoint(url("/token"))
			.revocation_endpoint(url("/revoke"))
			.api_base(url("/v17"))
			.build()
			.expect("Mock platform descriptor should build successfully.")
	}

	/// Builds the client configuration shared by integration tests.
	pub fn test_config() -> ClientConfig {
		ClientConfig::new(
			TEST_CLIENT_ID,
			TEST_CLIENT_SECRET,
			TEST_DEVELOPER_TOKEN,
			Url::parse("https://app.example.com/oauth/callback")
				.expect("Redirect URI fixture should parse successfully."),
		)
	}

	/// Builds a token fixture issued at `issued_at` and valid for `expires_in`.
	pub fn test_token(
		access: &str,
		refresh: Option<&str>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Token {
		Token::builder()
			.access_token(access)
			.maybe_refresh_token(refresh.map(TokenSecret::new))
			.scope(ScopeSet::ads_api())
			.issued_at(issued_at)
			.expires_in(expires_in)
			.build()
			.expect("Token fixture should build successfully.")
	}

	/// Returns a memory store holding `token` under the default identity's mirror key.
	pub async fn seeded_store(token: &Token) -> Arc<MemoryStore> {
		let store = Arc::new(MemoryStore::default());
		let raw = serde_json::to_string(token).expect("Token fixture should serialize.");

		store
			.set(&store::token_key(&default_identity()), raw)
			.await
			.expect("Seeding the memory store should succeed.");

		store
	}

	/// Constructs a token manager backed by the insecure reqwest transport and the provided
	/// clock.
	pub fn build_test_tokens(base: &str, clock: ManualClock) -> ReqwestTestTokens {
		let clock: Arc<dyn Clock> = Arc::new(clock);

		TokenManager::with_http_client(
			test_config(),
			test_descriptor(base),
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
		.with_clock(clock)
	}

	/// Constructs an [`ApiClient`] around `tokens` whose resilience layers share `clock`.
	pub fn build_test_client(
		base: &str,
		clock: ManualClock,
		tokens: ReqwestTestTokens,
		rate_limits: RateLimitConfig,
		circuit: CircuitBreakerConfig,
	) -> ReqwestTestClient {
		let shared: Arc<dyn Clock> = Arc::new(clock);
		let limiter = Arc::new(RateLimiter::new(rate_limits).with_clock(shared.clone()));
		let breaker = Arc::new(CircuitBreaker::new(circuit).with_clock(shared));

		ApiClient::with_http_client(
			test_config(),
			test_descriptor(base),
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
		.with_token_manager(Arc::new(tokens))
		.with_rate_limiter(limiter)
		.with_circuit_breaker(breaker)
	}

	/// Returns the identity the test client resolves tokens for.
	pub fn default_identity() -> CredentialId {
		CredentialId::default_identity()
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
