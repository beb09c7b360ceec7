#![cfg(feature = "reqwest")]

// std
use std::{env, fs, path::PathBuf, process};
// crates.io
use httpmock::prelude::*;
use time::macros;
// self
use ads_gateway::{
	_preludet::*,
	auth::{ADS_API_SCOPE, CredentialId, Token},
	clock::ManualClock,
	config::{DescriptorError, PlatformDescriptor},
	error::ConfigError,
	flows::{AccessType, TokenManager},
	oauth::ReqwestTransportErrorMapper,
	store::{FileStore, KeyValueStore, token_key},
};

const EMAIL_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.email";

fn start() -> OffsetDateTime {
	macros::datetime!(2025-06-01 12:00 UTC)
}

fn temp_path(label: &str) -> PathBuf {
	env::temp_dir().join(format!(
		"ads_gateway_{label}_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	))
}

async fn mock_token_success<'a>(server: &'a MockServer, body: &str) -> httpmock::Mock<'a> {
	let body = body.to_owned();

	server
		.mock_async(move |when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

#[tokio::test]
async fn expiring_token_refreshes_once_and_keeps_refresh_secret() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	// Expires 200 seconds from now, inside the five-minute buffer.
	let seeded = test_token(
		"access-old",
		Some("refresh-old"),
		start() - Duration::seconds(3_400),
		Duration::hours(1),
	);
	let store = seeded_store(&seeded).await;
	let tokens = build_test_tokens(&server.base_url(), clock.clone()).with_store(store.clone());
	let mock = mock_token_success(
		&server,
		"{\"access_token\":\"access-new\",\"token_type\":\"bearer\",\"expires_in\":3600}",
	)
	.await;
	let token = tokens
		.get_valid_token(&default_identity())
		.await
		.expect("Expiring token should refresh successfully.");

	mock.assert_calls_async(1).await;

	assert_eq!(token.access_token.expose(), "access-new");
	assert_eq!(token.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-old"));
	assert_eq!(token.issued_at, start());
	assert_eq!(token.expires_at, start() + Duration::hours(1));
	assert_eq!(tokens.metrics().refresh_successes(), 1);

	let mirrored = store
		.get(&token_key(&default_identity()))
		.await
		.expect("Mirror lookup should succeed.")
		.expect("Refreshed token should be mirrored.");

	assert!(mirrored.contains("access-new"));
}

#[tokio::test]
async fn fresh_token_skips_token_endpoint() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	let seeded = test_token("access-fresh", Some("refresh-fresh"), start(), Duration::minutes(10));
	let tokens = build_test_tokens(&server.base_url(), clock.clone())
		.with_store(seeded_store(&seeded).await);
	let mock = mock_token_success(
		&server,
		"{\"access_token\":\"access-unused\",\"token_type\":\"bearer\",\"expires_in\":3600}",
	)
	.await;
	let token = tokens
		.get_valid_token(&default_identity())
		.await
		.expect("Fresh token should be served from the cache.");

	assert_eq!(token.access_token.expose(), "access-fresh");

	mock.assert_calls_async(0).await;

	// Five minutes and one second later the token sits inside the buffer.
	clock.advance(Duration::seconds(301));

	let token = tokens
		.get_valid_token(&default_identity())
		.await
		.expect("Token inside the buffer should refresh.");

	assert_eq!(token.access_token.expose(), "access-unused");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	let seeded = test_token("access-stale", Some("refresh-stale"), start(), Duration::seconds(30));
	let tokens = build_test_tokens(&server.base_url(), clock)
		.with_store(seeded_store(&seeded).await);
	let mock = mock_token_success(
		&server,
		"{\"access_token\":\"access-shared\",\"refresh_token\":\"refresh-shared\",\"token_type\":\"bearer\",\"expires_in\":3600}",
	)
	.await;
	let identity = default_identity();
	let (first, second): (Result<Token>, Result<Token>) =
		tokio::join!(tokens.get_valid_token(&identity), tokens.get_valid_token(&identity));
	let first = first.expect("First caller should receive the refreshed token.");
	let second = second.expect("Second caller should receive the refreshed token.");

	assert_eq!(first.access_token.expose(), "access-shared");
	assert_eq!(second.access_token.expose(), "access-shared");
	assert_eq!(second.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-shared"));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn rejected_refresh_keeps_upstream_code() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	let tokens = build_test_tokens(&server.base_url(), clock);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Token has been expired or revoked.\"}");
		})
		.await;
	let err = tokens.refresh("refresh-revoked").await.expect_err("Revoked refresh should fail.");

	mock.assert_async().await;

	match err {
		Error::Authentication { message, upstream_code } => {
			assert!(message.contains("Token has been expired or revoked."));
			assert_eq!(upstream_code.as_deref(), Some("invalid_grant"));
		},
		other => panic!("Unexpected error: {other:?}"),
	}

	assert_eq!(tokens.metrics().failures(), 1);
}

#[tokio::test]
async fn unreadable_token_endpoint_failures_become_authentication_errors() {
	let server = MockServer::start_async().await;
	let tokens = build_test_tokens(&server.base_url(), ManualClock::new(start()));
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).body("upstream unavailable");
		})
		.await;
	let err = tokens.refresh("refresh-any").await.expect_err("Unavailable endpoint should fail.");

	match err {
		Error::Authentication { message, upstream_code } => {
			assert!(message.starts_with("Failed to refresh token"), "Unexpected message: {message}");
			assert_eq!(upstream_code, None);
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn missing_tokens_require_authentication() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	let tokens = build_test_tokens(&server.base_url(), clock.clone());
	let err = tokens
		.get_valid_token(&default_identity())
		.await
		.expect_err("An empty cache should require authentication.");

	assert!(matches!(err, Error::Authentication { .. }));
	assert!(err.to_string().contains("No token available"));

	let seeded = test_token("access-only", None, start(), Duration::minutes(2));
	let tokens = build_test_tokens(&server.base_url(), clock).with_store(seeded_store(&seeded).await);
	let err = tokens
		.get_valid_token(&default_identity())
		.await
		.expect_err("An expiring token without a refresh secret should fail.");

	assert!(matches!(err, Error::Authentication { .. }));
}

#[tokio::test]
async fn code_exchange_caches_under_default_identity() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	let tokens = build_test_tokens(&server.base_url(), clock);
	let mock = mock_token_success(
		&server,
		"{\"access_token\":\"access-code\",\"refresh_token\":\"refresh-code\",\"token_type\":\"bearer\",\"expires_in\":3599,\"scope\":\"https://www.googleapis.com/auth/adwords\"}",
	)
	.await;
	let token = tokens.exchange_code("code-1").await.expect("Code exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(token.expires_at, start() + Duration::seconds(3_599));
	assert!(token.scope.contains(ADS_API_SCOPE));

	let cached = tokens
		.cached_token(&default_identity())
		.expect("Exchanged token should be cached under the default identity.");

	assert_eq!(cached.access_token.expose(), "access-code");
	assert_eq!(tokens.metrics().exchanges(), 1);
}

#[tokio::test]
async fn file_store_mirror_survives_restart_and_clear() {
	let server = MockServer::start_async().await;
	let path = temp_path("token_mirror");
	let store = Arc::new(FileStore::open(&path).expect("File store should open."));
	let tokens = build_test_tokens(&server.base_url(), ManualClock::new(start()))
		.with_store(store.clone());
	let mock = mock_token_success(
		&server,
		"{\"access_token\":\"access-durable\",\"refresh_token\":\"refresh-durable\",\"token_type\":\"bearer\",\"expires_in\":3600}",
	)
	.await;

	tokens.exchange_code("code-durable").await.expect("Code exchange should succeed.");

	let reopened = Arc::new(FileStore::open(&path).expect("File store should reopen."));
	let restarted = build_test_tokens(&server.base_url(), ManualClock::new(start()))
		.with_store(reopened.clone());
	let token = restarted
		.get_valid_token(&default_identity())
		.await
		.expect("Mirrored token should load after a restart.");

	assert_eq!(token.access_token.expose(), "access-durable");

	mock.assert_calls_async(1).await;

	restarted.clear_cache(None).await.expect("Clearing the cache should succeed.");

	assert!(restarted.cached_token(&default_identity()).is_none());
	assert_eq!(
		reopened.get(&token_key(&default_identity())).await.expect("Mirror lookup should succeed."),
		None
	);

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
	});
}

#[tokio::test]
async fn clearing_everything_drops_mirrors_never_loaded() {
	let fresh = test_token("access-mirrored", Some("refresh-mirrored"), start(), Duration::hours(1));
	let store = seeded_store(&fresh).await;
	let agency = CredentialId::new("agency-7").expect("Identity fixture should be valid.");
	let raw = serde_json::to_string(&fresh).expect("Token fixture should serialize.");

	store.set(&token_key(&agency), raw).await.expect("Seeding a second mirror should succeed.");
	store.set("unrelated", "kept".into()).await.expect("Seeding an unrelated key should succeed.");

	let tokens = build_test_tokens("https://accounts.example.com", ManualClock::new(start()))
		.with_store(store.clone());

	tokens.clear_cache(None).await.expect("Clearing the cache should succeed.");

	assert_eq!(store.keys(), ["unrelated"]);

	let err = tokens
		.get_valid_token(&default_identity())
		.await
		.expect_err("Cleared mirrors must not be served again.");

	assert!(matches!(err, Error::Authentication { .. }));
}

#[tokio::test]
async fn authorization_url_requests_offline_consent() {
	let tokens = build_test_tokens("https://accounts.example.com", ManualClock::new(start()));
	let url = tokens
		.authorization_url(Some("state-123"), &[EMAIL_SCOPE], AccessType::Offline)
		.expect("Authorization URL should build.");
	let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

	assert_eq!(url.path(), "/authorize");
	assert_eq!(pairs.get("client_id"), Some(&TEST_CLIENT_ID.into()));
	assert_eq!(
		pairs.get("redirect_uri"),
		Some(&"https://app.example.com/oauth/callback".into())
	);
	assert_eq!(pairs.get("response_type"), Some(&"code".into()));
	assert_eq!(pairs.get("access_type"), Some(&"offline".into()));
	assert_eq!(pairs.get("prompt"), Some(&"consent".into()));
	assert_eq!(pairs.get("state"), Some(&"state-123".into()));

	let scopes = pairs.get("scope").expect("Scope parameter should be present.");

	assert!(scopes.split(' ').any(|scope| scope == ADS_API_SCOPE));
	assert!(scopes.split(' ').any(|scope| scope == EMAIL_SCOPE));

	let online = tokens
		.authorization_url(None, &[], AccessType::Online)
		.expect("Authorization URL without state should build.");

	assert!(online.query_pairs().any(|(key, value)| key == "access_type" && value == "online"));
	assert!(!online.query_pairs().any(|(key, _)| key == "state"));
}

#[test]
fn generated_states_are_url_safe_and_unique() {
	let first = ReqwestTestTokens::generate_state();
	let second = ReqwestTestTokens::generate_state();

	assert_eq!(first.len(), 43);
	assert!(first.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
	assert_ne!(first, second);
}

#[tokio::test]
async fn revoke_reports_endpoint_outcome() {
	let server = MockServer::start_async().await;
	let tokens = build_test_tokens(&server.base_url(), ManualClock::new(start()));
	let accepted = server
		.mock_async(|when, then| {
			when.method(POST).path("/revoke").query_param("token", "access-revoke");
			then.status(200);
		})
		.await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(POST).path("/revoke").query_param("token", "access-unknown");
			then.status(400).body("{\"error\":\"invalid_token\"}");
		})
		.await;

	assert!(tokens.revoke("access-revoke").await.expect("Revocation should complete."));
	assert!(!tokens.revoke("access-unknown").await.expect("Rejected revocation should complete."));

	accepted.assert_async().await;
	rejected.assert_async().await;
}

#[tokio::test]
async fn revoke_requires_an_endpoint() {
	let descriptor = PlatformDescriptor::builder()
		.authorization_endpoint(
			Url::parse("https://accounts.example.com/authorize")
				.expect("Authorization endpoint fixture should parse."),
		)
		.token_endpoint(
			Url::parse("https://accounts.example.com/token")
				.expect("Token endpoint fixture should parse."),
		)
		.api_base(
			Url::parse("https://ads.example.com/v17").expect("API base fixture should parse."),
		)
		.build()
		.expect("Descriptor without revocation endpoint should build.");
	let tokens: ReqwestTestTokens = TokenManager::with_http_client(
		test_config(),
		descriptor,
		test_reqwest_http_client(),
		ReqwestTransportErrorMapper,
	);
	let err = tokens.revoke("access-any").await.expect_err("Revocation should need an endpoint.");

	assert!(matches!(
		err,
		Error::Config(ConfigError::Descriptor(DescriptorError::MissingRevocationEndpoint))
	));
}
