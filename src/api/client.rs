//! [`ApiClient`] construction, the shared request pipeline, and the single-page calls.

// crates.io
use oauth2::{
	HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	api::{
		classify,
		types::{AccessibleAccounts, SearchQuery, SearchResponse},
	},
	auth::{AccountId, Token},
	config::{ClientConfig, PlatformDescriptor},
	error::ConfigError,
	flows::TokenManager,
	http::{self, HttpTransport},
	oauth::TransportErrorMapper,
	obs::{self, CallKind, CallOutcome, CallSpan},
	resilience::{
		CircuitBreaker, CircuitBreakerConfig, CircuitMetrics, RateLimitConfig, RateLimiter,
		UsageStats,
	},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

const DEVELOPER_TOKEN_HEADER: &str = "developer-token";
const LOGIN_CUSTOMER_ID_HEADER: &str = "login-customer-id";

#[cfg(feature = "reqwest")]
/// API client specialized for the crate's default reqwest transport stack.
pub type ReqwestApiClient = ApiClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Point-in-time view of the client's collaborators.
#[derive(Clone, Debug, Serialize)]
pub struct HealthStatus {
	/// Whether a token is cached for the configured identity.
	pub authenticated: bool,
	/// Daily usage of the configured identity.
	pub rate_limiter: UsageStats,
	/// Circuit breaker metrics.
	pub circuit_breaker: CircuitMetrics,
}

/// Advertising API client composing the token manager, rate limiter, and circuit breaker.
///
/// The three collaborators are shared through [`Arc`], so several clients (or a client and
/// a background refresher) can observe the same quota and circuit state.
pub struct ApiClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) config: ClientConfig,
	pub(crate) descriptor: PlatformDescriptor,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	tokens: Arc<TokenManager<C, M>>,
	pub(crate) rate_limiter: Arc<RateLimiter>,
	pub(crate) circuit_breaker: Arc<CircuitBreaker>,
}
impl<C, M> ApiClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client over the caller-provided transport and mapper.
	///
	/// A token manager sharing the same transport is created, along with a rate limiter and
	/// circuit breaker using default settings. Replace them with the `with_*` builders.
	pub fn with_http_client(
		config: ClientConfig,
		descriptor: PlatformDescriptor,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let http_client = http_client.into();
		let transport_mapper = mapper.into();
		let tokens = TokenManager::with_http_client(
			config.clone(),
			descriptor.clone(),
			Arc::clone(&http_client),
			Arc::clone(&transport_mapper),
		);

		Self {
			config,
			descriptor,
			http_client,
			transport_mapper,
			tokens: Arc::new(tokens),
			rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
			circuit_breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
		}
	}

	/// Uses `tokens` to resolve access tokens.
	pub fn with_token_manager(mut self, tokens: Arc<TokenManager<C, M>>) -> Self {
		self.tokens = tokens;

		self
	}

	/// Uses `rate_limiter` for pre-flight checks.
	pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
		self.rate_limiter = rate_limiter;

		self
	}

	/// Uses `circuit_breaker` to guard outbound calls.
	pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
		self.circuit_breaker = circuit_breaker;

		self
	}

	/// Returns the client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Returns the platform descriptor.
	pub fn descriptor(&self) -> &PlatformDescriptor {
		&self.descriptor
	}

	/// Returns the token manager.
	pub fn token_manager(&self) -> &Arc<TokenManager<C, M>> {
		&self.tokens
	}

	/// Returns the rate limiter.
	pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
		&self.rate_limiter
	}

	/// Returns the circuit breaker.
	pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
		&self.circuit_breaker
	}

	/// Runs a query against `account`, consuming one operation.
	pub async fn search<T>(
		&self,
		account: &AccountId,
		query: &SearchQuery,
	) -> Result<SearchResponse<T>>
	where
		T: DeserializeOwned,
	{
		self.search_as(CallKind::Search, account, query).await
	}

	/// Fetches a single resource by name, such as `customers/123/campaigns/456`.
	///
	/// `fields` defaults to the resource name. Malformed names and lookups that return no row
	/// fail with [`Error::Validation`].
	pub async fn get<T>(&self, resource_name: &str, fields: Option<&[&str]>) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let resource = ResourceName::parse(resource_name)?;
		let query = SearchQuery::new(resource.query(fields)).with_page_size(1);
		let response = self.search_as::<T>(CallKind::Get, &resource.account, &query).await?;

		response
			.results
			.into_iter()
			.next()
			.ok_or_else(|| Error::validation(format!("Resource not found: {resource_name}.")))
	}

	/// Lists the resource names of every account the credentials can access.
	///
	/// The call is circuit-protected but does not consume operations.
	pub async fn list_accessible_accounts(&self) -> Result<Vec<String>> {
		const KIND: CallKind = CallKind::ListAccounts;

		let span = CallSpan::new(KIND, "list_accessible_accounts");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let token = self.access_token().await?;
				let url = self.url("customers:listAccessibleCustomers")?;
				let response = self
					.circuit_breaker
					.execute(|| self.send(KIND, Method::GET, url, None, &token, Vec::new()))
					.await?;

				classify::decode::<AccessibleAccounts>(&response).map(|body| body.resource_names)
			})
			.await;

		obs::record_call_outcome(KIND, CallOutcome::of(&result));

		result
	}

	/// Reports cached-token presence, daily usage, and circuit metrics.
	pub fn health_status(&self) -> HealthStatus {
		HealthStatus {
			authenticated: self.tokens.cached_token(&self.config.identity).is_some(),
			rate_limiter: self.rate_limiter.usage_stats(&self.config.identity),
			circuit_breaker: self.circuit_breaker.metrics(),
		}
	}

	pub(crate) async fn search_as<T>(
		&self,
		kind: CallKind,
		account: &AccountId,
		query: &SearchQuery,
	) -> Result<SearchResponse<T>>
	where
		T: DeserializeOwned,
	{
		let span = CallSpan::new(kind, "search");

		obs::record_call_outcome(kind, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let token = self.access_token().await?;

				self.rate_limiter.check_limit(&self.config.identity, 1)?;

				let body = serde_json::to_vec(query).map_err(ConfigError::from)?;

				self.check_request_size(&body)?;

				let url = self.url(&format!("customers/{account}/googleAds:search"))?;
				let response = self
					.circuit_breaker
					.execute(|| self.send(kind, Method::POST, url, Some(account), &token, body))
					.await?;

				classify::decode(&response)
			})
			.await;

		obs::record_call_outcome(kind, CallOutcome::of(&result));

		result
	}

	/// Resolves a valid token for the configured identity and checks its scope.
	pub(crate) async fn access_token(&self) -> Result<Token> {
		let token = self.tokens.get_valid_token(&self.config.identity).await?;

		token.ensure_scope(&self.descriptor.scope)?;

		Ok(token)
	}

	pub(crate) fn check_request_size(&self, body: &[u8]) -> Result<()> {
		self.rate_limiter.check_request_size(u64::try_from(body.len()).unwrap_or(u64::MAX))
	}

	pub(crate) fn url(&self, path: &str) -> Result<Url> {
		Ok(self.descriptor.api_url(path).map_err(ConfigError::from)?)
	}

	/// Sends one request and classifies non-2xx responses.
	pub(crate) async fn send(
		&self,
		kind: CallKind,
		method: Method,
		url: Url,
		account: Option<&AccountId>,
		token: &Token,
		body: Vec<u8>,
	) -> Result<HttpResponse> {
		let request = self.build_request(method, &url, account, token, body)?;
		let (result, meta) = http::dispatch(self.http_client.as_ref(), request).await;
		let response = result.map_err(|err| {
			self.transport_mapper.map_transport_error(kind, meta.as_ref(), err)
		})?;

		if !response.status().is_success() {
			let retry_after = meta.and_then(|meta| meta.retry_after);

			return Err(classify::classify_response(
				response.status().as_u16(),
				retry_after,
				response.body(),
			));
		}

		Ok(response)
	}

	fn build_request(
		&self,
		method: Method,
		url: &Url,
		account: Option<&AccountId>,
		token: &Token,
		body: Vec<u8>,
	) -> Result<HttpRequest> {
		let mut builder = Request::builder()
			.method(method)
			.uri(url.as_str())
			.header(DEVELOPER_TOKEN_HEADER, self.config.developer_token.as_str())
			.header(AUTHORIZATION, token.access_token.bearer())
			.header(CONTENT_TYPE, "application/json");

		if let Some(login) = self.config.login_customer_id.as_ref().or(account) {
			let login: &str = login;

			builder = builder.header(LOGIN_CUSTOMER_ID_HEADER, login);
		}

		Ok(builder.body(body).map_err(ConfigError::from)?)
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client with its own reqwest transport honoring the configured timeout.
	pub fn new(config: ClientConfig, descriptor: PlatformDescriptor) -> Result<Self> {
		let http_client = ReqwestHttpClient::new(config.request_timeout())?;

		Ok(Self::with_http_client(config, descriptor, http_client, ReqwestTransportErrorMapper))
	}
}
impl<C, M> Debug for ApiClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("config", &self.config)
			.field("descriptor", &self.descriptor)
			.field("circuit", &self.circuit_breaker.state().status)
			.finish()
	}
}

/// Resource name split into the parts a single-row lookup needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResourceName<'a> {
	pub(crate) account: AccountId,
	pub(crate) kind: &'a str,
	pub(crate) name: &'a str,
}
impl<'a> ResourceName<'a> {
	/// Parses `customers/<account>/<kind>/<id>`.
	pub(crate) fn parse(name: &'a str) -> Result<Self> {
		let malformed = || Error::validation(format!("Malformed resource name: {name}."));
		let mut parts = name.splitn(4, '/');
		let (Some("customers"), Some(account), Some(kind), Some(rest)) =
			(parts.next(), parts.next(), parts.next(), parts.next())
		else {
			return Err(malformed());
		};

		if kind.is_empty() || rest.is_empty() || name.contains('\'') {
			return Err(malformed());
		}

		let account = AccountId::new(account).map_err(|_| malformed())?;

		Ok(Self { account, kind, name })
	}

	/// Query-language resource for the path kind (`adGroups` becomes `ad_group`).
	pub(crate) fn resource(&self) -> String {
		let singular = if let Some(stem) = self.kind.strip_suffix("Criteria") {
			format!("{stem}Criterion")
		} else if let Some(stem) = self.kind.strip_suffix("ies") {
			format!("{stem}y")
		} else {
			self.kind.strip_suffix('s').unwrap_or(self.kind).to_owned()
		};
		let mut snake = String::with_capacity(singular.len() + 4);

		for ch in singular.chars() {
			if ch.is_ascii_uppercase() {
				snake.push('_');
				snake.push(ch.to_ascii_lowercase());
			} else {
				snake.push(ch);
			}
		}

		snake
	}

	/// Single-row lookup query selecting `fields` (or the resource name).
	pub(crate) fn query(&self, fields: Option<&[&str]>) -> String {
		let resource = self.resource();
		let select = match fields {
			Some(fields) if !fields.is_empty() => fields.join(", "),
			_ => format!("{resource}.resource_name"),
		};

		format!("SELECT {select} FROM {resource} WHERE {resource}.resource_name = '{}'", self.name)
	}
}
