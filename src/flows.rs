//! OAuth token lifecycle: consent URLs, code exchange, cached refresh, and revocation.

pub mod authorize;
pub mod exchange;
pub mod refresh;
pub mod revoke;

mod metrics;

pub use authorize::*;
pub use metrics::TokenMetrics;

// self
use crate::{
	_prelude::*,
	auth::{CredentialId, Token},
	clock::{self, Clock},
	config::{ClientConfig, PlatformDescriptor},
	http::HttpTransport,
	oauth::{BasicFacade, TransportErrorMapper},
	store::{self, KeyValueStore, StoreError},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Tokens expiring within this buffer are refreshed before use.
pub const EXPIRY_BUFFER: Duration = Duration::minutes(5);

#[cfg(feature = "reqwest")]
/// Token manager specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenManager = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Acquires, caches, and refreshes access tokens per credential identity.
///
/// At most one token is cached per identity. Every successful exchange or refresh replaces
/// it, and the replacement is mirrored to the injected [`KeyValueStore`] when one is set.
/// Concurrent refreshes for the same identity collapse onto a single token endpoint call.
pub struct TokenManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: ClientConfig,
	descriptor: PlatformDescriptor,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	store: Option<Arc<dyn KeyValueStore>>,
	clock: Arc<dyn Clock>,
	metrics: Arc<TokenMetrics>,
	cache: RwLock<HashMap<CredentialId, Token>>,
	flow_guards: Mutex<HashMap<CredentialId, Arc<AsyncMutex<()>>>>,
}
impl<C, M> TokenManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a manager that reuses the caller-provided transport and mapper pair.
	pub fn with_http_client(
		config: ClientConfig,
		descriptor: PlatformDescriptor,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			config,
			descriptor,
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store: None,
			clock: clock::system(),
			metrics: Default::default(),
			cache: Default::default(),
			flow_guards: Default::default(),
		}
	}

	/// Mirrors cached tokens into `store` and consults it on cache misses.
	pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Replaces the clock used for issue and expiry instants.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Platform descriptor.
	pub fn descriptor(&self) -> &PlatformDescriptor {
		&self.descriptor
	}

	/// Exchange and refresh counters.
	pub fn metrics(&self) -> &TokenMetrics {
		&self.metrics
	}

	/// Returns the in-memory token cached for `identity` without refreshing it.
	pub fn cached_token(&self, identity: &CredentialId) -> Option<Token> {
		self.cache.read().get(identity).cloned()
	}

	/// Drops the cached token of `identity`, or every cached token when `None`, together with
	/// their durable mirrors.
	///
	/// Clearing everything also removes mirrored tokens that were never loaded into memory.
	pub async fn clear_cache(&self, identity: Option<&CredentialId>) -> Result<()> {
		let removed = match identity {
			Some(identity) => {
				self.cache.write().remove(identity);

				vec![store::token_key(identity)]
			},
			None => {
				let mut keys = self
					.cache
					.write()
					.drain()
					.map(|(identity, _)| store::token_key(&identity))
					.collect::<Vec<_>>();

				if let Some(store) = self.store.as_ref() {
					keys.extend(store.list_keys(store::TOKEN_KEY_PREFIX).await?);
				}

				keys.sort();
				keys.dedup();

				keys
			},
		};

		if let Some(store) = self.store.as_ref() {
			for key in removed {
				store.remove(&key).await?;
			}
		}

		Ok(())
	}

	pub(crate) fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}

	pub(crate) fn http_client(&self) -> &C {
		&self.http_client
	}

	pub(crate) fn transport_mapper(&self) -> &M {
		&self.transport_mapper
	}

	pub(crate) fn facade(&self) -> Result<BasicFacade<C, M>> {
		BasicFacade::new(
			&self.config.client_id,
			&self.config.client_secret,
			&self.descriptor.endpoints.token,
			&self.config.redirect_uri,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)
	}

	pub(crate) fn flow_guard(&self, identity: &CredentialId) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flow_guards.lock();

		guards.entry(identity.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Looks up the token for `identity`, falling back to the durable mirror.
	pub(crate) async fn load_token(&self, identity: &CredentialId) -> Result<Option<Token>> {
		if let Some(token) = self.cached_token(identity) {
			return Ok(Some(token));
		}

		let Some(store) = self.store.as_ref() else {
			return Ok(None);
		};
		let Some(raw) = store.get(&store::token_key(identity)).await? else {
			return Ok(None);
		};
		let token = serde_json::from_str::<Token>(&raw).map_err(|e| StoreError::Serialization {
			message: format!("Failed to decode mirrored token for {identity}: {e}"),
		})?;

		self.cache.write().insert(identity.clone(), token.clone());

		Ok(Some(token))
	}

	/// Replaces the cached token of `identity` and mirrors it.
	pub(crate) async fn store_token(&self, identity: &CredentialId, token: Token) -> Result<Token> {
		self.cache.write().insert(identity.clone(), token.clone());

		if let Some(store) = self.store.as_ref() {
			let raw = serde_json::to_string(&token).map_err(|e| StoreError::Serialization {
				message: format!("Failed to encode token for {identity}: {e}"),
			})?;

			store.set(&store::token_key(identity), raw).await?;
		}

		Ok(token)
	}
}
#[cfg(feature = "reqwest")]
impl TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a manager with its own reqwest transport honoring the configured timeout.
	pub fn new(config: ClientConfig, descriptor: PlatformDescriptor) -> Result<Self> {
		let http_client = ReqwestHttpClient::new(config.request_timeout())?;

		Ok(Self::with_http_client(config, descriptor, http_client, ReqwestTransportErrorMapper))
	}
}
impl<C, M> Debug for TokenManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("config", &self.config)
			.field("descriptor", &self.descriptor)
			.field("cached_identities", &self.cache.read().len())
			.field("store_set", &self.store.is_some())
			.finish()
	}
}

/// Wraps token endpoint failures as authentication errors, passing existing ones through.
pub(crate) fn into_authentication(context: &'static str) -> impl Fn(Error) -> Error {
	move |err| match err {
		Error::Authentication { .. } => err,
		other => Error::Authentication { message: format!("{context}: {other}"), upstream_code: None },
	}
}
