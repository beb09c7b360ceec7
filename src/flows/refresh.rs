//! Cached token resolution and refresh-token exchanges.
//!
//! [`TokenManager::get_valid_token`] serves the cached token while it is more than
//! [`EXPIRY_BUFFER`] away from expiry. Otherwise it takes the identity's singleflight guard,
//! re-reads the cache (another caller may have refreshed in the meantime), and refreshes once.

// self
use crate::{
	_prelude::*,
	auth::{CredentialId, Token},
	flows::{EXPIRY_BUFFER, TokenManager, into_authentication},
	http::HttpTransport,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns a token for `identity` that stays valid for at least [`EXPIRY_BUFFER`],
	/// refreshing it when needed.
	pub async fn get_valid_token(&self, identity: &CredentialId) -> Result<Token> {
		if let Some(token) = self.fresh_token(identity).await? {
			return Ok(token);
		}

		let guard = self.flow_guard(identity);
		let _singleflight = guard.lock().await;
		let Some(current) = self.load_token(identity).await? else {
			return Err(Error::authentication("No token available. Please authenticate first."));
		};

		if !current.expires_within(self.now(), EXPIRY_BUFFER) {
			return Ok(current);
		}

		let Some(refresh_token) = current.refresh_token.as_ref() else {
			return Err(Error::authentication(
				"Token is expiring and no refresh token is available. Please re-authenticate.",
			));
		};

		self.refresh_for(identity, refresh_token.expose()).await
	}

	/// Exchanges `refresh_token` and caches the result under the configured identity.
	pub async fn refresh(&self, refresh_token: &str) -> Result<Token> {
		let identity = self.config().identity.clone();

		self.refresh_for(&identity, refresh_token).await
	}

	/// Exchanges `refresh_token` and caches the result under `identity`.
	///
	/// The new token keeps `refresh_token` when the response carries no replacement.
	pub async fn refresh_for(&self, identity: &CredentialId, refresh_token: &str) -> Result<Token> {
		const KIND: CallKind = CallKind::RefreshToken;

		let span = CallSpan::new(KIND, "refresh_for");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);
		self.metrics().record_refresh_attempt();

		let result = span
			.instrument(async move {
				let token = self
					.facade()?
					.refresh_token(refresh_token, self.now())
					.await
					.map_err(into_authentication("Failed to refresh token"))?;

				self.store_token(identity, token).await
			})
			.await;

		match &result {
			Ok(_) => self.metrics().record_refresh_success(),
			Err(_) => self.metrics().record_failure(),
		}

		obs::record_call_outcome(KIND, CallOutcome::of(&result));

		result
	}

	async fn fresh_token(&self, identity: &CredentialId) -> Result<Option<Token>> {
		let token = self.load_token(identity).await?;

		Ok(token.filter(|token| !token.expires_within(self.now(), EXPIRY_BUFFER)))
	}
}
