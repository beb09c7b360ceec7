//! Authorization-code exchange.

// self
use crate::{
	_prelude::*,
	auth::{CredentialId, Token},
	flows::{TokenManager, into_authentication},
	http::HttpTransport,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges an authorization `code` and caches the token under the configured identity.
	pub async fn exchange_code(&self, code: &str) -> Result<Token> {
		let identity = self.config().identity.clone();

		self.exchange_code_for(&identity, code).await
	}

	/// Exchanges an authorization `code` and caches the token under `identity`.
	pub async fn exchange_code_for(&self, identity: &CredentialId, code: &str) -> Result<Token> {
		const KIND: CallKind = CallKind::ExchangeCode;

		let span = CallSpan::new(KIND, "exchange_code_for");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let token = self
					.facade()?
					.exchange_code(code, self.now())
					.await
					.map_err(into_authentication("Failed to exchange code"))?;

				self.store_token(identity, token).await
			})
			.await;

		match &result {
			Ok(_) => self.metrics().record_exchange(),
			Err(_) => self.metrics().record_failure(),
		}

		obs::record_call_outcome(KIND, CallOutcome::of(&result));

		result
	}
}
