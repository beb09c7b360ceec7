//! Consent URL construction and CSRF state generation.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	error::ConfigError,
	flows::TokenManager,
	http::HttpTransport,
	oauth::TransportErrorMapper,
};

const STATE_BYTES: usize = 32;

/// Whether the consent grants a refresh token (`offline`) or only an access token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
	/// Request a refresh token alongside the access token.
	#[default]
	Offline,
	/// Request an access token only.
	Online,
}
impl AccessType {
	/// Returns the query-string value.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Offline => "offline",
			Self::Online => "online",
		}
	}
}

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the consent URL the user is redirected to.
	///
	/// The platform scope is always requested; `extra_scopes` are added to it. `prompt=consent`
	/// is always set so the platform re-issues a refresh token.
	pub fn authorization_url(
		&self,
		state: Option<&str>,
		extra_scopes: &[&str],
		access_type: AccessType,
	) -> Result<Url> {
		let scope = ScopeSet::new(
			self.descriptor().scope.iter().chain(extra_scopes.iter().copied()),
		)
		.map_err(ConfigError::from)?;
		let mut url = self.descriptor().endpoints.authorization.clone();

		{
			let mut query = url.query_pairs_mut();

			query
				.append_pair("client_id", &self.config().client_id)
				.append_pair("redirect_uri", self.config().redirect_uri.as_str())
				.append_pair("response_type", "code")
				.append_pair("scope", &scope.normalized())
				.append_pair("access_type", access_type.as_str())
				.append_pair("prompt", "consent");

			if let Some(state) = state {
				query.append_pair("state", state);
			}
		}

		Ok(url)
	}

	/// Returns a random, URL-safe CSRF state value.
	pub fn generate_state() -> String {
		let mut bytes = [0_u8; STATE_BYTES];

		rand::rng().fill_bytes(&mut bytes);

		URL_SAFE_NO_PAD.encode(bytes)
	}
}
