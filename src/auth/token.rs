//! Issued OAuth token model and its builder.

pub mod secret;

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, token::secret::TokenSecret},
};

/// Errors produced by [`TokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Access token plus the metadata the client needs to decide when to refresh it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
	/// Access token secret.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the platform issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Scopes granted to the token; empty when the platform did not report them.
	#[serde(default)]
	pub scope: ScopeSet,
	/// Token type reported by the platform (normally `Bearer`).
	pub token_type: String,
	/// Instant the token was issued, per the local clock.
	pub issued_at: OffsetDateTime,
	/// Absolute expiry instant (`issued_at + expires_in`).
	pub expires_at: OffsetDateTime,
}
impl Token {
	/// Returns a builder for constructing tokens.
	pub fn builder() -> TokenBuilder {
		TokenBuilder::default()
	}

	/// Returns `true` when the token expires within `buffer` of `now`.
	pub fn expires_within(&self, now: OffsetDateTime, buffer: Duration) -> bool {
		self.expires_at - now <= buffer
	}

	/// Returns `true` when the token has expired at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}

	/// Fails with [`Error::Permission`] when the token reports scopes and `required` is not
	/// covered by them.
	pub fn ensure_scope(&self, required: &ScopeSet) -> Result<()> {
		if self.scope.is_empty() {
			return Ok(());
		}

		match self.scope.first_missing(required) {
			Some(missing) => Err(Error::Permission {
				message: format!("Token is missing the required scope `{missing}`."),
				missing_scope: Some(missing.to_owned()),
			}),
			None => Ok(()),
		}
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("scope", &self.scope)
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`Token`].
#[derive(Clone, Debug, Default)]
pub struct TokenBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	scope: ScopeSet,
	token_type: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Carries over an optional refresh secret.
	pub fn maybe_refresh_token(mut self, token: Option<TokenSecret>) -> Self {
		self.refresh_token = token;

		self
	}

	/// Sets the granted scopes.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Sets the token type.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`Token`].
	pub fn build(self) -> Result<Token, TokenBuilderError> {
		let access_token = self.access_token.ok_or(TokenBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenBuilderError::MissingExpiry),
		};

		Ok(Token {
			access_token,
			refresh_token: self.refresh_token,
			scope: self.scope,
			token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
			issued_at,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::ADS_API_SCOPE;

	fn token_at(issued: OffsetDateTime, scope: ScopeSet) -> Token {
		Token::builder()
			.access_token("access")
			.refresh_token("refresh")
			.scope(scope)
			.issued_at(issued)
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token fixture should build.")
	}

	#[test]
	fn relative_expiry_and_buffer_checks() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = token_at(issued, ScopeSet::default());

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert_eq!(token.token_type, "Bearer");
		assert!(!token.expires_within(macros::datetime!(2025-01-01 00:54 UTC), Duration::minutes(5)));
		assert!(token.expires_within(macros::datetime!(2025-01-01 00:55 UTC), Duration::minutes(5)));
		assert!(token.is_expired_at(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[test]
	fn builder_requires_access_and_expiry() {
		assert_eq!(
			Token::builder().expires_in(Duration::hours(1)).build().unwrap_err(),
			TokenBuilderError::MissingAccessToken
		);
		assert_eq!(
			Token::builder().access_token("a").build().unwrap_err(),
			TokenBuilderError::MissingExpiry
		);
	}

	#[test]
	fn ensure_scope_reports_missing_scope() {
		let now = OffsetDateTime::now_utc();
		let unscoped = token_at(now, ScopeSet::default());
		let scoped = token_at(now, ScopeSet::ads_api());
		let narrow =
			token_at(now, "email".parse().expect("Narrow scope fixture should parse."));

		unscoped.ensure_scope(&ScopeSet::ads_api()).expect("Unreported scopes are not checked.");
		scoped.ensure_scope(&ScopeSet::ads_api()).expect("Granted scope should pass.");

		let err = narrow.ensure_scope(&ScopeSet::ads_api()).expect_err("Missing scope must fail.");

		match err {
			Error::Permission { missing_scope, .. } =>
				assert_eq!(missing_scope.as_deref(), Some(ADS_API_SCOPE)),
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let token = token_at(OffsetDateTime::now_utc(), ScopeSet::default());
		let rendered = format!("{token:?}");

		assert!(!rendered.contains("access\""));
		assert!(rendered.contains("<redacted>"));
	}
}
