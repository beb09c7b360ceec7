//! Client configuration and platform descriptors.

pub mod descriptor;

pub use descriptor::*;

// self
use crate::{
	_prelude::*,
	auth::{AccountId, CredentialId},
};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Credentials and per-client settings, deserializable from any serde source.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: String,
	/// Developer token sent with every API request.
	pub developer_token: String,
	/// Manager account used as `login-customer-id`; the target account is used when unset.
	#[serde(default)]
	pub login_customer_id: Option<AccountId>,
	/// Redirect URI registered for the authorization-code flow.
	pub redirect_uri: Url,
	/// Identity the API client resolves tokens and rate buckets for.
	#[serde(default)]
	pub identity: CredentialId,
	/// Request timeout in seconds.
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u64,
}
impl ClientConfig {
	/// Creates a configuration with the default identity and timeout.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		developer_token: impl Into<String>,
		redirect_uri: Url,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			developer_token: developer_token.into(),
			login_customer_id: None,
			redirect_uri,
			identity: CredentialId::default(),
			request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
		}
	}

	/// Sets the manager account sent as `login-customer-id`.
	pub fn with_login_customer_id(mut self, account: AccountId) -> Self {
		self.login_customer_id = Some(account);

		self
	}

	/// Overrides the credential identity.
	pub fn with_identity(mut self, identity: CredentialId) -> Self {
		self.identity = identity;

		self
	}

	/// Overrides the request timeout.
	pub fn with_request_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.request_timeout_secs = timeout.as_secs().max(1);

		self
	}

	/// Request timeout as a [`std::time::Duration`].
	pub fn request_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.request_timeout_secs)
	}
}
impl Debug for ClientConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("developer_token", &"<redacted>")
			.field("login_customer_id", &self.login_customer_id)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("identity", &self.identity)
			.field("request_timeout_secs", &self.request_timeout_secs)
			.finish()
	}
}

fn default_request_timeout_secs() -> u64 {
	DEFAULT_REQUEST_TIMEOUT_SECS
}
