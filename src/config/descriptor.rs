//! Platform endpoints and the scope requested for API access.

/// Builder API for assembling platform descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::ScopeSet};

const GOOGLE_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_REVOCATION_ENDPOINT: &str = "https://oauth2.googleapis.com/revoke";
const GOOGLE_ADS_API_BASE: &str = "https://googleads.googleapis.com";

/// Endpoint set declared by a platform descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEndpoints {
	/// Consent page for the authorization-code flow.
	pub authorization: Url,
	/// Token endpoint used for exchanges and refreshes.
	pub token: Url,
	/// Optional revocation endpoint.
	pub revocation: Option<Url>,
	/// Versioned API root; resource paths are appended to it.
	pub api_base: Url,
}

/// Immutable platform descriptor consumed by the token manager and API client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
	/// Endpoint definitions.
	pub endpoints: PlatformEndpoints,
	/// Scope requested at consent time and required of API tokens.
	pub scope: ScopeSet,
}
impl PlatformDescriptor {
	/// Creates a new builder.
	pub fn builder() -> PlatformDescriptorBuilder {
		PlatformDescriptorBuilder::default()
	}

	/// Descriptor for the public advertising API at the given version (for example `v17`).
	pub fn google_ads(version: &str) -> Result<Self, DescriptorError> {
		let parse = |raw: &str| {
			Url::parse(raw).map_err(|e| DescriptorError::InvalidUrl { message: e.to_string() })
		};

		Self::builder()
			.authorization_endpoint(parse(GOOGLE_AUTHORIZATION_ENDPOINT)?)
			.token_endpoint(parse(GOOGLE_TOKEN_ENDPOINT)?)
			.revocation_endpoint(parse(GOOGLE_REVOCATION_ENDPOINT)?)
			.api_base(parse(&format!("{GOOGLE_ADS_API_BASE}/{version}"))?)
			.build()
	}

	/// Joins `path` onto the API base without dropping the version segment.
	pub fn api_url(&self, path: &str) -> Result<Url, DescriptorError> {
		let base = self.endpoints.api_base.as_str().trim_end_matches('/');

		Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))
			.map_err(|e| DescriptorError::InvalidUrl { message: e.to_string() })
	}
}
