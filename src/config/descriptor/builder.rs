// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	config::{PlatformDescriptor, PlatformEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum DescriptorError {
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// API base is required.
	#[error("Missing API base URL.")]
	MissingApiBase,
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Token revocation was requested but no revocation endpoint is configured.
	#[error("Missing revocation endpoint.")]
	MissingRevocationEndpoint,
	/// A URL could not be parsed or joined.
	#[error("Invalid URL: {message}.")]
	InvalidUrl {
		/// Parser message.
		message: String,
	},
}

/// Builder for [`PlatformDescriptor`] values.
#[derive(Debug, Default)]
pub struct PlatformDescriptorBuilder {
	authorization_endpoint: Option<Url>,
	token_endpoint: Option<Url>,
	revocation_endpoint: Option<Url>,
	api_base: Option<Url>,
	scope: Option<ScopeSet>,
}
impl PlatformDescriptorBuilder {
	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the optional revocation endpoint.
	pub fn revocation_endpoint(mut self, url: Url) -> Self {
		self.revocation_endpoint = Some(url);

		self
	}

	/// Sets the versioned API root.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Overrides the platform scope (defaults to the advertising API scope).
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<PlatformDescriptor, DescriptorError> {
		let authorization =
			self.authorization_endpoint.ok_or(DescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(DescriptorError::MissingTokenEndpoint)?;
		let api_base = self.api_base.ok_or(DescriptorError::MissingApiBase)?;
		let descriptor = PlatformDescriptor {
			endpoints: PlatformEndpoints {
				authorization,
				token,
				revocation: self.revocation_endpoint,
				api_base,
			},
			scope: self.scope.unwrap_or_else(ScopeSet::ads_api),
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl PlatformDescriptor {
	fn validate(&self) -> Result<(), DescriptorError> {
		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("api", &self.endpoints.api_base)?;

		if let Some(revocation) = self.endpoints.revocation.as_ref() {
			validate_endpoint("revocation", revocation)?;
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), DescriptorError> {
	let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

	match url.scheme() {
		"https" => Ok(()),
		"http" if loopback => Ok(()),
		_ => Err(DescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("URL fixture should parse.")
	}

	#[test]
	fn builder_requires_core_endpoints() {
		let err = PlatformDescriptor::builder()
			.token_endpoint(url("https://example.com/token"))
			.api_base(url("https://example.com/v1"))
			.build()
			.expect_err("Missing authorization endpoint must be rejected.");

		assert_eq!(err, DescriptorError::MissingAuthorizationEndpoint);
	}

	#[test]
	fn insecure_endpoints_are_rejected_except_loopback() {
		let err = PlatformDescriptor::builder()
			.authorization_endpoint(url("https://example.com/auth"))
			.token_endpoint(url("http://example.com/token"))
			.api_base(url("https://example.com/v1"))
			.build()
			.expect_err("Plain HTTP token endpoint must be rejected.");

		assert!(matches!(err, DescriptorError::InsecureEndpoint { endpoint: "token", .. }));

		PlatformDescriptor::builder()
			.authorization_endpoint(url("http://127.0.0.1:8080/auth"))
			.token_endpoint(url("http://localhost:8080/token"))
			.api_base(url("http://127.0.0.1:8080/v17"))
			.build()
			.expect("Loopback HTTP endpoints should be accepted for local testing.");
	}
}
