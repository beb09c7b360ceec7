//! Token revocation.

// crates.io
use oauth2::http::{Method, Request, header::CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	config::DescriptorError,
	error::ConfigError,
	flows::TokenManager,
	http::{self, HttpTransport},
	oauth::TransportErrorMapper,
	obs::{self, CallKind, CallOutcome, CallSpan},
};

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Revokes `token` (access or refresh) at the platform.
	///
	/// Returns whether the endpoint answered with a 2xx status. Transport failures yield
	/// `Ok(false)`; only a missing revocation endpoint or an unbuildable request is an error.
	pub async fn revoke(&self, token: &str) -> Result<bool> {
		const KIND: CallKind = CallKind::RevokeToken;

		let mut url = self
			.descriptor()
			.endpoints
			.revocation
			.clone()
			.ok_or(ConfigError::from(DescriptorError::MissingRevocationEndpoint))?;

		url.query_pairs_mut().append_pair("token", token);

		let request = Request::builder()
			.method(Method::POST)
			.uri(url.as_str())
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let span = CallSpan::new(KIND, "revoke");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let (result, meta) = span.instrument(http::dispatch(self.http_client(), request)).await;
		let revoked = match result {
			Ok(response) => response.status().is_success(),
			Err(err) => {
				let err = self.transport_mapper().map_transport_error(KIND, meta.as_ref(), err);

				obs::record_call_error(KIND, &err);

				false
			},
		};

		obs::record_call_outcome(
			KIND,
			if revoked { CallOutcome::Success } else { CallOutcome::Failure },
		);

		Ok(revoked)
	}
}
