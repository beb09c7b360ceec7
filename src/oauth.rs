//! OAuth client facade used by the token manager, plus transport error mapping shared with
//! the API client.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, Token, TokenSecret},
	error::{ConfigError, UpstreamStatus},
	http::{HttpTransport, ResponseMetadata, ResponseMetadataSlot},
	obs::CallKind,
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into taxonomy [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport during `call`.
	fn map_transport_error(
		&self,
		call: CallKind,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
///
/// Timeouts become `DEADLINE_EXCEEDED`, request construction problems become
/// [`ConfigError`]s, and everything else is reported as `UNAVAILABLE`.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		call: CallKind,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(call, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => Error::unavailable(
				format!("I/O failure during {call}: {inner}."),
				meta_status(meta),
			),
			HttpClientError::Other(message) => Error::unavailable(
				format!("HTTP client error during {call}: {message}."),
				meta_status(meta),
			),
			_ => Error::unavailable(format!("HTTP client error during {call}."), meta_status(meta)),
		}
	}
}

pub(crate) trait OAuth2Facade {
	fn exchange_code<'a, 'code>(
		&'a self,
		code: &'code str,
		issued_at: OffsetDateTime,
	) -> FacadeFuture<'a, Token>
	where
		'code: 'a;

	fn refresh_token<'a, 'refresh>(
		&'a self,
		refresh_token: &'refresh str,
		issued_at: OffsetDateTime,
	) -> FacadeFuture<'a, Token>
	where
		'refresh: 'a;
}

pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a facade that authenticates with `client_secret_post` against `token_endpoint`.
	pub(crate) fn new(
		client_id: &str,
		client_secret: &str,
		token_endpoint: &Url,
		redirect_uri: &Url,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.to_owned()))
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self { oauth_client, http_client, error_mapper })
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_code<'a, 'code>(
		&'a self,
		code: &'code str,
		issued_at: OffsetDateTime,
	) -> FacadeFuture<'a, Token>
	where
		'code: 'a,
	{
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						CallKind::ExchangeCode,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;

			map_token_response(response, None, issued_at)
		})
	}

	fn refresh_token<'a, 'refresh>(
		&'a self,
		refresh_token: &'refresh str,
		issued_at: OffsetDateTime,
	) -> FacadeFuture<'a, Token>
	where
		'refresh: 'a,
	{
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let secret = RefreshToken::new(refresh_token.to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&secret)
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						CallKind::RefreshToken,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;

			// Refresh responses usually omit the refresh token; keep the one we already hold.
			map_token_response(response, Some(TokenSecret::new(refresh_token)), issued_at)
		})
	}
}

fn map_token_response(
	response: BasicTokenResponse,
	previous_refresh: Option<TokenSecret>,
	issued_at: OffsetDateTime,
) -> Result<Token> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let scope = match response.scopes() {
		Some(scopes) =>
			ScopeSet::new(scopes.iter().map(|scope| scope.as_ref())).map_err(ConfigError::from)?,
		None => ScopeSet::default(),
	};
	let refresh = response
		.refresh_token()
		.map(|token| TokenSecret::new(token.secret().to_owned()))
		.or(previous_refresh);

	Token::builder()
		.access_token(response.access_token().secret().to_owned())
		.maybe_refresh_token(refresh)
		.scope(scope)
		.token_type(response.token_type().as_ref())
		.issued_at(issued_at)
		.expires_in(Duration::seconds(expires_in))
		.build()
		.map_err(|err| {
			Error::authentication(format!("Token endpoint response is incomplete: {err}"))
		})
}

fn map_request_error<E, M>(
	call: CallKind,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response),
		RequestTokenError::Request(error) => mapper.map_transport_error(call, meta_ref, error),
		RequestTokenError::Parse(source, _body) =>
			Error::Decode { source, http_status: meta_status(meta_ref) },
		RequestTokenError::Other(message) => Error::Api {
			message: format!("Token endpoint returned an unexpected response: {message}."),
			http_status: meta_status(meta_ref),
			upstream_status: meta_status(meta_ref)
				.map(UpstreamStatus::from_http_status)
				.unwrap_or(UpstreamStatus::Unknown),
			request_id: None,
		},
	}
}

fn map_server_response_error(response: BasicErrorResponse) -> Error {
	let code = response.error().as_ref().to_owned();
	let detail = response.error_description().cloned().unwrap_or_else(|| code.clone());

	Error::Authentication {
		message: format!("Token endpoint rejected the request: {detail}."),
		upstream_code: Some(code),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(call: CallKind, meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	let http_status = meta_status(meta).or_else(|| err.status().map(|code| code.as_u16()));

	if err.is_timeout() {
		return Error::Api {
			message: format!("Request timed out during {call}."),
			http_status,
			upstream_status: UpstreamStatus::DeadlineExceeded,
			request_id: None,
		};
	}

	Error::unavailable(format!("Network failure during {call}: {err}."), http_status)
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::http::ReqwestHttpClient;

	type ReqwestFacade = BasicFacade<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	fn facade(token_endpoint: &str) -> Result<ReqwestFacade> {
		BasicFacade::new(
			"client-id",
			"secret",
			&Url::parse(token_endpoint).expect("Token endpoint fixture should parse."),
			&Url::parse("https://app.example.com/callback").expect("Redirect fixture should parse."),
			Arc::new(ReqwestHttpClient::with_client(ReqwestClient::new())),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}

	#[test]
	fn builds_request_body_client() {
		assert!(facade("https://oauth2.example.com/token").is_ok());
	}

	#[test]
	fn server_errors_become_authentication_failures() {
		let response: BasicErrorResponse = serde_json::from_str(
			r#"{"error":"invalid_grant","error_description":"Bad Request"}"#,
		)
		.expect("OAuth error fixture should deserialize.");

		match map_server_response_error(response) {
			Error::Authentication { message, upstream_code } => {
				assert!(message.contains("Bad Request"));
				assert_eq!(upstream_code.as_deref(), Some("invalid_grant"));
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
