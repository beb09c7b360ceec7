//! Client-wide error taxonomy shared by token flows, resilience layers, and API calls.
//!
//! Every failure surfaced by the crate is a variant of [`Error`]. Upstream conditions
//! (authentication, permission, validation, rate limits, quotas, partial failures, open
//! circuits, generic API failures) carry kind-specific payloads, while local problems
//! (configuration, storage, decoding) live in their own variants. [`Error::upstream_status`]
//! exposes the canonical status each variant maps to; the circuit breaker uses it as the
//! failure kind.

// self
use crate::{_prelude::*, resilience::CircuitOpen};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure while mirroring tokens.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Response body could not be decoded into the expected shape.
	#[error("Response body could not be decoded at `{path}`.", path = source.path())]
	Decode {
		/// Path-aware JSON failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the undecodable response.
		http_status: Option<u16>,
	},

	/// Credentials are missing, expired, or were rejected.
	#[error("Authentication failed: {message}")]
	Authentication {
		/// Human-readable failure summary.
		message: String,
		/// Upstream OAuth `error` code, when one was returned.
		upstream_code: Option<String>,
	},
	/// The credentials lack access to the requested resource.
	#[error("Permission denied: {message}")]
	Permission {
		/// Human-readable failure summary.
		message: String,
		/// OAuth scope the token is missing, when known.
		missing_scope: Option<String>,
	},
	/// The request was rejected as invalid.
	#[error("Validation failed: {message}")]
	Validation {
		/// Human-readable failure summary.
		message: String,
		/// Field-level failures extracted from the upstream error details.
		field_errors: Vec<FieldError>,
	},
	/// Request rate exceeded a local or upstream ceiling.
	#[error("Rate limit exceeded: {message}")]
	RateLimit {
		/// Human-readable failure summary.
		message: String,
		/// Suggested wait before retrying.
		retry_after: Option<Duration>,
		/// Whether the daily allowance (rather than a burst limit) was exhausted.
		daily_limit_exceeded: bool,
	},
	/// A hard quota ceiling would be exceeded.
	#[error("Quota exceeded: {message}")]
	Quota {
		/// Human-readable failure summary.
		message: String,
		/// Which ceiling was hit.
		kind: QuotaKind,
		/// Configured ceiling.
		limit: u64,
		/// Observed value at the time of the check.
		current: u64,
	},
	/// A bulk write partially succeeded.
	#[error("Partial failure: {message} ({success_count} succeeded, {failure_count} failed)")]
	PartialFailure {
		/// Human-readable failure summary.
		message: String,
		/// Number of operations that succeeded.
		success_count: usize,
		/// Number of operations that failed.
		failure_count: usize,
		/// Per-operation failures parsed from the upstream payload.
		failures: Vec<OperationFailure>,
	},
	/// The circuit breaker is rejecting calls until `next_retry_at`.
	#[error("Circuit breaker is open; the API is temporarily unavailable until {next_retry_at}.")]
	CircuitOpen {
		/// Instant after which a probe call is allowed.
		next_retry_at: OffsetDateTime,
	},
	/// Any other upstream or transport failure.
	#[error("API request failed: {message}")]
	Api {
		/// Human-readable failure summary.
		message: String,
		/// HTTP status code, when a response was received.
		http_status: Option<u16>,
		/// Canonical upstream status.
		upstream_status: UpstreamStatus,
		/// Upstream request identifier extracted from the error details.
		request_id: Option<String>,
	},
}
impl Error {
	/// Returns the canonical upstream status this error represents.
	///
	/// Local failures (configuration, storage, decoding, open circuits) report
	/// [`UpstreamStatus::Unknown`].
	pub fn upstream_status(&self) -> UpstreamStatus {
		match self {
			Self::Authentication { .. } => UpstreamStatus::Unauthenticated,
			Self::Permission { .. } => UpstreamStatus::PermissionDenied,
			Self::Validation { .. } => UpstreamStatus::InvalidArgument,
			Self::RateLimit { .. } | Self::Quota { .. } => UpstreamStatus::ResourceExhausted,
			Self::PartialFailure { .. } => UpstreamStatus::PartialFailure,
			Self::Api { upstream_status, .. } => upstream_status.clone(),
			Self::Storage(_) | Self::Config(_) | Self::Decode { .. } | Self::CircuitOpen { .. } =>
				UpstreamStatus::Unknown,
		}
	}

	/// Returns the HTTP status code associated with the error, when known.
	pub fn http_status(&self) -> Option<u16> {
		match self {
			Self::Authentication { .. } => Some(401),
			Self::Permission { .. } => Some(403),
			Self::Validation { .. } => Some(400),
			Self::RateLimit { .. } | Self::Quota { .. } => Some(429),
			Self::PartialFailure { .. } => Some(200),
			Self::Api { http_status, .. } | Self::Decode { http_status, .. } => *http_status,
			_ => None,
		}
	}

	pub(crate) fn authentication(message: impl Into<String>) -> Self {
		Self::Authentication { message: message.into(), upstream_code: None }
	}

	pub(crate) fn validation(message: impl Into<String>) -> Self {
		Self::Validation { message: message.into(), field_errors: Vec::new() }
	}

	pub(crate) fn unavailable(message: impl Into<String>, http_status: Option<u16>) -> Self {
		Self::Api {
			message: message.into(),
			http_status,
			upstream_status: UpstreamStatus::Unavailable,
			request_id: None,
		}
	}
}
impl From<CircuitOpen> for Error {
	fn from(open: CircuitOpen) -> Self {
		Self::CircuitOpen { next_retry_at: open.next_retry_at }
	}
}

/// Canonical upstream status codes (gRPC-style) attached to every classified failure.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UpstreamStatus {
	/// `UNAUTHENTICATED`.
	Unauthenticated,
	/// `PERMISSION_DENIED`.
	PermissionDenied,
	/// `INVALID_ARGUMENT`.
	InvalidArgument,
	/// `NOT_FOUND`.
	NotFound,
	/// `FAILED_PRECONDITION`.
	FailedPrecondition,
	/// `RESOURCE_EXHAUSTED`.
	ResourceExhausted,
	/// `ABORTED`.
	Aborted,
	/// `CANCELLED`.
	Cancelled,
	/// `INTERNAL`.
	Internal,
	/// `UNAVAILABLE`.
	Unavailable,
	/// `DEADLINE_EXCEEDED`.
	DeadlineExceeded,
	/// `PARTIAL_FAILURE`.
	PartialFailure,
	/// `UNKNOWN`; also used for local failures.
	Unknown,
	/// Any status string the client does not recognize.
	Other(String),
}
impl UpstreamStatus {
	/// Returns the wire label for the status.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Unauthenticated => "UNAUTHENTICATED",
			Self::PermissionDenied => "PERMISSION_DENIED",
			Self::InvalidArgument => "INVALID_ARGUMENT",
			Self::NotFound => "NOT_FOUND",
			Self::FailedPrecondition => "FAILED_PRECONDITION",
			Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
			Self::Aborted => "ABORTED",
			Self::Cancelled => "CANCELLED",
			Self::Internal => "INTERNAL",
			Self::Unavailable => "UNAVAILABLE",
			Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
			Self::PartialFailure => "PARTIAL_FAILURE",
			Self::Unknown => "UNKNOWN",
			Self::Other(value) => value,
		}
	}

	/// Maps an HTTP status code onto the closest upstream status.
	pub fn from_http_status(status: u16) -> Self {
		match status {
			400 => Self::InvalidArgument,
			401 => Self::Unauthenticated,
			403 => Self::PermissionDenied,
			404 => Self::NotFound,
			409 => Self::Aborted,
			412 => Self::FailedPrecondition,
			429 => Self::ResourceExhausted,
			499 => Self::Cancelled,
			501 | 500 => Self::Internal,
			503 | 502 => Self::Unavailable,
			504 => Self::DeadlineExceeded,
			code if code >= 500 => Self::Internal,
			_ => Self::Unknown,
		}
	}
}
impl From<&str> for UpstreamStatus {
	fn from(value: &str) -> Self {
		match value.trim().to_ascii_uppercase().as_str() {
			"UNAUTHENTICATED" => Self::Unauthenticated,
			"PERMISSION_DENIED" => Self::PermissionDenied,
			"INVALID_ARGUMENT" => Self::InvalidArgument,
			"NOT_FOUND" => Self::NotFound,
			"FAILED_PRECONDITION" => Self::FailedPrecondition,
			"RESOURCE_EXHAUSTED" => Self::ResourceExhausted,
			"ABORTED" => Self::Aborted,
			"CANCELLED" => Self::Cancelled,
			"INTERNAL" => Self::Internal,
			"UNAVAILABLE" => Self::Unavailable,
			"DEADLINE_EXCEEDED" => Self::DeadlineExceeded,
			"PARTIAL_FAILURE" => Self::PartialFailure,
			"UNKNOWN" | "" => Self::Unknown,
			_ => Self::Other(value.to_owned()),
		}
	}
}
impl From<String> for UpstreamStatus {
	fn from(value: String) -> Self {
		Self::from(value.as_str())
	}
}
impl From<UpstreamStatus> for String {
	fn from(status: UpstreamStatus) -> Self {
		status.as_str().to_owned()
	}
}
impl Display for UpstreamStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Ceiling kinds enforced by the rate limiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotaKind {
	/// Daily operation allowance per credential.
	DailyOperations,
	/// Serialized request body size.
	RequestSize,
	/// Operations carried by a single request.
	MutateOperations,
}
impl QuotaKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::DailyOperations => "DAILY_OPERATIONS",
			Self::RequestSize => "REQUEST_SIZE",
			Self::MutateOperations => "MUTATE_OPERATIONS",
		}
	}
}
impl Display for QuotaKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Field-level validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
	/// Dotted field path (`unknown` when the upstream omitted it).
	pub field: String,
	/// Upstream message for the field.
	pub message: String,
	/// Value that triggered the failure, when reported.
	pub trigger: Option<String>,
}

/// Failure of a single operation inside a partially failed bulk write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
	/// Index of the failing operation within its sub-request, when reported.
	pub operation_index: Option<usize>,
	/// Dotted field path (`unknown` when the upstream omitted it).
	pub field: String,
	/// Upstream message for the operation.
	pub message: String,
	/// Value that triggered the failure, when reported.
	pub trigger: Option<String>,
}

/// Configuration and validation failures raised locally.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
	/// Platform descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::config::DescriptorError),
	/// Descriptor or redirect URL cannot be handed to the OAuth client.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// An identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Scopes cannot be normalized.
	#[error("Scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
