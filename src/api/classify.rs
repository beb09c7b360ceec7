//! Maps API responses onto the crate error taxonomy.
//!
//! The upstream `error.status` label decides the variant. Bodies without one fall back to
//! the HTTP status, so a bare `503` still reaches the circuit breaker as `UNAVAILABLE`.

// crates.io
use oauth2::HttpResponse;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	api::types::RpcStatus,
	error::{FieldError, OperationFailure, UpstreamStatus},
};

const BODY_PREVIEW_LIMIT: usize = 256;

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
	#[serde(default)]
	error: Option<RpcStatus>,
}

/// Classifies a non-2xx response.
///
/// `retry_after` is the response's `Retry-After` hint and only applies to
/// `RESOURCE_EXHAUSTED` failures.
pub fn classify_response(status: u16, retry_after: Option<Duration>, body: &[u8]) -> Error {
	let rpc = serde_json::from_slice::<ErrorEnvelope>(body).ok().and_then(|envelope| envelope.error);
	let upstream_status = rpc
		.as_ref()
		.and_then(|rpc| rpc.status.as_deref())
		.map(UpstreamStatus::from)
		.unwrap_or_else(|| UpstreamStatus::from_http_status(status));
	let message = rpc
		.as_ref()
		.and_then(|rpc| rpc.message.clone())
		.or_else(|| body_preview(body))
		.unwrap_or_else(|| "Unknown error".into());

	match upstream_status {
		UpstreamStatus::Unauthenticated => Error::Authentication {
			message,
			upstream_code: rpc.as_ref().and_then(|rpc| rpc.errors().find_map(|entry| entry.code())),
		},
		UpstreamStatus::PermissionDenied => Error::Permission { message, missing_scope: None },
		UpstreamStatus::InvalidArgument => {
			let field_errors = rpc.as_ref().map(field_errors).unwrap_or_default();

			Error::Validation { message, field_errors }
		},
		UpstreamStatus::ResourceExhausted => {
			let daily_limit_exceeded = message.to_ascii_lowercase().contains("daily");

			Error::RateLimit { message, retry_after, daily_limit_exceeded }
		},
		upstream_status => Error::Api {
			message,
			http_status: Some(status),
			upstream_status,
			request_id: rpc.as_ref().and_then(|rpc| rpc.request_id().map(ToOwned::to_owned)),
		},
	}
}

/// Extracts field-level failures from a validation error.
pub fn field_errors(rpc: &RpcStatus) -> Vec<FieldError> {
	rpc.errors()
		.map(|entry| FieldError {
			field: entry.field_path().unwrap_or_else(|| "unknown".into()),
			message: entry.message.clone().unwrap_or_default(),
			trigger: entry.trigger_text(),
		})
		.collect()
}

/// Extracts per-operation failures from a partial-failure payload.
///
/// Payloads without structured entries still yield one failure carrying the top-level
/// message, so a reported partial failure never looks empty.
pub fn operation_failures(rpc: &RpcStatus) -> Vec<OperationFailure> {
	let failures = rpc
		.errors()
		.map(|entry| OperationFailure {
			operation_index: entry.operation_index(),
			field: entry.field_path().unwrap_or_default(),
			message: entry.message.clone().unwrap_or_default(),
			trigger: entry.trigger_text(),
		})
		.collect::<Vec<_>>();

	if !failures.is_empty() {
		return failures;
	}

	vec![OperationFailure {
		operation_index: None,
		field: String::new(),
		message: rpc.message.clone().unwrap_or_else(|| "Unknown error".into()),
		trigger: None,
	}]
}

/// Decodes a successful response, naming the failing JSON path on error.
pub(crate) fn decode<T>(response: &HttpResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	let body = response.body().as_slice();
	let body = if body.iter().all(u8::is_ascii_whitespace) { b"{}".as_slice() } else { body };
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::Decode { source, http_status: Some(response.status().as_u16()) })
}

fn body_preview(body: &[u8]) -> Option<String> {
	let text = String::from_utf8_lossy(body);
	let text = text.trim();

	if text.is_empty() {
		return None;
	}

	Some(text.chars().take(BODY_PREVIEW_LIMIT).collect())
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn body(value: serde_json::Value) -> Vec<u8> {
		serde_json::to_vec(&value).expect("Error fixture should serialize.")
	}

	#[test]
	fn upstream_status_selects_variant() {
		let err = classify_response(
			401,
			None,
			&body(json!({ "error": {
				"code": 401,
				"message": "Request had invalid authentication credentials.",
				"status": "UNAUTHENTICATED",
				"details": [{ "errors": [{ "errorCode": { "authenticationError": "OAUTH_TOKEN_EXPIRED" } }] }]
			}})),
		);

		match err {
			Error::Authentication { upstream_code, .. } =>
				assert_eq!(upstream_code.as_deref(), Some("OAUTH_TOKEN_EXPIRED")),
			other => panic!("Unexpected error: {other:?}"),
		}

		let err = classify_response(
			403,
			None,
			&body(json!({ "error": { "message": "Denied.", "status": "PERMISSION_DENIED" } })),
		);

		assert!(matches!(err, Error::Permission { .. }));
	}

	#[test]
	fn invalid_argument_carries_field_errors() {
		let err = classify_response(
			400,
			None,
			&body(json!({ "error": {
				"message": "Request contains an invalid argument.",
				"status": "INVALID_ARGUMENT",
				"details": [{ "errors": [{
					"message": "The field is required.",
					"trigger": { "stringValue": "" },
					"location": { "fieldPathElements": [
						{ "fieldName": "operations", "index": 0 },
						{ "fieldName": "create" },
						{ "fieldName": "name" }
					]}
				}]}]
			}})),
		);

		match err {
			Error::Validation { field_errors, .. } => {
				assert_eq!(field_errors.len(), 1);
				assert_eq!(field_errors[0].field, "operations.create.name");
				assert_eq!(field_errors[0].message, "The field is required.");
				assert_eq!(field_errors[0].trigger.as_deref(), Some(""));
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn resource_exhausted_flags_daily_limits() {
		let err = classify_response(
			429,
			Some(Duration::seconds(30)),
			&body(json!({ "error": {
				"message": "Too many requests. Daily quota exhausted.",
				"status": "RESOURCE_EXHAUSTED"
			}})),
		);

		match err {
			Error::RateLimit { retry_after, daily_limit_exceeded, .. } => {
				assert_eq!(retry_after, Some(Duration::seconds(30)));
				assert!(daily_limit_exceeded);
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn other_statuses_keep_request_id() {
		let err = classify_response(
			500,
			None,
			&body(json!({ "error": {
				"message": "Internal error encountered.",
				"status": "INTERNAL",
				"details": [{ "requestId": "abc-123" }]
			}})),
		);

		match err {
			Error::Api { http_status, upstream_status, request_id, .. } => {
				assert_eq!(http_status, Some(500));
				assert_eq!(upstream_status, UpstreamStatus::Internal);
				assert_eq!(request_id.as_deref(), Some("abc-123"));
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn bodies_without_status_fall_back_to_http_status() {
		let err = classify_response(503, None, b"upstream connect error");

		match err {
			Error::Api { message, upstream_status, .. } => {
				assert_eq!(upstream_status, UpstreamStatus::Unavailable);
				assert_eq!(message, "upstream connect error");
			},
			other => panic!("Unexpected error: {other:?}"),
		}

		assert!(matches!(classify_response(401, None, b""), Error::Authentication { .. }));
	}

	#[test]
	fn partial_failures_fall_back_to_top_level_message() {
		let rpc = RpcStatus { message: Some("Some operations failed.".into()), ..Default::default() };
		let failures = operation_failures(&rpc);

		assert_eq!(failures.len(), 1);
		assert_eq!(failures[0].message, "Some operations failed.");
		assert_eq!(failures[0].operation_index, None);
	}

	#[test]
	fn decode_names_failing_path() {
		let mut response = HttpResponse::new(br#"{"results":[{"id":"x"}],"nextPageToken":5}"#.to_vec());

		*response.status_mut() = oauth2::http::StatusCode::OK;

		let err = decode::<crate::api::SearchResponse>(&response)
			.expect_err("A numeric page token should fail to decode.");

		match err {
			Error::Decode { source, http_status } => {
				assert_eq!(source.path().to_string(), "nextPageToken");
				assert_eq!(http_status, Some(200));
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
