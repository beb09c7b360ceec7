//! Bulk writes fanned out per resource kind.

// crates.io
use futures::future;
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	api::{
		ApiClient, classify,
		types::{MutateOperation, MutateOptions, MutateRequestBody, MutateResponse},
	},
	auth::AccountId,
	error::ConfigError,
	http::HttpTransport,
	oauth::TransportErrorMapper,
	obs::{self, CallKind, CallOutcome, CallSpan},
};

impl<C, M> ApiClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Applies `operations` to `account`, consuming one operation each.
	///
	/// Operations are grouped by [`entity`](MutateOperation::entity) in first-seen order and
	/// each group is sent to its own `{kind}:mutate` endpoint. The groups run concurrently
	/// inside a single circuit-protected call, and the combined results follow group order
	/// regardless of completion order. Every sub-request runs to completion; when several
	/// fail, the error of the earliest group is returned.
	///
	/// When [`MutateOptions::partial_failure`] is set and any group reports failed operations,
	/// the call fails with [`Error::PartialFailure`]. Otherwise the partial-failure payload is
	/// returned in [`MutateResponse::partial_failure_error`].
	pub async fn mutate(
		&self,
		account: &AccountId,
		operations: &[MutateOperation],
		options: &MutateOptions,
	) -> Result<MutateResponse> {
		const KIND: CallKind = CallKind::Mutate;

		if operations.is_empty() {
			return Ok(MutateResponse::default());
		}

		let span = CallSpan::new(KIND, "mutate");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let token = self.access_token().await?;
				let op_count = u64::try_from(operations.len()).unwrap_or(u64::MAX);

				self.rate_limiter.check_limit(&self.config.identity, op_count)?;

				let mut requests = Vec::new();

				for (entity, group) in group_by_entity(operations) {
					let body = MutateRequestBody {
						operations: group.iter().map(|op| op.to_wire()).collect(),
						partial_failure: options.partial_failure,
						validate_only: options.validate_only,
						response_content_type: options.response_content_type,
					};
					let body = serde_json::to_vec(&body).map_err(ConfigError::from)?;

					self.check_request_size(&body)?;

					let url = self.url(&format!("customers/{account}/{entity}:mutate"))?;

					requests.push((url, body));
				}

				let token = &token;
				let responses = self
					.circuit_breaker
					.execute(|| async move {
						future::join_all(requests.into_iter().map(|(url, body)| {
							self.send(KIND, Method::POST, url, Some(account), token, body)
						}))
						.await
						.into_iter()
						.collect::<Result<Vec<_>>>()
					})
					.await?;
				let responses = responses
					.iter()
					.map(classify::decode::<MutateResponse>)
					.collect::<Result<Vec<_>>>()?;

				combine(responses, options)
			})
			.await;

		obs::record_call_outcome(KIND, CallOutcome::of(&result));

		result
	}
}

/// Groups operations by entity, preserving first-seen order of entities and request order
/// within each group.
fn group_by_entity(operations: &[MutateOperation]) -> Vec<(&str, Vec<&MutateOperation>)> {
	let mut groups: Vec<(&str, Vec<&MutateOperation>)> = Vec::new();

	for op in operations {
		match groups.iter_mut().find(|(entity, _)| *entity == op.entity) {
			Some((_, group)) => group.push(op),
			None => groups.push((op.entity.as_str(), vec![op])),
		}
	}

	groups
}

fn combine(responses: Vec<MutateResponse>, options: &MutateOptions) -> Result<MutateResponse> {
	let mut combined = MutateResponse::default();

	for response in responses {
		combined.results.extend(response.results);

		if combined.partial_failure_error.is_none() {
			combined.partial_failure_error =
				response.partial_failure_error.filter(|status| status.is_failure());
		}
	}

	match &combined.partial_failure_error {
		Some(status) if options.partial_failure => {
			let failures = classify::operation_failures(status);
			let success_count =
				combined.results.iter().filter(|result| result.resource_name.is_some()).count();

			Err(Error::PartialFailure {
				message: "Some operations failed".into(),
				success_count,
				failure_count: failures.len(),
				failures,
			})
		},
		_ => Ok(combined),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::api::types::{MutateResult, RpcStatus};

	fn result(name: &str) -> MutateResult {
		MutateResult { resource_name: Some(name.into()), ..Default::default() }
	}

	#[test]
	fn groups_follow_first_seen_order() {
		let operations = [
			MutateOperation::create("campaigns", json!({ "name": "A" })),
			MutateOperation::update("adGroups", json!({ "resourceName": "customers/1/adGroups/2" })),
			MutateOperation::create("campaigns", json!({ "name": "B" })),
		];
		let groups = group_by_entity(&operations);

		assert_eq!(groups.len(), 2);
		assert_eq!(groups[0].0, "campaigns");
		assert_eq!(groups[0].1.len(), 2);
		assert_eq!(groups[0].1[1].to_wire(), json!({ "create": { "name": "B" } }));
		assert_eq!(groups[1].0, "adGroups");
	}

	#[test]
	fn partial_failures_pass_through_unless_requested() {
		let failing = MutateResponse {
			results: vec![result("customers/1/campaigns/1"), MutateResult::default()],
			partial_failure_error: Some(RpcStatus {
				code: Some(3),
				message: Some("Operation 1 failed.".into()),
				..Default::default()
			}),
		};
		let passed = combine(vec![failing.clone()], &MutateOptions::default())
			.expect("Partial failures should pass through when not requested.");

		assert_eq!(passed.results.len(), 2);
		assert!(passed.partial_failure_error.is_some());

		match combine(vec![failing], &MutateOptions::default().with_partial_failure()) {
			Err(Error::PartialFailure { success_count, failure_count, failures, .. }) => {
				assert_eq!(success_count, 1);
				assert_eq!(failure_count, 1);
				assert_eq!(failures[0].message, "Operation 1 failed.");
			},
			other => panic!("Unexpected result: {other:?}"),
		}
	}

	#[test]
	fn combined_results_follow_response_order() {
		let combined = combine(
			vec![
				MutateResponse { results: vec![result("a/1"), result("a/2")], ..Default::default() },
				MutateResponse { results: vec![result("b/1")], ..Default::default() },
			],
			&MutateOptions::default().with_partial_failure(),
		)
		.expect("Responses without failures should combine.");
		let names = combined
			.results
			.iter()
			.filter_map(|result| result.resource_name.as_deref())
			.collect::<Vec<_>>();

		assert_eq!(names, ["a/1", "a/2", "b/1"]);
		assert!(combined.partial_failure_error.is_none());
	}
}
