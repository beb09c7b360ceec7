//! Request and response shapes exchanged with the API.

// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Search request body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
	/// Query-language statement.
	pub query: String,
	/// Rows per page; the platform default applies when unset.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub page_size: Option<u32>,
	/// Continuation token from a previous page.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub page_token: Option<String>,
	/// Validates the query without executing it.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub validate_only: bool,
	/// Asks the platform to report the total row count.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub return_total_results_count: bool,
}
impl SearchQuery {
	/// Creates a query for the provided statement.
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), ..Default::default() }
	}

	/// Sets the page size.
	pub fn with_page_size(mut self, page_size: u32) -> Self {
		self.page_size = Some(page_size);

		self
	}

	/// Continues from `page_token`.
	pub fn with_page_token(mut self, page_token: impl Into<String>) -> Self {
		self.page_token = Some(page_token.into());

		self
	}

	/// Requests the total row count.
	pub fn with_total_results_count(mut self) -> Self {
		self.return_total_results_count = true;

		self
	}
}

/// One page of search results.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse<T = Value> {
	/// Rows in this page.
	#[serde(default = "Vec::new")]
	pub results: Vec<T>,
	/// Continuation token; absent on the last page.
	#[serde(default)]
	pub next_page_token: Option<String>,
	/// Total row count, when requested.
	#[serde(default)]
	pub total_results_count: Option<String>,
	/// Field mask describing the selected columns.
	#[serde(default)]
	pub field_mask: Option<String>,
}

/// What a mutate operation does to its resource.
#[derive(Clone, Debug, PartialEq)]
pub enum MutateAction {
	/// Creates the resource.
	Create(Value),
	/// Updates the listed fields of the resource.
	Update {
		/// Resource payload carrying its `resourceName`.
		resource: Value,
		/// Fields to overwrite; the platform derives the mask when empty.
		update_mask: Vec<String>,
	},
	/// Removes the resource with this name.
	Remove(String),
}

/// Single write against one resource kind.
#[derive(Clone, Debug, PartialEq)]
pub struct MutateOperation {
	/// Resource kind as it appears in mutate paths (for example `campaigns`).
	pub entity: String,
	/// Operation payload.
	pub action: MutateAction,
}
impl MutateOperation {
	/// Creates `resource` under `entity`.
	pub fn create(entity: impl Into<String>, resource: Value) -> Self {
		Self { entity: entity.into(), action: MutateAction::Create(resource) }
	}

	/// Updates `resource` under `entity`.
	pub fn update(entity: impl Into<String>, resource: Value) -> Self {
		Self {
			entity: entity.into(),
			action: MutateAction::Update { resource, update_mask: Vec::new() },
		}
	}

	/// Removes the resource named `resource_name` under `entity`.
	pub fn remove(entity: impl Into<String>, resource_name: impl Into<String>) -> Self {
		Self { entity: entity.into(), action: MutateAction::Remove(resource_name.into()) }
	}

	/// Restricts an update to `fields`. Has no effect on creates and removes.
	pub fn with_update_mask<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		if let MutateAction::Update { update_mask, .. } = &mut self.action {
			*update_mask = fields.into_iter().map(Into::into).collect();
		}

		self
	}

	pub(crate) fn to_wire(&self) -> Value {
		let mut operation = Map::new();

		match &self.action {
			MutateAction::Create(resource) => {
				operation.insert("create".into(), resource.clone());
			},
			MutateAction::Update { resource, update_mask } => {
				operation.insert("update".into(), resource.clone());

				if !update_mask.is_empty() {
					operation.insert("updateMask".into(), Value::String(update_mask.join(",")));
				}
			},
			MutateAction::Remove(resource_name) => {
				operation.insert("remove".into(), Value::String(resource_name.clone()));
			},
		}

		Value::Object(operation)
	}
}

/// Shape of mutate results returned by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseContentType {
	/// Only resource names.
	ResourceNameOnly,
	/// The full mutated resource.
	MutableResource,
}

/// Per-call mutate settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutateOptions {
	/// Lets valid operations succeed when others fail; failures surface as
	/// [`Error::PartialFailure`].
	pub partial_failure: bool,
	/// Validates without applying.
	pub validate_only: bool,
	/// Result shape; the platform default applies when unset.
	pub response_content_type: Option<ResponseContentType>,
}
impl MutateOptions {
	/// Enables partial-failure mode.
	pub fn with_partial_failure(mut self) -> Self {
		self.partial_failure = true;

		self
	}

	/// Enables validate-only mode.
	pub fn with_validate_only(mut self) -> Self {
		self.validate_only = true;

		self
	}

	/// Chooses the result shape.
	pub fn with_response_content_type(mut self, content_type: ResponseContentType) -> Self {
		self.response_content_type = Some(content_type);

		self
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MutateRequestBody {
	pub(crate) operations: Vec<Value>,
	#[serde(skip_serializing_if = "std::ops::Not::not")]
	pub(crate) partial_failure: bool,
	#[serde(skip_serializing_if = "std::ops::Not::not")]
	pub(crate) validate_only: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub(crate) response_content_type: Option<ResponseContentType>,
}

/// Result of one mutate operation.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateResult {
	/// Name of the written resource; absent for operations that failed in partial-failure mode.
	#[serde(default)]
	pub resource_name: Option<String>,
	/// Remaining fields, such as the mutated resource itself.
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}

/// Combined mutate response.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateResponse {
	/// Results in request order, grouped by resource kind in first-seen order.
	#[serde(default)]
	pub results: Vec<MutateResult>,
	/// Partial-failure payload, passed through when partial-failure mode is off.
	#[serde(default)]
	pub partial_failure_error: Option<RpcStatus>,
}

/// Structured error status carried by error bodies and partial-failure payloads.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcStatus {
	/// Numeric status code.
	#[serde(default)]
	pub code: Option<i64>,
	/// Human-readable summary.
	#[serde(default)]
	pub message: Option<String>,
	/// Canonical status label such as `INVALID_ARGUMENT`.
	#[serde(default)]
	pub status: Option<String>,
	/// Typed details.
	#[serde(default)]
	pub details: Vec<ErrorDetail>,
}
impl RpcStatus {
	/// Returns `true` when the status reports a failure.
	pub fn is_failure(&self) -> bool {
		if self.code == Some(0) {
			return false;
		}

		self.code.is_some() || self.message.is_some() || !self.details.is_empty()
	}

	/// Returns the first upstream request identifier found in the details.
	pub fn request_id(&self) -> Option<&str> {
		self.details.iter().find_map(|detail| detail.request_id.as_deref())
	}

	/// Iterates over every error entry across all details.
	pub fn errors(&self) -> impl Iterator<Item = &ErrorEntry> {
		self.details.iter().flat_map(|detail| detail.errors.iter())
	}
}

/// One typed detail of an [`RpcStatus`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
	/// Detail type URL.
	#[serde(default, rename = "@type")]
	pub type_url: Option<String>,
	/// Upstream request identifier.
	#[serde(default)]
	pub request_id: Option<String>,
	/// Individual failures.
	#[serde(default)]
	pub errors: Vec<ErrorEntry>,
}

/// One failure inside an [`ErrorDetail`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
	/// Error code object such as `{"fieldError": "REQUIRED"}`.
	#[serde(default)]
	pub error_code: Option<Map<String, Value>>,
	/// Human-readable message.
	#[serde(default)]
	pub message: Option<String>,
	/// Value that triggered the failure, such as `{"stringValue": "x"}`.
	#[serde(default)]
	pub trigger: Option<Value>,
	/// Where in the request the failure occurred.
	#[serde(default)]
	pub location: Option<ErrorLocation>,
}
impl ErrorEntry {
	/// Dotted field path, such as `operations.create.name`.
	pub fn field_path(&self) -> Option<String> {
		let elements = &self.location.as_ref()?.field_path_elements;

		if elements.is_empty() {
			return None;
		}

		let names = elements.iter().map(|element| element.field_name.as_str()).collect::<Vec<_>>();

		Some(names.join("."))
	}

	/// Index of the failing operation, taken from the `operations` path element.
	pub fn operation_index(&self) -> Option<usize> {
		self.location
			.as_ref()?
			.field_path_elements
			.iter()
			.find(|element| element.field_name == "operations")
			.and_then(|element| element.index)
	}

	/// Trigger value rendered as text.
	pub fn trigger_text(&self) -> Option<String> {
		match self.trigger.as_ref()? {
			Value::Object(map) => map.values().next().map(value_text),
			other => Some(value_text(other)),
		}
	}

	/// First error code value, such as `REQUIRED`.
	pub fn code(&self) -> Option<String> {
		self.error_code.as_ref()?.values().next().map(value_text)
	}
}

/// Location of an [`ErrorEntry`] inside the request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLocation {
	/// Path from the request root to the failing field.
	#[serde(default)]
	pub field_path_elements: Vec<FieldPathElement>,
}

/// One segment of an [`ErrorLocation`] path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPathElement {
	/// Field name.
	pub field_name: String,
	/// Index into a repeated field.
	#[serde(default)]
	pub index: Option<usize>,
}

/// Accessible-account listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccessibleAccounts {
	#[serde(default)]
	pub(crate) resource_names: Vec<String>,
}

fn value_text(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		other => other.to_string(),
	}
}
