use aws_lambda_events::apigw::ApiGatewayProxyRequestContext;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Amazon API Gateway REST API proxy integration event.
///
/// Missing fields and JSON `null` values both deserialize to the empty value.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProxyRequest {
  /// Resource path template that matched the request (e.g., `/pets/{id}`).
  #[serde(default)]
  pub resource: Option<String>,
  /// Request path.
  #[serde(default, deserialize_with = "nullable")]
  pub path: String,
  /// HTTP method. An empty method is treated as `GET`.
  #[serde(default, deserialize_with = "nullable")]
  pub http_method: String,
  /// Single-value request headers.
  #[serde(default, deserialize_with = "nullable")]
  pub headers: IndexMap<String, String>,
  /// Multi-value request headers.
  #[serde(default, deserialize_with = "nullable")]
  pub multi_value_headers: IndexMap<String, Vec<String>>,
  /// Single-value query string parameters.
  #[serde(default, deserialize_with = "nullable")]
  pub query_string_parameters: IndexMap<String, String>,
  /// Multi-value query string parameters.
  #[serde(default, deserialize_with = "nullable")]
  pub multi_value_query_string_parameters: IndexMap<String, Vec<String>>,
  /// Path parameters extracted from the matched resource template.
  #[serde(default, deserialize_with = "nullable")]
  pub path_parameters: IndexMap<String, String>,
  /// API Gateway stage variables.
  #[serde(default, deserialize_with = "nullable")]
  pub stage_variables: IndexMap<String, String>,
  /// Request context, including the caller identity, request ID, and deployment stage.
  #[serde(default, deserialize_with = "nullable")]
  pub request_context: ApiGatewayProxyRequestContext,
  /// Request body, base64-encoded if [`is_base64_encoded`](Self::is_base64_encoded) is set.
  #[serde(default, deserialize_with = "nullable")]
  pub body: String,
  /// Whether [`body`](Self::body) is base64-encoded.
  #[serde(default, deserialize_with = "nullable")]
  pub is_base64_encoded: bool,
}

/// Amazon API Gateway REST API proxy integration response.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProxyResponse {
  /// HTTP status code.
  pub status_code: i64,
  /// Last value of each response header.
  pub headers: IndexMap<String, String>,
  /// Every value of each response header, including single-valued ones.
  pub multi_value_headers: IndexMap<String, Vec<String>>,
  /// Response body, base64-encoded if [`is_base64_encoded`](Self::is_base64_encoded) is set.
  pub body: String,
  /// Whether [`body`](Self::body) is base64-encoded.
  pub is_base64_encoded: bool,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + Default,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
