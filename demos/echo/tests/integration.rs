use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use echo::echo_handler::{EchoApiHandler, PIXEL_PNG};
use echo::middleware::RequestIdMiddleware;
use lambda_gateway::{handle_event, GatewayProxyRequest, GatewayProxyResponse, InvocationContext};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn invoke(event: Value) -> GatewayProxyResponse {
  let event = serde_json::from_value::<GatewayProxyRequest>(event)
    .unwrap_or_else(|err| panic!("invalid event: {err}"));
  let handler = RequestIdMiddleware::new(EchoApiHandler::new(()));

  handle_event(InvocationContext::new("api.example.com"), &handler, event)
    .unwrap_or_else(|err| panic!("invocation failed: {err}"))
}

#[test]
fn test_index() {
  let response = invoke(json!({
    "httpMethod": "GET",
    "path": "/",
    "requestContext": {"httpMethod": "GET", "requestId": "req-1", "stage": "prod"},
  }));

  assert_eq!(response.status_code, 200);
  assert_eq!(response.body, "hello world\n");
  assert_eq!(response.headers["X-Request-Id"], "req-1");
  assert!(!response.is_base64_encoded);
}

#[test]
fn test_index_method_not_allowed() {
  let response = invoke(json!({"httpMethod": "DELETE", "path": "/"}));

  assert_eq!(response.status_code, 405);
  assert_eq!(response.headers["Allow"], "GET, HEAD");
  assert_eq!(response.body, "");
}

#[test]
fn test_echo() {
  let response = invoke(json!({
    "httpMethod": "POST",
    "path": "/echo",
    "headers": {"Content-Type": "application/json", "X-Forwarded-Proto": "https"},
    "multiValueHeaders": {"Accept": ["text/html", "application/json"]},
    "queryStringParameters": {"order": "desc"},
    "multiValueQueryStringParameters": {"tag": ["a", "b"]},
    "requestContext": {
      "httpMethod": "POST",
      "requestId": "req-2",
      "stage": "prod",
      "identity": {"sourceIp": "1.2.3.4"},
    },
    "body": r#"{"name":"Tobi"}"#,
  }));

  assert_eq!(response.status_code, 200);
  assert_eq!(response.headers["Content-Type"], "application/json");
  assert!(!response.is_base64_encoded);

  let body = serde_json::from_str::<Value>(&response.body)
    .unwrap_or_else(|err| panic!("invalid JSON response: {err}"));
  assert_eq!(
    body,
    json!({
      "method": "POST",
      "url": "https://api.example.com/echo?order=desc&tag=a&tag=b",
      "request_uri": "/echo?order=desc&tag=a&tag=b",
      "host": "api.example.com",
      "remote_addr": "1.2.3.4",
      "stage": "prod",
      "headers": {
        "Accept": ["text/html", "application/json"],
        "Content-Length": ["15"],
        "Content-Type": ["application/json"],
        "X-Forwarded-Proto": ["https"],
        "X-Request-Id": ["req-2"],
        "X-Stage": ["prod"],
      },
      "query": {"order": ["desc"], "tag": ["a", "b"]},
      "body": r#"{"name":"Tobi"}"#,
    })
  );
}

#[test]
fn test_echo_base64_body() {
  let response = invoke(json!({
    "httpMethod": "PUT",
    "path": "/echo",
    "body": "aGVsbG8gd29ybGQK",
    "isBase64Encoded": true,
  }));

  let body = serde_json::from_str::<Value>(&response.body)
    .unwrap_or_else(|err| panic!("invalid JSON response: {err}"));
  assert_eq!(body["body"], "hello world\n");
  assert_eq!(body["headers"]["Content-Length"], json!(["12"]));
}

#[test]
fn test_pixel_is_base64_encoded() {
  let response = invoke(json!({"httpMethod": "GET", "path": "/pixel.png"}));

  assert_eq!(response.status_code, 200);
  assert_eq!(response.headers["Content-Type"], "image/png");
  assert!(response.is_base64_encoded);
  assert_eq!(
    STANDARD
      .decode(&response.body)
      .unwrap_or_else(|err| panic!("invalid base64 body: {err}")),
    PIXEL_PNG
  );
}

#[test]
fn test_not_found() {
  let response = invoke(json!({"httpMethod": "GET", "path": "/pets"}));

  assert_eq!(response.status_code, 404);
  assert_eq!(response.body, "404 page not found\n");
  assert_eq!(
    response.multi_value_headers["Content-Type"],
    vec!["text/plain; charset=utf-8"]
  );
}
