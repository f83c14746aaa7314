use lambda_gateway::{Request, ResponseWriter, StatusCode};
use log::error;

use std::io::{Read, Write};

/// Responds with the request body, preserving the request's `Content-Type` and
/// `Content-Encoding`.
pub fn mirror(response: &mut dyn ResponseWriter, mut request: Request) {
  for name in ["Content-Type", "Content-Encoding"] {
    let values = request.headers().get_all(name).to_vec();
    response.headers_mut().set_all(name, values);
  }

  let mut body = Vec::new();
  if let Err(err) = request.body_mut().read_to_end(&mut body) {
    error!("Failed to read request body: {err}");
    response.write_header(StatusCode::INTERNAL_SERVER_ERROR);
    return;
  }
  if let Err(err) = response.write_all(&body) {
    error!("Failed to write response body: {err}");
  }
}

/// Responds with a plain-text description of the request line and selected headers.
pub fn describe(response: &mut dyn ResponseWriter, request: Request) {
  let headers = request.headers();
  let result = writeln!(
    response,
    "{} {} host={} remote={} id={} stage={} trace={}",
    request.method(),
    request.request_uri(),
    request.host(),
    request.remote_addr(),
    headers.get("X-Request-Id").unwrap_or_default(),
    headers.get("X-Stage").unwrap_or_default(),
    headers.get("X-Amzn-Trace-Id").unwrap_or("-"),
  );
  if let Err(err) = result {
    error!("Failed to write response body: {err}");
  }
}
