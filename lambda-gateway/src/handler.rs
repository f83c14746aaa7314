use crate::request::Request;
use crate::response::ResponseWriter;

use http::StatusCode;
use log::error;

use std::io::Write;

/// HTTP request handler invoked once per API Gateway event.
///
/// The handler drives the [`ResponseWriter`] to completion before returning: anything written
/// after `serve_http` returns is lost. This trait is implemented for any
/// `Fn(&mut dyn ResponseWriter, Request)`, so plain functions and closures may be used directly.
///
/// # Example
///
/// ```rust
/// use lambda_gateway::{Request, ResponseWriter};
/// use std::io::Write;
///
/// fn hello(response: &mut dyn ResponseWriter, request: Request) {
///   response.headers_mut().set("Content-Type", "text/plain");
///   let _ = write!(response, "hello from {}", request.url().path());
/// }
/// ```
pub trait Handler {
  /// Respond to `request` by writing headers, a status and a body to `response`.
  fn serve_http(&self, response: &mut dyn ResponseWriter, request: Request);
}

impl<F> Handler for F
where
  F: Fn(&mut dyn ResponseWriter, Request),
{
  fn serve_http(&self, response: &mut dyn ResponseWriter, request: Request) {
    self(response, request)
  }
}

/// Convenience handler that responds to every request with `404 Not Found`.
///
/// Useful as a placeholder while wiring up a Lambda function, or as the fallback of a router.
#[derive(Clone, Copy, Debug, Default)]
pub struct NotFoundHandler;

impl Handler for NotFoundHandler {
  fn serve_http(&self, response: &mut dyn ResponseWriter, request: Request) {
    response
      .headers_mut()
      .set("Content-Type", "text/plain; charset=utf-8");
    response.headers_mut().set("X-Content-Type-Options", "nosniff");
    response.write_header(StatusCode::NOT_FOUND);
    if let Err(err) = response.write_all(b"404 page not found\n") {
      error!("Failed to write 404 response for {}: {err}", request.request_uri());
    }
  }
}
