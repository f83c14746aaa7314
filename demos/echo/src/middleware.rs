use lambda_gateway::{Handler, Request, ResponseWriter};
use log::debug;

const X_REQUEST_ID: &str = "X-Request-Id";

/// Middleware that echoes the API Gateway request ID back to the client and logs each request.
///
/// Wrapping a [`Handler`] this way runs arbitrary code before the inner handler is invoked (e.g.,
/// logging, telemetry, or adding response headers).
pub struct RequestIdMiddleware<H> {
  inner: H,
}

impl<H> RequestIdMiddleware<H> {
  pub fn new(inner: H) -> Self {
    Self { inner }
  }
}

impl<H> Handler for RequestIdMiddleware<H>
where
  H: Handler,
{
  fn serve_http(&self, response: &mut dyn ResponseWriter, request: Request) {
    debug!(
      "{} {} from `{}` (host `{}`)",
      request.method(),
      request.request_uri(),
      request.remote_addr(),
      request.host()
    );

    if let Some(request_id) = request
      .headers()
      .get(X_REQUEST_ID)
      .filter(|request_id| !request_id.is_empty())
    {
      response.headers_mut().set(X_REQUEST_ID, request_id);
    }

    self.inner.serve_http(response, request)
  }
}
