use crate::config::Config;
use crate::error::{format_error, EventError};
use crate::handler::Handler;
use crate::models::{GatewayProxyRequest, GatewayProxyResponse};
use crate::request::{InvocationContext, Request};
use crate::response::ResponseRecorder;

use futures::future;
use lambda_runtime::{service_fn, LambdaEvent};
use log::{error, info};

/// Translate a single API Gateway event into a [`Request`], run `handler`, and return the
/// recorded response.
///
/// If the event cannot be translated into a request, the handler is not invoked and the error is
/// returned instead.
pub fn handle_event<H>(
  context: InvocationContext,
  handler: &H,
  event: GatewayProxyRequest,
) -> Result<GatewayProxyResponse, EventError>
where
  H: Handler + ?Sized,
{
  let request = Request::from_event(context, event)?;
  info!("Handling HTTP {} {}", request.method(), request.request_uri());

  let mut recorder = ResponseRecorder::new();
  handler.serve_http(&mut recorder, request);
  Ok(recorder.finish())
}

/// Start the Lambda runtime and serve each API Gateway event with `handler`.
///
/// `host` is used as the request host whenever an event lacks a `Host` header. Events that cannot
/// be translated into a request are reported to the Lambda runtime as invocation errors.
///
/// This function only returns if the Lambda runtime fails (e.g., when it is started outside of
/// AWS Lambda).
///
/// # Example
///
/// ```rust,ignore
/// use lambda_gateway::{serve, Request, ResponseWriter};
/// use std::io::Write;
///
/// fn hello(response: &mut dyn ResponseWriter, _request: Request) {
///   let _ = response.write_all(b"hello world\n");
/// }
///
/// #[tokio::main]
/// pub async fn main() -> Result<(), lambda_runtime::Error> {
///   env_logger::init();
///
///   serve("api.example.com", hello).await
/// }
/// ```
pub async fn serve<H>(host: impl Into<String>, handler: H) -> Result<(), lambda_runtime::Error>
where
  H: Handler,
{
  let host = host.into();
  let handler = &handler;
  lambda_runtime::run(service_fn(|event: LambdaEvent<GatewayProxyRequest>| {
    let context = InvocationContext::from_lambda(host.as_str(), event.context);
    future::ready(
      handle_event(context, handler, event.payload).map_err(|err| {
        error!(
          "{}",
          format_error(&err, Some(&format!("EventError::{}", err.name())), err.backtrace())
        );
        lambda_runtime::Error::from(err)
      }),
    )
  }))
  .await
}

/// Like [`serve`], using the fallback host from `config`.
pub async fn serve_with_config<H>(config: Config, handler: H) -> Result<(), lambda_runtime::Error>
where
  H: Handler,
{
  serve(config.into_host(), handler).await
}
