use lambda_gateway::error::format_error;
use lambda_gateway::{Method, ResponseWriter, StatusCode};
use log::error;
use thiserror::Error;

use std::io;

/// Echo API implementation.
pub mod echo_handler;

/// Handler middleware implementation.
pub mod middleware;

/// Example handler error type used by the API implementation.
#[derive(Debug, Error)]
pub enum HandlerError {
  #[error("failed to read request body")]
  BodyRead(#[source] io::Error),
  #[error("method `{0}` not allowed")]
  MethodNotAllowed(Method),
  #[error("failed to serialize response body to JSON")]
  ToJson(#[source] serde_json::Error),
  #[error("failed to write response body")]
  Write(#[source] io::Error),
}

impl HandlerError {
  /// HTTP status code reported to the client.
  pub fn status(&self) -> StatusCode {
    match self {
      HandlerError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
      HandlerError::BodyRead(_) | HandlerError::ToJson(_) | HandlerError::Write(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  /// Write an error response. Has no effect on the status if the handler already wrote a body.
  pub fn respond(self, response: &mut dyn ResponseWriter) {
    let status = self.status();
    error!("Responding with error status {status}: {}", format_error(&self, None, None));

    if let HandlerError::MethodNotAllowed(_) = self {
      response.headers_mut().set("Allow", "GET, HEAD");
    }
    response.write_header(status);
  }
}
