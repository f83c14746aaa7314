use crate::HandlerError;

use lambda_gateway::{Handler, Method, NotFoundHandler, Request, ResponseWriter, StatusCode};
use serde::Serialize;

use std::collections::BTreeMap;
use std::io::{Read, Write};

/// 1x1 transparent PNG.
pub const PIXEL_PNG: &[u8] = &[
  0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
  0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
  0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
  0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
  0x42, 0x60, 0x82,
];

/// JSON description of a request, as returned by `/echo`.
#[derive(Debug, Serialize)]
pub struct EchoResponse<'a> {
  pub method: &'a str,
  pub url: String,
  pub request_uri: &'a str,
  pub host: &'a str,
  pub remote_addr: &'a str,
  pub stage: Option<&'a str>,
  pub headers: BTreeMap<&'a str, &'a [String]>,
  pub query: BTreeMap<String, Vec<String>>,
  pub body: String,
}

pub struct EchoApiHandler {
  // Store any handler state (e.g., DB client) here.
  _state: (),
}

impl EchoApiHandler {
  pub fn new(state: ()) -> Self {
    Self { _state: state }
  }

  fn index(
    &self,
    response: &mut dyn ResponseWriter,
    request: &Request,
  ) -> Result<(), HandlerError> {
    require_get(request)?;
    response
      .headers_mut()
      .set("Content-Type", "text/plain; charset=utf-8");
    response
      .write_all(b"hello world\n")
      .map_err(HandlerError::Write)
  }

  fn echo(
    &self,
    response: &mut dyn ResponseWriter,
    mut request: Request,
  ) -> Result<(), HandlerError> {
    let mut body = Vec::new();
    request
      .body_mut()
      .read_to_end(&mut body)
      .map_err(HandlerError::BodyRead)?;

    let query = request
      .query()
      .iter()
      .map(|(name, values)| (name.to_owned(), values.to_vec()))
      .collect();
    let echo = EchoResponse {
      method: request.method().as_str(),
      url: request.url().to_string(),
      request_uri: request.request_uri(),
      host: request.host(),
      remote_addr: request.remote_addr(),
      stage: request
        .gateway_event()
        .request_context
        .stage
        .as_deref(),
      headers: request.headers().iter().collect(),
      query,
      body: String::from_utf8_lossy(&body).into_owned(),
    };
    let json = serde_json::to_vec(&echo).map_err(HandlerError::ToJson)?;

    response
      .headers_mut()
      .set("Content-Type", "application/json");
    response.write_header(StatusCode::OK);
    response.write_all(&json).map_err(HandlerError::Write)
  }

  fn pixel(
    &self,
    response: &mut dyn ResponseWriter,
    request: &Request,
  ) -> Result<(), HandlerError> {
    require_get(request)?;
    response.headers_mut().set("Content-Type", "image/png");
    response
      .headers_mut()
      .set("Cache-Control", "public, max-age=86400");
    response.write_all(PIXEL_PNG).map_err(HandlerError::Write)
  }
}

impl Handler for EchoApiHandler {
  fn serve_http(&self, response: &mut dyn ResponseWriter, request: Request) {
    let path = request.url().path().to_owned();
    let result = match path.as_str() {
      "/" => self.index(response, &request),
      "/echo" => self.echo(response, request),
      "/pixel.png" => self.pixel(response, &request),
      _ => {
        NotFoundHandler.serve_http(response, request);
        Ok(())
      }
    };

    if let Err(err) = result {
      err.respond(response);
    }
  }
}

fn require_get(request: &Request) -> Result<(), HandlerError> {
  let method = request.method();
  if method == Method::GET || method == Method::HEAD {
    Ok(())
  } else {
    Err(HandlerError::MethodNotAllowed(method.clone()))
  }
}
