use crate::error::{EventError, UrlError};
use crate::models::GatewayProxyRequest;
use crate::multimap::MultiMap;
use crate::LambdaContext;

use backtrace::Backtrace;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::uri::Authority;
use http::{Extensions, Method};
use log::trace;
use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use std::fmt;
use std::io::{self, Cursor, Read};

const CONTENT_LENGTH: &str = "Content-Length";
const HOST: &str = "Host";
const X_AMZN_TRACE_ID: &str = "X-Amzn-Trace-Id";
const X_FORWARDED_PROTO: &str = "X-Forwarded-Proto";
const X_REQUEST_ID: &str = "X-Request-Id";
const X_STAGE: &str = "X-Stage";

// Placeholder base for relative path resolution. Only the resolved path is kept.
const RESOLVE_BASE: &str = "http://gateway.invalid/";

// Bytes escaped in a request path: everything except unreserved characters and `$&+,/:;=@`.
const PATH: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'~')
  .remove(b'$')
  .remove(b'&')
  .remove(b'+')
  .remove(b',')
  .remove(b'/')
  .remove(b':')
  .remove(b';')
  .remove(b'=')
  .remove(b'@');

/// Per-invocation context used to build a [`Request`].
///
/// API Gateway does not always forward a `Host` header, so the context carries the fallback host
/// configured at startup. Arbitrary values may be attached via
/// [`extensions_mut`](Self::extensions_mut) and later retrieved from the request by handlers.
#[derive(Debug, Default)]
pub struct InvocationContext {
  host: String,
  trace_id: Option<String>,
  lambda_context: Option<LambdaContext>,
  extensions: Extensions,
}

impl InvocationContext {
  /// Construct a context with the given fallback host.
  pub fn new(host: impl Into<String>) -> Self {
    Self {
      host: host.into(),
      ..Default::default()
    }
  }

  /// Construct a context for a Lambda invocation, propagating its X-Ray trace ID (if any).
  pub fn from_lambda(host: impl Into<String>, lambda_context: LambdaContext) -> Self {
    Self {
      host: host.into(),
      trace_id: lambda_context.xray_trace_id.clone(),
      lambda_context: Some(lambda_context),
      extensions: Extensions::new(),
    }
  }

  /// Set the distributed trace ID propagated as the `X-Amzn-Trace-Id` request header.
  pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
    self.trace_id = Some(trace_id.into());
    self
  }

  /// Fallback host used when the event has no `Host` header.
  pub fn host(&self) -> &str {
    &self.host
  }

  /// Distributed trace ID, if any.
  pub fn trace_id(&self) -> Option<&str> {
    self.trace_id.as_deref()
  }

  /// Lambda function execution context, if the request came from the Lambda runtime.
  pub fn lambda_context(&self) -> Option<&LambdaContext> {
    self.lambda_context.as_ref()
  }

  /// Values attached by the caller.
  pub fn extensions(&self) -> &Extensions {
    &self.extensions
  }

  /// Mutable access to values attached by the caller.
  pub fn extensions_mut(&mut self) -> &mut Extensions {
    &mut self.extensions
  }
}

/// URL of a [`Request`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestUrl {
  scheme: String,
  host: String,
  path: String,
  raw_path: String,
  raw_query: String,
}

impl RequestUrl {
  /// Resolve `reference` against the base URL `{scheme}://{host}/`.
  ///
  /// Absolute references replace the scheme and host, and relative paths resolve against `/`. Any
  /// query or fragment in `reference` is discarded. A path that is already validly percent-encoded
  /// is kept as written; otherwise it is re-encoded from its decoded form.
  pub fn resolve(scheme: &str, host: &str, reference: &str) -> Result<Self, UrlError> {
    if reference.bytes().any(|b| b < 0x20 || b == 0x7f) {
      return Err(UrlError::ControlCharacter);
    }
    if reference.starts_with(':') {
      return Err(UrlError::MissingScheme);
    }

    let reference = reference
      .split(&['#', '?'][..])
      .next()
      .unwrap_or_default();
    validate_escapes(reference)?;

    let base = Url::parse(RESOLVE_BASE)?;
    let (scheme, host, target) = match Url::parse(reference) {
      Ok(absolute) => (
        absolute.scheme().to_owned(),
        authority(&absolute),
        absolute.path().to_owned(),
      ),
      Err(url::ParseError::RelativeUrlWithoutBase) if reference.starts_with("//") => {
        let joined = base.join(reference)?;
        (scheme.to_owned(), authority(&joined), joined.path().to_owned())
      }
      Err(url::ParseError::RelativeUrlWithoutBase) => {
        (scheme.to_owned(), host.to_owned(), reference.to_owned())
      }
      Err(err) => return Err(err.into()),
    };

    let escaped = if is_valid_encoded(&target) {
      target
    } else {
      percent_encode(&percent_decode_str(&target).collect::<Vec<_>>(), PATH).to_string()
    };
    // `escaped` needs no further encoding, so this only removes `.` and `..` segments.
    let mut resolved = base;
    resolved.set_path(&escaped);
    let raw_path = resolved.path().to_owned();
    let path = percent_decode_str(&raw_path)
      .decode_utf8_lossy()
      .into_owned();

    Ok(RequestUrl {
      scheme,
      host,
      path,
      raw_path,
      raw_query: String::new(),
    })
  }

  /// Scheme (e.g., `https`), possibly empty.
  pub fn scheme(&self) -> &str {
    &self.scheme
  }

  /// Host (and optional port), possibly empty.
  pub fn host(&self) -> &str {
    &self.host
  }

  /// Percent-decoded path. Escapes that do not decode to UTF-8 are replaced with `U+FFFD`.
  pub fn path(&self) -> &str {
    &self.path
  }

  /// Percent-encoded path.
  pub fn raw_path(&self) -> &str {
    &self.raw_path
  }

  /// Encoded query string, without the leading `?`.
  pub fn raw_query(&self) -> &str {
    &self.raw_query
  }

  /// Path and query as they appear in an HTTP request line (e.g., `/pets?order=desc`).
  pub fn request_uri(&self) -> String {
    if self.raw_query.is_empty() {
      self.raw_path.clone()
    } else {
      format!("{}?{}", self.raw_path, self.raw_query)
    }
  }
}

impl fmt::Display for RequestUrl {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if !self.scheme.is_empty() {
      write!(f, "{}:", self.scheme)?;
    }
    if !self.scheme.is_empty() || !self.host.is_empty() {
      write!(f, "//{}", self.host)?;
    }
    f.write_str(&self.request_uri())
  }
}

fn authority(url: &Url) -> String {
  match (url.host_str(), url.port()) {
    (Some(host), Some(port)) => format!("{host}:{port}"),
    (Some(host), None) => host.to_owned(),
    (None, _) => String::new(),
  }
}

// `url` leaves malformed escapes in place, but they are rejected here.
fn validate_escapes(path: &str) -> Result<(), UrlError> {
  let bytes = path.as_bytes();
  for (i, _) in path.match_indices('%') {
    let valid = bytes
      .get(i + 1..i + 3)
      .map_or(false, |hex| hex.iter().all(u8::is_ascii_hexdigit));
    if !valid {
      let end = (i + 3).min(path.len());
      return Err(UrlError::InvalidEscape(
        String::from_utf8_lossy(&bytes[i..end]).into_owned(),
      ));
    }
  }
  Ok(())
}

// Whether `path` may be kept as written rather than re-encoded: besides escapes and the bytes
// `PATH` leaves alone, sub-delimiters and brackets are accepted.
fn is_valid_encoded(path: &str) -> bool {
  path
    .bytes()
    .all(|b| b.is_ascii_alphanumeric() || b"-_.~$&+,/:;=@!'()*[]%".contains(&b))
}

/// Readable request body.
#[derive(Clone, Debug, Default)]
pub struct Body(Cursor<Vec<u8>>);

impl Body {
  /// Total length of the body in bytes, regardless of how much has been read.
  pub fn len(&self) -> usize {
    self.0.get_ref().len()
  }

  /// Whether the body is empty.
  pub fn is_empty(&self) -> bool {
    self.0.get_ref().is_empty()
  }

  /// Return the complete body, regardless of how much has been read.
  pub fn into_bytes(self) -> Vec<u8> {
    self.0.into_inner()
  }
}

impl From<Vec<u8>> for Body {
  fn from(bytes: Vec<u8>) -> Self {
    Self(Cursor::new(bytes))
  }
}

impl Read for Body {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.0.read(buf)
  }
}

/// HTTP request constructed from an API Gateway proxy event.
#[derive(Debug)]
pub struct Request {
  method: Method,
  url: RequestUrl,
  request_uri: String,
  remote_addr: String,
  headers: MultiMap,
  body: Body,
  event: GatewayProxyRequest,
  context: InvocationContext,
}

impl Request {
  /// Build a request from an API Gateway proxy event.
  ///
  /// Single-value and multi-value headers (and query parameters) are merged, with the multi-value
  /// form taking precedence. The `Host` header (or, if absent, the context's fallback host) and the
  /// `X-Forwarded-Proto` header determine the URL's host and scheme. A `Content-Length` header is
  /// added for non-empty bodies if the event has none, and the `X-Request-Id`, `X-Stage` and (when
  /// the context has a trace ID) `X-Amzn-Trace-Id` headers are always set.
  pub fn from_event(
    context: InvocationContext,
    mut event: GatewayProxyRequest,
  ) -> Result<Self, EventError> {
    trace!("Gateway event: {event:#?}");

    let mut headers = MultiMap::headers().merged(&event.headers, &event.multi_value_headers);
    let host = match headers.get(HOST) {
      Some(host) if !host.is_empty() => host.to_owned(),
      _ => context.host().to_owned(),
    };
    let scheme = headers.get(X_FORWARDED_PROTO).unwrap_or_default();

    let mut url = RequestUrl::resolve(scheme, &host, &event.path)
      .map_err(|err| EventError::PathParse(Box::new(err), Backtrace::new()))?;

    let query = MultiMap::query().merged(
      &event.query_string_parameters,
      &event.multi_value_query_string_parameters,
    );
    url.raw_query = query.to_query_string();

    let body = if event.is_base64_encoded {
      STANDARD
        .decode(event.body.as_bytes())
        .map_err(|err| EventError::BodyDecode(Box::new(err), Backtrace::new()))?
    } else {
      event.body.clone().into_bytes()
    };

    let method = if event.http_method.is_empty() {
      Method::GET
    } else {
      Method::from_bytes(event.http_method.as_bytes())
        .map_err(|err| EventError::RequestConstruction(Box::new(err), Backtrace::new()))?
    };
    if !url.host.is_empty() {
      url
        .host
        .parse::<Authority>()
        .map_err(|err| EventError::RequestConstruction(Box::new(err), Backtrace::new()))?;
    }

    let request_uri = url.request_uri();
    let remote_addr = event
      .request_context
      .identity
      .source_ip
      .clone()
      .unwrap_or_default();

    event.multi_value_headers = headers.to_multi_value_map();
    event.multi_value_query_string_parameters = query.to_multi_value_map();

    let has_content_length = headers
      .get(CONTENT_LENGTH)
      .map_or(false, |len| !len.is_empty());
    if !has_content_length && !body.is_empty() {
      headers.set(CONTENT_LENGTH, body.len().to_string());
    }
    headers.set(
      X_REQUEST_ID,
      event
        .request_context
        .request_id
        .clone()
        .unwrap_or_default(),
    );
    headers.set(
      X_STAGE,
      event.request_context.stage.clone().unwrap_or_default(),
    );
    if let Some(trace_id) = context.trace_id() {
      headers.set(X_AMZN_TRACE_ID, trace_id);
    }

    Ok(Self {
      method,
      url,
      request_uri,
      remote_addr,
      headers,
      body: Body::from(body),
      event,
      context,
    })
  }

  /// HTTP method.
  pub fn method(&self) -> &Method {
    &self.method
  }

  /// Request URL.
  pub fn url(&self) -> &RequestUrl {
    &self.url
  }

  /// Host from the `Host` header, or the fallback host if the event had none.
  pub fn host(&self) -> &str {
    self.url.host()
  }

  /// Unmodified request target (path and query), as sent in an HTTP request line.
  pub fn request_uri(&self) -> &str {
    &self.request_uri
  }

  /// Caller's source IP address as reported by API Gateway (possibly empty).
  pub fn remote_addr(&self) -> &str {
    &self.remote_addr
  }

  /// Request headers.
  pub fn headers(&self) -> &MultiMap {
    &self.headers
  }

  /// Mutable request headers.
  pub fn headers_mut(&mut self) -> &mut MultiMap {
    &mut self.headers
  }

  /// Query string parameters parsed from the URL.
  pub fn query(&self) -> MultiMap {
    MultiMap::parse_query(self.url.raw_query())
  }

  /// Value of the `Content-Length` header, if present and valid.
  pub fn content_length(&self) -> Option<u64> {
    self
      .headers
      .get(CONTENT_LENGTH)
      .and_then(|len| len.trim().parse().ok())
  }

  /// Readable request body.
  pub fn body_mut(&mut self) -> &mut Body {
    &mut self.body
  }

  /// Consume the request and return its body.
  pub fn into_body(self) -> Body {
    self.body
  }

  /// API Gateway event the request was built from, with merged multi-value headers and query
  /// parameters.
  pub fn gateway_event(&self) -> &GatewayProxyRequest {
    &self.event
  }

  /// Invocation context the request was built with.
  pub fn context(&self) -> &InvocationContext {
    &self.context
  }
}
