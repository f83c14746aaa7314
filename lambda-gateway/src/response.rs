use crate::models::GatewayProxyResponse;
use crate::multimap::MultiMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::channel::oneshot;
use futures::future::Shared;
use futures::FutureExt;
use http::StatusCode;
use indexmap::IndexMap;
use log::{debug, warn};
use mime::Mime;

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

const CONTENT_ENCODING: &str = "Content-Encoding";
const CONTENT_TYPE: &str = "Content-Type";

/// `Content-Type` applied when the handler sets none before the response is committed.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf8";

/// Response writer passed to a [`Handler`](crate::Handler).
///
/// Body bytes are written through [`std::io::Write`]. The first write (or call to
/// [`write_header`](Self::write_header)) commits the status and headers; changes made after that
/// are not reflected in the response.
pub trait ResponseWriter: io::Write {
  /// Response headers that will be sent when the response is committed.
  fn headers_mut(&mut self) -> &mut MultiMap;

  /// Commit the response with the given status. Ignored if the response is already committed.
  fn write_header(&mut self, status: StatusCode);
}

/// Signal that resolves once a [`ResponseRecorder`] has been finished.
///
/// The future resolves to `true` after [`ResponseRecorder::finish`] runs, or to `false` if the
/// recorder is dropped without being finished. It never resolves earlier.
#[derive(Clone)]
pub struct Completion(Shared<oneshot::Receiver<()>>);

impl Completion {
  /// Whether the recorder has been finished, without waiting.
  pub fn is_complete(&self) -> bool {
    matches!(self.0.clone().now_or_never(), Some(Ok(())))
  }
}

impl Future for Completion {
  type Output = bool;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.0.poll_unpin(cx).map(|result| result.is_ok())
  }
}

impl fmt::Debug for Completion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Completion")
      .field("complete", &self.is_complete())
      .finish()
  }
}

struct Committed {
  status: StatusCode,
  headers: MultiMap,
}

/// In-memory [`ResponseWriter`] that serializes to a [`GatewayProxyResponse`].
pub struct ResponseRecorder {
  headers: MultiMap,
  committed: Option<Committed>,
  body: Vec<u8>,
  done: Option<oneshot::Sender<()>>,
  completion: Completion,
}

impl ResponseRecorder {
  /// Construct an empty, uncommitted recorder.
  pub fn new() -> Self {
    let (done, receiver) = oneshot::channel();
    Self {
      headers: MultiMap::headers(),
      committed: None,
      body: Vec::new(),
      done: Some(done),
      completion: Completion(receiver.shared()),
    }
  }

  /// Signal that resolves once [`finish`](Self::finish) has run.
  pub fn completion(&self) -> Completion {
    self.completion.clone()
  }

  /// Committed status, or `None` if nothing has been written yet.
  pub fn status(&self) -> Option<StatusCode> {
    self.committed.as_ref().map(|committed| committed.status)
  }

  /// Whether the status and headers have been committed.
  pub fn is_committed(&self) -> bool {
    self.committed.is_some()
  }

  /// Body bytes written so far.
  pub fn body(&self) -> &[u8] {
    &self.body
  }

  /// Finish the response and serialize it as an API Gateway proxy response.
  ///
  /// Commits the response with status 200 if the handler never wrote anything. The body is sent as
  /// text when the `Content-Type` is textual (`text/*`, `application/json`, `application/xml`, or
  /// `*+xml`) and there is no `Content-Encoding`; otherwise it is base64-encoded.
  pub fn finish(mut self) -> GatewayProxyResponse {
    let Committed { status, headers } = match self.committed.take() {
      Some(committed) => committed,
      None => self.snapshot(StatusCode::OK),
    };

    let is_base64_encoded = is_binary(&headers);
    let body = if is_base64_encoded {
      STANDARD.encode(&self.body)
    } else {
      String::from_utf8_lossy(&self.body).into_owned()
    };
    debug!(
      "Responding with status {status} ({} body bytes, base64: {is_base64_encoded})",
      self.body.len()
    );

    let mut single_value_headers = IndexMap::with_capacity(headers.len());
    let mut multi_value_headers = IndexMap::with_capacity(headers.len());
    for (name, values) in headers.iter() {
      if let Some(last) = values.last() {
        single_value_headers.insert(name.to_owned(), last.to_owned());
        multi_value_headers.insert(name.to_owned(), values.to_vec());
      }
    }

    if let Some(done) = self.done.take() {
      // The receiver lives inside `self.completion`, so this can't fail.
      let _ = done.send(());
    }

    GatewayProxyResponse {
      status_code: i64::from(status.as_u16()),
      headers: single_value_headers,
      multi_value_headers,
      body,
      is_base64_encoded,
    }
  }

  fn commit(&mut self, status: StatusCode) {
    if self.committed.is_none() {
      self.committed = Some(self.snapshot(status));
    }
  }

  fn snapshot(&mut self, status: StatusCode) -> Committed {
    if !self.headers.contains_key(CONTENT_TYPE) {
      self.headers.set(CONTENT_TYPE, DEFAULT_CONTENT_TYPE);
    }
    Committed {
      status,
      headers: self.headers.clone(),
    }
  }
}

impl Default for ResponseRecorder {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for ResponseRecorder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResponseRecorder")
      .field("headers", &self.headers)
      .field("status", &self.status())
      .field("body_len", &self.body.len())
      .finish()
  }
}

impl io::Write for ResponseRecorder {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.commit(StatusCode::OK);
    self.body.extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl ResponseWriter for ResponseRecorder {
  fn headers_mut(&mut self) -> &mut MultiMap {
    &mut self.headers
  }

  fn write_header(&mut self, status: StatusCode) {
    if let Some(committed) = &self.committed {
      warn!(
        "Ignoring status {status}: response already committed with status {}",
        committed.status
      );
      return;
    }
    self.commit(status);
  }
}

fn is_binary(headers: &MultiMap) -> bool {
  let is_text = headers.get(CONTENT_TYPE).map_or(false, is_text_mime);
  let is_encoded = headers
    .get(CONTENT_ENCODING)
    .map_or(false, |encoding| !encoding.is_empty());
  !is_text || is_encoded
}

fn is_text_mime(content_type: &str) -> bool {
  let essence = match content_type.parse::<Mime>() {
    Ok(mime) => mime.essence_str().to_ascii_lowercase(),
    Err(_) => return false,
  };
  essence.starts_with("text/")
    || essence == "application/json"
    || essence == "application/xml"
    || essence.ends_with("+xml")
}

#[cfg(test)]
mod tests {
  use super::{is_text_mime, ResponseRecorder, ResponseWriter, DEFAULT_CONTENT_TYPE};

  use futures::executor::block_on;
  use http::StatusCode;
  use pretty_assertions::assert_eq;

  use std::io::Write;

  #[test]
  fn test_json_is_text_mime() {
    assert!(is_text_mime("application/json"));
    assert!(is_text_mime("application/json; charset=utf-8"));
    assert!(is_text_mime("Application/JSON"));
  }

  #[test]
  fn test_xml_is_text_mime() {
    assert!(is_text_mime("application/xml"));
    assert!(is_text_mime("application/xml; charset=utf-8"));
    assert!(is_text_mime("ApPlicaTion/xMl"));
    assert!(is_text_mime("image/svg+xml"));
    assert!(is_text_mime("application/atom+xml"));
  }

  #[test]
  fn test_binary_mime() {
    assert!(!is_text_mime("image/png"));
    assert!(!is_text_mime("application/octet-stream"));
    assert!(!is_text_mime("application/javascript"));
    assert!(!is_text_mime("not a mime type"));
    assert!(!is_text_mime(""));
  }

  #[test]
  fn test_headers() {
    let mut w = ResponseRecorder::new();
    w.headers_mut().set("Foo", "bar");
    w.headers_mut().set("Bar", "baz");

    let e = w.finish();
    assert_eq!(e.headers["Foo"], "bar");
    assert_eq!(e.headers["Bar"], "baz");
    assert_eq!(e.multi_value_headers["Foo"], vec!["bar"]);
    assert_eq!(e.multi_value_headers["Bar"], vec!["baz"]);
  }

  #[test]
  fn test_multi_header() {
    let mut w = ResponseRecorder::new();
    w.headers_mut().set("Foo", "bar");
    w.headers_mut().add("X-APEX", "apex1");
    w.headers_mut().add("X-APEX", "apex2");

    let e = w.finish();
    assert_eq!(e.headers["X-APEX"], "apex2");
    assert_eq!(e.multi_value_headers["X-APEX"], vec!["apex1", "apex2"]);
    assert_eq!(e.multi_value_headers["Foo"], vec!["bar"]);
  }

  #[test]
  fn test_write_text() {
    let types = [
      "text/x-custom",
      "text/plain",
      "text/plain; charset=utf-8",
      "application/json",
      "application/json; charset=utf-8",
      "application/xml",
      "image/svg+xml",
    ];

    for kind in types {
      let mut w = ResponseRecorder::new();
      let completion = w.completion();
      w.headers_mut().set("Content-Type", kind);
      w.headers_mut().set("Double-Header", "1");
      w.headers_mut().add("double-header", "2");
      w.write_all(b"hello world\n").expect("write should succeed");

      let e = w.finish();
      assert_eq!(e.status_code, 200, "{kind}");
      assert_eq!(e.body, "hello world\n", "{kind}");
      assert_eq!(e.headers["Content-Type"], kind);
      assert_eq!(e.multi_value_headers["Double-Header"], vec!["1", "2"]);
      assert!(!e.is_base64_encoded, "{kind}");
      assert!(block_on(completion), "{kind}");
    }
  }

  #[test]
  fn test_write_binary() {
    let mut w = ResponseRecorder::new();
    w.headers_mut().set("Content-Type", "image/png");
    w.write_all(b"data").expect("write should succeed");

    let e = w.finish();
    assert_eq!(e.status_code, 200);
    assert_eq!(e.body, "ZGF0YQ==");
    assert_eq!(e.headers["Content-Type"], "image/png");
    assert!(e.is_base64_encoded);
  }

  #[test]
  fn test_write_gzip() {
    let mut w = ResponseRecorder::new();
    w.headers_mut().set("Content-Type", "text/plain");
    w.headers_mut().set("Content-Encoding", "gzip");
    w.write_all(b"data").expect("write should succeed");

    let e = w.finish();
    assert_eq!(e.status_code, 200);
    assert_eq!(e.body, "ZGF0YQ==");
    assert_eq!(e.headers["Content-Type"], "text/plain");
    assert!(e.is_base64_encoded);
  }

  #[test]
  fn test_write_header() {
    let mut w = ResponseRecorder::new();
    w.write_header(StatusCode::NOT_FOUND);
    w.write_all(b"Not Found\n").expect("write should succeed");

    let e = w.finish();
    assert_eq!(e.status_code, 404);
    assert_eq!(e.body, "Not Found\n");
    assert_eq!(e.headers["Content-Type"], DEFAULT_CONTENT_TYPE);
    assert_eq!(e.headers["Content-Type"], "text/plain; charset=utf8");
    assert!(!e.is_base64_encoded);
  }

  #[test]
  fn test_explicit_content_type_not_overridden() {
    let mut w = ResponseRecorder::new();
    w.headers_mut().set("content-type", "application/json");
    w.write_header(StatusCode::NOT_FOUND);

    let e = w.finish();
    assert_eq!(e.headers["content-type"], "application/json");
    assert!(!e.headers.contains_key("Content-Type"));
  }

  #[test]
  fn test_empty_response() {
    let w = ResponseRecorder::new();

    let e = w.finish();
    assert_eq!(e.status_code, 200);
    assert_eq!(e.body, "");
    assert_eq!(e.headers["Content-Type"], DEFAULT_CONTENT_TYPE);
    assert!(!e.is_base64_encoded);
  }

  #[test]
  fn test_first_write_commits() {
    let mut w = ResponseRecorder::new();
    assert!(!w.is_committed());
    assert_eq!(w.status(), None);

    w.headers_mut().set("Content-Type", "application/json");
    w.write_all(b"{}").expect("write should succeed");
    assert!(w.is_committed());
    assert_eq!(w.status(), Some(StatusCode::OK));

    w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
    w.headers_mut().set("Content-Type", "image/png");
    w.headers_mut().set("X-Late", "1");
    w.write_all(b"\n").expect("write should succeed");
    assert_eq!(w.body(), b"{}\n");

    let e = w.finish();
    assert_eq!(e.status_code, 200);
    assert_eq!(e.body, "{}\n");
    assert_eq!(e.headers["Content-Type"], "application/json");
    assert!(!e.headers.contains_key("X-Late"));
    assert!(!e.is_base64_encoded);
  }

  #[test]
  fn test_write_returns_length() {
    let mut w = ResponseRecorder::new();
    assert_eq!(w.write(b"hello").expect("write should succeed"), 5);
    assert_eq!(w.write(b"").expect("write should succeed"), 0);
    write!(w, " {}", "world").expect("write should succeed");

    assert_eq!(w.finish().body, "hello world");
  }

  #[test]
  fn test_completion_fires_on_finish() {
    let w = ResponseRecorder::new();
    let completion = w.completion();
    let other = completion.clone();
    assert!(!completion.is_complete());

    w.finish();
    assert!(completion.is_complete());
    assert!(block_on(completion));
    assert!(block_on(other));
  }

  #[test]
  fn test_completion_not_fired_when_dropped() {
    let w = ResponseRecorder::new();
    let completion = w.completion();

    drop(w);
    assert!(!completion.is_complete());
    assert!(!block_on(completion));
  }
}
