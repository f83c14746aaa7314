// Until std::error::Backtrace is fully stabilized, we can't embed a type named `Backtrace` within
// a thiserror::Error (see https://github.com/dtolnay/thiserror/issues/204).
use backtrace::Backtrace as _Backtrace;
use itertools::Itertools;
use thiserror::Error;

/// Error that occurred while translating an API Gateway event into a [`Request`](crate::Request).
///
/// Each variant aborts the invocation before the handler runs. The error is reported to the Lambda
/// runtime as an invocation failure.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventError {
  /// Invalid base64 encoding for request body.
  // The base64 encoding comes from AWS, so this is actually an internal error.
  #[error("decoding base64 body")]
  BodyDecode(#[source] Box<base64::DecodeError>, _Backtrace),
  /// The event path could not be resolved into a request URL.
  #[error("parsing path")]
  PathParse(#[source] Box<UrlError>, _Backtrace),
  /// The method and URL do not form a valid HTTP request (e.g., a malformed method token).
  #[error("creating request")]
  RequestConstruction(
    #[source] Box<dyn std::error::Error + Send + Sync + 'static>,
    _Backtrace,
  ),
}

impl EventError {
  /// Return the backtrace associated with the error, if known.
  pub fn backtrace(&self) -> Option<&_Backtrace> {
    match self {
      EventError::BodyDecode(_, backtrace)
      | EventError::PathParse(_, backtrace)
      | EventError::RequestConstruction(_, backtrace) => Some(backtrace),
    }
  }

  /// Return the name of the error variant (e.g., `PathParse`).
  pub fn name(&self) -> &str {
    match self {
      EventError::BodyDecode(_, _) => "BodyDecode",
      EventError::PathParse(_, _) => "PathParse",
      EventError::RequestConstruction(_, _) => "RequestConstruction",
    }
  }
}

/// Error that occurred while resolving an event path against the request's base URL.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
  /// The path contains an ASCII control character.
  #[error("invalid control character in URL")]
  ControlCharacter,
  /// A `%` is not followed by two hexadecimal digits.
  #[error("invalid URL escape `{0}`")]
  InvalidEscape(String),
  /// The path begins with `:`, which would introduce an empty scheme.
  #[error("missing protocol scheme")]
  MissingScheme,
  /// The reference is not a valid URL (e.g., an absolute URL with an invalid host).
  #[error("invalid URL")]
  Parse(#[from] url::ParseError),
}

/// Error loading the startup [`Config`](crate::Config).
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  /// A required environment variable is unset or empty.
  #[error("missing required environment variable `{0}`")]
  MissingVar(&'static str),
  /// An environment variable is set but is not valid unicode.
  #[error("environment variable `{0}` is not valid unicode")]
  NotUnicode(&'static str),
}

/// Helper function for formatting an error as a string containing a human-readable chain of causes.
///
/// This function will walk over the chain of causes returned by
/// [`Error::source`](std::error::Error::source) and append each underlying error (using the
/// [`Display`](std::fmt::Display) trait).
///
/// # Arguments
///
/// * `err` - Error to format.
/// * `name` - Optional name of the error type/variant (e.g., `EventError::PathParse`).
/// * `backtrace` - Optional [`Backtrace`](backtrace::Backtrace) indicating where the top-level
///   error occurred.
pub fn format_error(
  err: &dyn std::error::Error,
  name: Option<&str>,
  backtrace: Option<&_Backtrace>,
) -> String {
  let err_line = name
    .map(|n| format!("{}: {}", n, err))
    .unwrap_or_else(|| err.to_string());

  let top_error = if let Some(bt) = backtrace {
    format!("{err_line}\n  stack trace:\n{}", format_backtrace(bt, 4))
  } else {
    err_line
  };

  let cause_str = ErrorCauseIterator(err.source())
    .map(|cause| format!("  caused by: {cause}"))
    .join("\n");

  if !cause_str.is_empty() {
    format!("{top_error}\n{cause_str}")
  } else {
    top_error
  }
}

struct ErrorCauseIterator<'a>(Option<&'a (dyn std::error::Error + 'static)>);

impl<'a> Iterator for ErrorCauseIterator<'a> {
  type Item = &'a (dyn std::error::Error + 'static);

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.0;
    self.0 = current.and_then(|err| err.source());
    current
  }
}

fn format_backtrace(backtrace: &_Backtrace, indent: usize) -> String {
  let indent_str = " ".repeat(indent);
  format!("{backtrace:?}")
    .lines()
    .map(|line| format!("{indent_str}{line}"))
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::{format_error, EventError, UrlError};

  use backtrace::Backtrace;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_format_error_cause_chain() {
    let err = EventError::PathParse(
      Box::new(UrlError::InvalidEscape("%zz".to_string())),
      Backtrace::new_unresolved(),
    );

    assert_eq!(err.name(), "PathParse");
    assert_eq!(
      format_error(&err, Some("EventError::PathParse"), None),
      "EventError::PathParse: parsing path\n  caused by: invalid URL escape `%zz`"
    );
  }

  #[test]
  fn test_format_error_url_parse() {
    let err = UrlError::from(url::ParseError::InvalidPort);

    assert_eq!(
      format_error(&err, None, None),
      "invalid URL\n  caused by: invalid port number"
    );
  }

  #[test]
  fn test_format_error_without_cause() {
    assert_eq!(
      format_error(&UrlError::MissingScheme, None, None),
      "missing protocol scheme"
    );
  }

  #[test]
  fn test_format_error_includes_backtrace() {
    let err = EventError::RequestConstruction(
      "invalid HTTP method".into(),
      Backtrace::new_unresolved(),
    );

    let formatted = format_error(&err, Some(err.name()), err.backtrace());
    assert!(formatted.starts_with("RequestConstruction: creating request\n  stack trace:\n"));
    assert!(formatted.ends_with("  caused by: invalid HTTP method"));
  }
}
