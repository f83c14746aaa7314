use indexmap::IndexMap;
use itertools::Itertools;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::form_urlencoded;

use std::borrow::Cow;

// Bytes escaped in a query component: everything except unreserved characters. Spaces are
// encoded separately as `+`.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'~');

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyCase {
  Insensitive,
  Sensitive,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
  name: String,
  values: Vec<String>,
}

/// Ordered multi-value map used for both HTTP headers and query string parameters.
///
/// Keys iterate in the order they were first inserted, and the values for each key keep their
/// insertion order. A header map ([`MultiMap::headers`]) compares keys ASCII case-insensitively and
/// remembers the spelling used when a key was first inserted; a query map ([`MultiMap::query`])
/// compares keys exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiMap {
  case: KeyCase,
  entries: IndexMap<String, Entry>,
}

impl MultiMap {
  /// Construct an empty map with case-insensitive keys, suitable for HTTP headers.
  pub fn headers() -> Self {
    Self {
      case: KeyCase::Insensitive,
      entries: IndexMap::new(),
    }
  }

  /// Construct an empty map with case-sensitive keys, suitable for query string parameters.
  pub fn query() -> Self {
    Self {
      case: KeyCase::Sensitive,
      entries: IndexMap::new(),
    }
  }

  /// Merge a single-value map and a multi-value map into `self`.
  ///
  /// Each single-value entry becomes a one-element list. Each multi-value entry then replaces
  /// whatever the single-value map contributed for the same key; the two are never concatenated.
  pub fn merged<'a, S, M, V>(mut self, single: S, multi: M) -> Self
  where
    S: IntoIterator<Item = (&'a String, &'a String)>,
    M: IntoIterator<Item = (&'a String, &'a V)>,
    V: AsRef<[String]> + 'a,
  {
    for (name, value) in single {
      self.set(name.as_str(), value.as_str());
    }
    for (name, values) in multi {
      self.set_all(name.as_str(), values.as_ref().iter().cloned());
    }
    self
  }

  /// Parse an `application/x-www-form-urlencoded` query string.
  ///
  /// `+` decodes to a space. Invalid escapes are kept verbatim.
  pub fn parse_query(raw_query: &str) -> Self {
    let mut query = Self::query();
    for (name, value) in form_urlencoded::parse(raw_query.as_bytes()) {
      query.add(name, value);
    }
    query
  }

  /// Return the first value associated with `name`.
  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .entry(name)
      .and_then(|entry| entry.values.first())
      .map(String::as_str)
  }

  /// Return the most recently added value associated with `name`.
  pub fn last(&self, name: &str) -> Option<&str> {
    self
      .entry(name)
      .and_then(|entry| entry.values.last())
      .map(String::as_str)
  }

  /// Return every value associated with `name`, in insertion order.
  pub fn get_all(&self, name: &str) -> &[String] {
    self
      .entry(name)
      .map(|entry| entry.values.as_slice())
      .unwrap_or_default()
  }

  /// Whether any value is associated with `name`.
  pub fn contains_key(&self, name: &str) -> bool {
    self.entry(name).is_some()
  }

  /// Replace all values associated with `name` with a single `value`.
  pub fn set<N, V>(&mut self, name: N, value: V)
  where
    N: Into<String>,
    V: Into<String>,
  {
    self.set_all(name, [value.into()]);
  }

  /// Replace all values associated with `name`.
  ///
  /// An empty `values` removes `name` from the map.
  pub fn set_all<N, I, V>(&mut self, name: N, values: I)
  where
    N: Into<String>,
    I: IntoIterator<Item = V>,
    V: Into<String>,
  {
    let name = name.into();
    let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
    if values.is_empty() {
      self.remove(&name);
      return;
    }

    let key = self.key(&name).into_owned();
    self
      .entries
      .entry(key)
      .or_insert_with(|| Entry {
        name,
        values: Vec::new(),
      })
      .values = values;
  }

  /// Append `value` to the values associated with `name`.
  pub fn add<N, V>(&mut self, name: N, value: V)
  where
    N: Into<String>,
    V: Into<String>,
  {
    let name = name.into();
    let key = self.key(&name).into_owned();
    self
      .entries
      .entry(key)
      .or_insert_with(|| Entry {
        name,
        values: Vec::new(),
      })
      .values
      .push(value.into());
  }

  /// Remove `name` and return its values, preserving the order of the remaining keys.
  pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
    let key = self.key(name).into_owned();
    self.entries.shift_remove(&key).map(|entry| entry.values)
  }

  /// Number of distinct keys.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Whether the map has no keys.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Iterate over each key (as first spelled) and its values, in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
    self
      .entries
      .values()
      .map(|entry| (entry.name.as_str(), entry.values.as_slice()))
  }

  /// Keys (as first spelled) sorted lexicographically by byte value.
  pub fn sorted_keys(&self) -> Vec<&str> {
    self
      .entries
      .values()
      .map(|entry| entry.name.as_str())
      .sorted()
      .collect()
  }

  /// Encode the map as a canonical `application/x-www-form-urlencoded` query string.
  ///
  /// Keys are sorted lexicographically, and the values for each key keep their order. Spaces are
  /// encoded as `+`.
  pub fn to_query_string(&self) -> String {
    self
      .entries
      .values()
      .sorted_by(|a, b| a.name.cmp(&b.name))
      .flat_map(|entry| {
        entry.values.iter().map(move |value| {
          format!(
            "{}={}",
            encode_component(&entry.name),
            encode_component(value)
          )
        })
      })
      .join("&")
  }

  /// Convert into the multi-value map shape used by gateway events.
  pub fn to_multi_value_map(&self) -> IndexMap<String, Vec<String>> {
    self
      .iter()
      .map(|(name, values)| (name.to_owned(), values.to_vec()))
      .collect()
  }

  fn entry(&self, name: &str) -> Option<&Entry> {
    self.entries.get(self.key(name).as_ref())
  }

  fn key<'a>(&self, name: &'a str) -> Cow<'a, str> {
    match self.case {
      KeyCase::Insensitive if name.bytes().any(|b| b.is_ascii_uppercase()) => {
        Cow::Owned(name.to_ascii_lowercase())
      }
      KeyCase::Insensitive | KeyCase::Sensitive => Cow::Borrowed(name),
    }
  }
}

fn encode_component(component: &str) -> String {
  component
    .split(' ')
    .map(|part| utf8_percent_encode(part, QUERY_COMPONENT))
    .join("+")
}
