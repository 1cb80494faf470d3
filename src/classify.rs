//! Request classification: which strategy, if any, applies to a request.

use reqwest::Method;

use crate::http::Request;

/// Outcome of classifying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Not intercepted; the transport handles it directly
  Skip,
  /// Cache-first
  Static,
  /// Network-first
  Dynamic,
}

/// Maps requests to a [`Route`] using an ordered list of dynamic path prefixes.
#[derive(Debug, Clone)]
pub struct Classifier {
  dynamic_prefixes: Vec<String>,
}

impl Classifier {
  pub fn new<I, S>(dynamic_prefixes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      dynamic_prefixes: dynamic_prefixes.into_iter().map(Into::into).collect(),
    }
  }

  pub fn dynamic_prefixes(&self) -> &[String] {
    &self.dynamic_prefixes
  }

  /// Classify a request. Pure: depends only on method, scheme and path.
  pub fn classify(&self, request: &Request) -> Route {
    if request.method != Method::GET || !request.is_http() {
      return Route::Skip;
    }

    let path = request.url.path();
    if self
      .dynamic_prefixes
      .iter()
      .any(|prefix| path.starts_with(prefix.as_str()))
    {
      Route::Dynamic
    } else {
      Route::Static
    }
  }
}
