//! Request and response model shared by the classifier, the strategies and the bucket store.

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

/// Body of the page served when a navigation fails with nothing cached.
pub const OFFLINE_DOCUMENT: &str = "<!DOCTYPE html>\n\
<html lang=\"pt-BR\">\n\
<head><meta charset=\"utf-8\"><title>Agenda Bravo</title></head>\n\
<body><h1>Aplicativo offline</h1></body>\n\
</html>\n";

/// Body of the 503 served for sub-resources that are unavailable offline.
pub const OFFLINE_RESOURCE: &str = "Recurso indisponível offline";

/// What the requesting page intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
  /// Full-page navigation
  Document,
  /// Sub-resources, fetch()/XHR and anything else
  #[default]
  Other,
}

impl Destination {
  pub fn is_navigation(self) -> bool {
    matches!(self, Destination::Document)
  }
}

/// An outgoing request made by one of the application's pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub destination: Destination,
}

impl Request {
  /// A plain GET sub-resource request.
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      destination: Destination::Other,
    }
  }

  /// A full-page navigation to `url`.
  pub fn navigate(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      destination: Destination::Document,
    }
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }

  /// Whether the scheme is one the cache manager may intercept.
  pub fn is_http(&self) -> bool {
    matches!(self.url.scheme(), "http" | "https")
  }

  /// URL used as the cache identity: the fragment never reaches the server, so it is dropped.
  pub fn cache_url(&self) -> String {
    let mut url = self.url.clone();
    url.set_fragment(None);
    url.to_string()
  }
}

/// A response snapshot: status line, headers and the full body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  pub status_text: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  /// Build a response with the canonical reason phrase for `status`.
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    let status_text = StatusCode::from_u16(status)
      .ok()
      .and_then(|s| s.canonical_reason())
      .unwrap_or_default()
      .to_string();

    Self {
      status,
      status_text,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  /// True for 2xx statuses, the only ones worth caching.
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// The synthesized page for a navigation that failed with nothing cached.
  pub fn offline_document() -> Self {
    Self::new(200, OFFLINE_DOCUMENT).with_header("Content-Type", "text/html; charset=utf-8")
  }

  /// The synthesized 503 for any other resource that failed offline.
  pub fn offline_unavailable() -> Self {
    Self {
      status: 503,
      status_text: "Service Unavailable".to_string(),
      headers: vec![(
        "Content-Type".to_string(),
        "text/plain; charset=utf-8".to_string(),
      )],
      body: OFFLINE_RESOURCE.as_bytes().to_vec(),
    }
  }
}
