//! Bucket names for one cache generation.

/// The bucket names a given version recognizes as current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketNames {
  version: String,
  static_name: String,
  dynamic_name: String,
  umbrella_name: String,
}

impl BucketNames {
  /// Derive names like `agenda-bravo-static-v1.0.0` from a prefix and version tag.
  pub fn new(prefix: &str, version: &str) -> Self {
    Self {
      version: version.to_string(),
      static_name: format!("{}-static-{}", prefix, version),
      dynamic_name: format!("{}-dynamic-{}", prefix, version),
      umbrella_name: format!("{}-{}", prefix, version),
    }
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  pub fn static_name(&self) -> &str {
    &self.static_name
  }

  pub fn dynamic_name(&self) -> &str {
    &self.dynamic_name
  }

  /// Generic name kept for buckets written before the static/dynamic split.
  pub fn umbrella_name(&self) -> &str {
    &self.umbrella_name
  }

  /// Current buckets in lookup order.
  pub fn recognized(&self) -> [&str; 3] {
    [&self.static_name, &self.dynamic_name, &self.umbrella_name]
  }

  /// Exact-match check; anything else is stale.
  pub fn is_current(&self, name: &str) -> bool {
    self.recognized().contains(&name)
  }
}
