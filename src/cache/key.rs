//! Canonical identities for cached queries and entities.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of resource a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
  /// All job postings
  Jobs,
  /// A single job posting
  Job,
  /// All candidate profiles
  Candidates,
  /// A single candidate profile
  Candidate,
  /// Computed matches for one job
  Matches,
}

impl ResourceKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Jobs => "jobs",
      Self::Job => "job",
      Self::Candidates => "candidates",
      Self::Candidate => "candidate",
      Self::Matches => "matches",
    }
  }
}

/// Cache key: a resource kind plus named parameters.
///
/// Parameters live in a sorted map, so two keys built from the same
/// (kind, params) pairs compare and hash equal no matter the insertion order.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
  kind: ResourceKind,
  params: BTreeMap<String, String>,
}

impl Key {
  pub fn new(kind: ResourceKind) -> Self {
    Self {
      kind,
      params: BTreeMap::new(),
    }
  }

  /// Add a parameter. A later value for the same name replaces the earlier one.
  pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.params.insert(name.into(), value.into());
    self
  }

  pub fn jobs() -> Self {
    Self::new(ResourceKind::Jobs)
  }

  pub fn job(id: &str) -> Self {
    Self::new(ResourceKind::Job).with_param("id", id)
  }

  pub fn candidates() -> Self {
    Self::new(ResourceKind::Candidates)
  }

  pub fn candidate(id: &str) -> Self {
    Self::new(ResourceKind::Candidate).with_param("id", id)
  }

  pub fn matches(job_id: &str) -> Self {
    Self::new(ResourceKind::Matches).with_param("job_id", job_id)
  }

  pub fn kind(&self) -> ResourceKind {
    self.kind
  }

  pub fn param(&self, name: &str) -> Option<&str> {
    self.params.get(name).map(String::as_str)
  }

  /// Stable fixed-length fingerprint, used to tag log lines.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.canonical().as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Human-readable description of the query this key addresses.
  pub fn description(&self) -> String {
    match (self.kind, self.param("id"), self.param("job_id")) {
      (ResourceKind::Jobs, _, _) => "all jobs".to_string(),
      (ResourceKind::Candidates, _, _) => "all candidates".to_string(),
      (ResourceKind::Job, Some(id), _) => format!("job {}", id),
      (ResourceKind::Candidate, Some(id), _) => format!("candidate {}", id),
      (ResourceKind::Matches, _, Some(job_id)) => format!("matches for job {}", job_id),
      _ => self.canonical(),
    }
  }

  /// Canonical text form: `kind` or `kind?a=1&b=2`, params in name order.
  ///
  /// Names and values are length-prefixed so that separators inside a value
  /// can never make two different parameter sets render the same.
  fn canonical(&self) -> String {
    let mut out = self.kind.as_str().to_string();
    for (i, (name, value)) in self.params.iter().enumerate() {
      out.push(if i == 0 { '?' } else { '&' });
      out.push_str(&format!("{}:{}={}:{}", name.len(), name, value.len(), value));
    }
    out
  }
}

impl fmt::Debug for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Key({})", self.canonical())
  }
}

impl fmt::Display for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} [{}]", self.description(), &self.cache_hash()[..8])
  }
}
