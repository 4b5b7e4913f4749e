use std::fmt;

use super::error::ApiError;

/// Job posting
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
  pub id: String,
  pub title: String,
  pub description: String,
  pub requirements: Vec<String>,
  pub created_at: String,
}

/// Input for creating a job posting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
  pub title: String,
  pub description: String,
  pub requirements: Vec<String>,
}

impl NewJob {
  /// Build from form-style input, with requirements as a comma-separated list.
  pub fn from_input(title: &str, description: &str, requirements: &str) -> Self {
    Self {
      title: title.trim().to_string(),
      description: description.trim().to_string(),
      requirements: parse_requirements(requirements),
    }
  }

  pub fn validate(&self) -> Result<(), ApiError> {
    if self.title.trim().is_empty() {
      return Err(ApiError::Validation("job title is required".to_string()));
    }
    if self.description.trim().is_empty() {
      return Err(ApiError::Validation("job description is required".to_string()));
    }
    if self.requirements.iter().all(|r| r.trim().is_empty()) {
      return Err(ApiError::Validation(
        "at least one requirement is required".to_string(),
      ));
    }
    Ok(())
  }
}

/// Split a comma-separated requirement list, dropping empty entries.
pub fn parse_requirements(input: &str) -> Vec<String> {
  input
    .split(',')
    .map(str::trim)
    .filter(|r| !r.is_empty())
    .map(String::from)
    .collect()
}

/// Candidate profile extracted from an uploaded CV
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub id: String,
  pub full_name: String,
  pub email: Option<String>,
  pub skills: Vec<String>,
  pub cv_url: Option<String>,
  /// Free-form extraction output (summary, work experience, ...)
  pub extracted_data: serde_json::Value,
  pub created_at: String,
}

/// CV document to upload
#[derive(Clone, PartialEq, Eq)]
pub struct CandidateUpload {
  pub file_name: String,
  pub content: Vec<u8>,
}

impl CandidateUpload {
  pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
    Self {
      file_name: file_name.into(),
      content,
    }
  }

  pub fn validate(&self) -> Result<(), ApiError> {
    if !self.file_name.to_lowercase().ends_with(".pdf") {
      return Err(ApiError::Validation(
        "only PDF files are supported".to_string(),
      ));
    }
    if self.content.is_empty() {
      return Err(ApiError::Validation(format!("{} is empty", self.file_name)));
    }
    Ok(())
  }
}

impl fmt::Debug for CandidateUpload {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CandidateUpload")
      .field("file_name", &self.file_name)
      .field("bytes", &self.content.len())
      .finish()
  }
}

/// One ranked candidate for a job
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
  pub candidate_id: String,
  /// 0 to 100
  pub match_score: u8,
  pub strengths: Vec<String>,
  pub weaknesses: Vec<String>,
}

/// Ranked matches computed for one job
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSet {
  pub job_id: String,
  pub matches: Vec<CandidateMatch>,
  /// Server note, e.g. when there are no candidates to match
  pub message: Option<String>,
}

/// Payload stored under a cache key.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
  Jobs(Vec<Job>),
  Job(Job),
  Candidates(Vec<Candidate>),
  Candidate(Candidate),
  Matches(MatchSet),
}

impl Resource {
  pub fn into_jobs(self) -> Option<Vec<Job>> {
    match self {
      Resource::Jobs(jobs) => Some(jobs),
      _ => None,
    }
  }

  pub fn into_job(self) -> Option<Job> {
    match self {
      Resource::Job(job) => Some(job),
      _ => None,
    }
  }

  pub fn into_candidates(self) -> Option<Vec<Candidate>> {
    match self {
      Resource::Candidates(candidates) => Some(candidates),
      _ => None,
    }
  }

  pub fn into_candidate(self) -> Option<Candidate> {
    match self {
      Resource::Candidate(candidate) => Some(candidate),
      _ => None,
    }
  }

  pub fn into_matches(self) -> Option<MatchSet> {
    match self {
      Resource::Matches(matches) => Some(matches),
      _ => None,
    }
  }
}
