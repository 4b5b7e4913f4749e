//! Serde types matching the matcher API's JSON payloads.
//!
//! These types are separate from domain types so that responses are checked
//! once at the boundary; only validated domain values enter the cache.

use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::types::{Candidate, CandidateMatch, Job, MatchSet, NewJob};

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiJobRequest<'a> {
  pub title: &'a str,
  pub description: &'a str,
  pub requirements: &'a [String],
}

impl<'a> From<&'a NewJob> for ApiJobRequest<'a> {
  fn from(job: &'a NewJob) -> Self {
    Self {
      title: &job.title,
      description: &job.description,
      requirements: &job.requirements,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiJob {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub requirements: Vec<String>,
  #[serde(default)]
  pub created_at: String,
}

impl TryFrom<ApiJob> for Job {
  type Error = ApiError;

  fn try_from(job: ApiJob) -> Result<Self, Self::Error> {
    if job.id.is_empty() {
      return Err(ApiError::MalformedResponse("job without id".to_string()));
    }
    Ok(Job {
      id: job.id,
      title: job.title,
      description: job.description,
      requirements: job.requirements,
      created_at: job.created_at,
    })
  }
}

// ============================================================================
// Candidates
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCandidate {
  pub id: String,
  #[serde(default)]
  pub full_name: String,
  pub email: Option<String>,
  #[serde(default)]
  pub skills: Vec<String>,
  pub cv_url: Option<String>,
  #[serde(default)]
  pub extracted_data: serde_json::Value,
  #[serde(default)]
  pub created_at: String,
}

impl TryFrom<ApiCandidate> for Candidate {
  type Error = ApiError;

  fn try_from(candidate: ApiCandidate) -> Result<Self, Self::Error> {
    if candidate.id.is_empty() {
      return Err(ApiError::MalformedResponse(
        "candidate without id".to_string(),
      ));
    }
    let full_name = if candidate.full_name.is_empty() {
      "Unknown".to_string()
    } else {
      candidate.full_name
    };
    Ok(Candidate {
      id: candidate.id,
      full_name,
      email: candidate.email,
      skills: candidate.skills,
      cv_url: candidate.cv_url,
      extracted_data: candidate.extracted_data,
      created_at: candidate.created_at,
    })
  }
}

// ============================================================================
// Matches
// ============================================================================

/// Either a list of strings or a single string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiStringList {
  Many(Vec<String>),
  One(String),
}

impl Default for ApiStringList {
  fn default() -> Self {
    ApiStringList::Many(Vec::new())
  }
}

impl From<ApiStringList> for Vec<String> {
  fn from(list: ApiStringList) -> Self {
    match list {
      ApiStringList::Many(items) => items,
      ApiStringList::One(item) if item.trim().is_empty() => Vec::new(),
      ApiStringList::One(item) => vec![item],
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiMatch {
  pub candidate_id: String,
  pub match_score: f64,
  #[serde(default)]
  pub strengths: ApiStringList,
  #[serde(default)]
  pub weaknesses: ApiStringList,
}

impl TryFrom<ApiMatch> for CandidateMatch {
  type Error = ApiError;

  fn try_from(m: ApiMatch) -> Result<Self, Self::Error> {
    if !(0.0..=100.0).contains(&m.match_score) {
      return Err(ApiError::MalformedResponse(format!(
        "match score {} for candidate {} is outside 0-100",
        m.match_score, m.candidate_id
      )));
    }
    Ok(CandidateMatch {
      candidate_id: m.candidate_id,
      match_score: m.match_score.round() as u8,
      strengths: m.strengths.into(),
      weaknesses: m.weaknesses.into(),
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiMatchResponse {
  pub job_id: Option<String>,
  #[serde(default)]
  pub matches: Vec<ApiMatch>,
  pub message: Option<String>,
}

impl ApiMatchResponse {
  /// Validate into a [`MatchSet`] for the job that was requested.
  pub fn into_match_set(self, requested_job: &str) -> Result<MatchSet, ApiError> {
    if let Some(job_id) = &self.job_id {
      if job_id != requested_job {
        return Err(ApiError::MalformedResponse(format!(
          "matches for job {} returned for job {}",
          job_id, requested_job
        )));
      }
    }
    let matches = self
      .matches
      .into_iter()
      .map(CandidateMatch::try_from)
      .collect::<Result<Vec<_>, _>>()?;

    Ok(MatchSet {
      job_id: requested_job.to_string(),
      matches,
      message: self.message,
    })
  }
}

// ============================================================================
// Errors
// ============================================================================

/// FastAPI-style error body.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub detail: serde_json::Value,
}

impl ApiErrorBody {
  pub fn message(&self) -> String {
    match &self.detail {
      serde_json::Value::String(s) => s.clone(),
      other => other.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_match_lists_accept_string_or_array() {
    let response: ApiMatchResponse = serde_json::from_str(
      r#"{
        "job_id": "j1",
        "matches": [
          {"candidate_id": "c1", "match_score": 87, "strengths": ["Go", "SQL"], "weaknesses": "No cloud experience"},
          {"candidate_id": "c2", "match_score": 61.6}
        ]
      }"#,
    )
    .unwrap();

    let set = response.into_match_set("j1").unwrap();
    assert_eq!(set.matches.len(), 2);
    assert_eq!(set.matches[0].match_score, 87);
    assert_eq!(set.matches[0].strengths, vec!["Go", "SQL"]);
    assert_eq!(set.matches[0].weaknesses, vec!["No cloud experience"]);
    assert_eq!(set.matches[1].match_score, 62);
    assert!(set.matches[1].strengths.is_empty());
  }

  #[test]
  fn test_match_score_out_of_range_is_rejected() {
    let response: ApiMatchResponse = serde_json::from_str(
      r#"{"matches": [{"candidate_id": "c1", "match_score": 140}]}"#,
    )
    .unwrap();
    assert!(matches!(
      response.into_match_set("j1"),
      Err(ApiError::MalformedResponse(_))
    ));
  }

  #[test]
  fn test_empty_matches_with_message() {
    let response: ApiMatchResponse = serde_json::from_str(
      r#"{"matches": [], "message": "No candidates found to match."}"#,
    )
    .unwrap();
    let set = response.into_match_set("j1").unwrap();
    assert!(set.matches.is_empty());
    assert_eq!(set.job_id, "j1");
    assert_eq!(set.message.as_deref(), Some("No candidates found to match."));
  }

  #[test]
  fn test_candidate_defaults() {
    let api: ApiCandidate = serde_json::from_str(
      r#"{"id": "c1", "full_name": "", "email": null, "cv_url": null, "extracted_data": {"summary": "x"}, "created_at": "2024-01-01T00:00:00"}"#,
    )
    .unwrap();
    let candidate = Candidate::try_from(api).unwrap();
    assert_eq!(candidate.full_name, "Unknown");
    assert!(candidate.skills.is_empty());
    assert_eq!(candidate.extracted_data["summary"], "x");
  }

  #[test]
  fn test_job_requires_id() {
    let result: Result<ApiJob, _> = serde_json::from_str(r#"{"title": "Engineer"}"#);
    assert!(result.is_err());
  }

  #[test]
  fn test_error_body_message() {
    let body: ApiErrorBody = serde_json::from_str(r#"{"detail": "Job not found"}"#).unwrap();
    assert_eq!(body.message(), "Job not found");
  }
}
