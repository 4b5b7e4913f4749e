//! Write operations and the cache keys they invalidate.

use std::fmt;

use super::error::ApiError;
use super::types::{Candidate, CandidateUpload, Job, NewJob};
use crate::cache::{Invalidation, Key};

/// A user-intended write against the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
  CreateJob(NewJob),
  DeleteJob { id: String },
  UploadCandidate(CandidateUpload),
  DeleteCandidate { id: String },
}

/// Direct result of a successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutput {
  Job(Job),
  Candidate(Candidate),
  Deleted { id: String },
}

impl Mutation {
  /// Check the payload before any network call.
  pub fn validate(&self) -> Result<(), ApiError> {
    match self {
      Mutation::CreateJob(job) => job.validate(),
      Mutation::UploadCandidate(upload) => upload.validate(),
      Mutation::DeleteJob { id } | Mutation::DeleteCandidate { id } => {
        if id.trim().is_empty() {
          Err(ApiError::Validation("id is required".to_string()))
        } else {
          Ok(())
        }
      }
    }
  }

  /// Keys affected once this mutation succeeds.
  ///
  /// | Mutation         | Invalidates                                   |
  /// |------------------|-----------------------------------------------|
  /// | create job       | all jobs                                      |
  /// | delete job       | all jobs; removes job detail and its matches  |
  /// | upload candidate | all candidates                                |
  /// | delete candidate | all candidates; removes candidate detail      |
  pub fn invalidations(&self) -> Vec<Invalidation> {
    match self {
      Mutation::CreateJob(_) => vec![Invalidation::Refetch(Key::jobs())],
      Mutation::DeleteJob { id } => vec![
        Invalidation::Refetch(Key::jobs()),
        Invalidation::Remove(Key::job(id)),
        Invalidation::Remove(Key::matches(id)),
      ],
      Mutation::UploadCandidate(_) => vec![Invalidation::Refetch(Key::candidates())],
      Mutation::DeleteCandidate { id } => vec![
        Invalidation::Refetch(Key::candidates()),
        Invalidation::Remove(Key::candidate(id)),
      ],
    }
  }
}

impl fmt::Display for Mutation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Mutation::CreateJob(job) => write!(f, "create job '{}'", job.title),
      Mutation::DeleteJob { id } => write!(f, "delete job {}", id),
      Mutation::UploadCandidate(upload) => write!(f, "upload candidate {}", upload.file_name),
      Mutation::DeleteCandidate { id } => write!(f, "delete candidate {}", id),
    }
  }
}
