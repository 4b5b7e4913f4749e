use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{multipart, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::api_types::{ApiCandidate, ApiErrorBody, ApiJob, ApiJobRequest, ApiMatchResponse};
use super::error::ApiError;
use super::types::{Candidate, CandidateUpload, Job, MatchSet, NewJob};
use crate::config::ApiConfig;

/// Calls offered by the matcher API.
#[async_trait]
pub trait TalentApi: Send + Sync + 'static {
  async fn list_jobs(&self) -> Result<Vec<Job>, ApiError>;

  async fn create_job(&self, job: &NewJob) -> Result<Job, ApiError>;

  async fn delete_job(&self, id: &str) -> Result<(), ApiError>;

  async fn list_candidates(&self) -> Result<Vec<Candidate>, ApiError>;

  /// Upload a CV; the server extracts and returns the candidate profile.
  async fn upload_candidate(&self, upload: &CandidateUpload) -> Result<Candidate, ApiError>;

  async fn delete_candidate(&self, id: &str) -> Result<(), ApiError>;

  /// Compute top-ranked candidates for a job. Safe to repeat.
  async fn match_candidates(&self, job_id: &str) -> Result<MatchSet, ApiError>;
}

/// Which error a non-success status maps to besides 400/404/422.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
  Resource,
  Compute,
}

/// HTTP client for the matcher API
#[derive(Clone)]
pub struct HttpApi {
  http: reqwest::Client,
  base_url: Url,
}

impl HttpApi {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid API base URL {}: {}", config.base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Invalid API base URL {}", config.base_url));
    }

    let http = reqwest::Client::builder()
      .timeout(config.timeout())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  /// Build an endpoint URL from path segments, percent-encoding each one.
  fn endpoint(&self, segments: &[&str], trailing_slash: bool) -> Result<Url, ApiError> {
    let mut url = self.base_url.clone();
    {
      let mut path = url
        .path_segments_mut()
        .map_err(|_| ApiError::Validation(format!("invalid base URL {}", self.base_url)))?;
      path.pop_if_empty().extend(segments);
      if trailing_slash {
        path.push("");
      }
    }
    Ok(url)
  }

  async fn send(&self, request: RequestBuilder, endpoint: Endpoint) -> Result<Response, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
      .map(|b| b.message())
      .unwrap_or_else(|_| if body.is_empty() { status.to_string() } else { body });
    Err(status_error(status, message, endpoint))
  }

  async fn send_json<R: DeserializeOwned>(
    &self,
    request: RequestBuilder,
    endpoint: Endpoint,
  ) -> Result<R, ApiError> {
    let response = self.send(request, endpoint).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
  }
}

fn status_error(status: StatusCode, message: String, endpoint: Endpoint) -> ApiError {
  match status {
    StatusCode::NOT_FOUND => ApiError::NotFound(message),
    StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(message),
    _ if endpoint == Endpoint::Compute => ApiError::Compute(format!("{}: {}", status, message)),
    _ => ApiError::Network(format!("{}: {}", status, message)),
  }
}

#[async_trait]
impl TalentApi for HttpApi {
  async fn list_jobs(&self) -> Result<Vec<Job>, ApiError> {
    let url = self.endpoint(&["jobs"], true)?;
    let jobs: Vec<ApiJob> = self.send_json(self.http.get(url), Endpoint::Resource).await?;
    jobs.into_iter().map(Job::try_from).collect()
  }

  async fn create_job(&self, job: &NewJob) -> Result<Job, ApiError> {
    let url = self.endpoint(&["jobs"], true)?;
    let request = self.http.post(url).json(&ApiJobRequest::from(job));
    let created: ApiJob = self.send_json(request, Endpoint::Resource).await?;
    created.try_into()
  }

  async fn delete_job(&self, id: &str) -> Result<(), ApiError> {
    let url = self.endpoint(&["jobs", id], false)?;
    self.send(self.http.delete(url), Endpoint::Resource).await?;
    Ok(())
  }

  async fn list_candidates(&self) -> Result<Vec<Candidate>, ApiError> {
    let url = self.endpoint(&["candidates"], true)?;
    let candidates: Vec<ApiCandidate> =
      self.send_json(self.http.get(url), Endpoint::Resource).await?;
    candidates.into_iter().map(Candidate::try_from).collect()
  }

  async fn upload_candidate(&self, upload: &CandidateUpload) -> Result<Candidate, ApiError> {
    let url = self.endpoint(&["candidates", "upload"], false)?;
    let part = multipart::Part::bytes(upload.content.clone())
      .file_name(upload.file_name.clone())
      .mime_str("application/pdf")?;
    let form = multipart::Form::new().part("file", part);

    let created: ApiCandidate = self
      .send_json(self.http.post(url).multipart(form), Endpoint::Resource)
      .await?;
    created.try_into()
  }

  async fn delete_candidate(&self, id: &str) -> Result<(), ApiError> {
    let url = self.endpoint(&["candidates", id], false)?;
    self.send(self.http.delete(url), Endpoint::Resource).await?;
    Ok(())
  }

  async fn match_candidates(&self, job_id: &str) -> Result<MatchSet, ApiError> {
    let url = self.endpoint(&["matches", "match", job_id], false)?;
    let response: ApiMatchResponse = self
      .send_json(self.http.post(url), Endpoint::Compute)
      .await?;
    response.into_match_set(job_id)
  }
}
