//! Session client that wraps the API with transparent caching.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::client::TalentApi;
use super::error::ApiError;
use super::mutation::{Mutation, MutationOutput};
use super::types::{Candidate, CandidateUpload, Job, MatchSet, NewJob, Resource};
use crate::cache::{loader, FetchPolicy, FetchSource, Key, Loader, QueryClient};
use crate::query::{QueryState, Subscription};

/// API client with a session-scoped query cache.
///
/// One instance is created per session and cloned into every consumer; all
/// clones share the same cache.
pub struct TalentClient<A> {
  api: Arc<A>,
  cache: QueryClient<Resource>,
  selected_job: Arc<Mutex<Option<String>>>,
  pending: Arc<Mutex<Vec<Mutation>>>,
}

impl<A> Clone for TalentClient<A> {
  fn clone(&self) -> Self {
    Self {
      api: Arc::clone(&self.api),
      cache: self.cache.clone(),
      selected_job: Arc::clone(&self.selected_job),
      pending: Arc::clone(&self.pending),
    }
  }
}

/// Removes a mutation from the pending list when the call ends or is dropped.
struct PendingGuard {
  pending: Arc<Mutex<Vec<Mutation>>>,
  mutation: Mutation,
}

impl Drop for PendingGuard {
  fn drop(&mut self) {
    let mut pending = lock(&self.pending);
    if let Some(pos) = pending.iter().position(|m| *m == self.mutation) {
      pending.remove(pos);
    }
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<A: TalentApi> TalentClient<A> {
  pub fn new(api: A) -> Self {
    Self {
      api: Arc::new(api),
      cache: QueryClient::new(),
      selected_job: Arc::new(Mutex::new(None)),
      pending: Arc::new(Mutex::new(Vec::new())),
    }
  }

  pub fn cache(&self) -> &QueryClient<Resource> {
    &self.cache
  }

  /// Subscribe to all job postings.
  pub fn jobs(&self) -> Subscription<Resource> {
    self.cache.subscribe(&Key::jobs(), self.jobs_loader())
  }

  /// Subscribe to all candidate profiles.
  pub fn candidates(&self) -> Subscription<Resource> {
    self.cache.subscribe(&Key::candidates(), self.candidates_loader())
  }

  /// Subscribe to a single job posting.
  pub fn job(&self, id: &str) -> Subscription<Resource> {
    let api = Arc::clone(&self.api);
    let id = id.to_string();
    let key = Key::job(&id);
    self.cache.subscribe(
      &key,
      loader(move || {
        let api = Arc::clone(&api);
        let id = id.clone();
        async move {
          let jobs = api.list_jobs().await?;
          jobs
            .into_iter()
            .find(|job| job.id == id)
            .map(Resource::Job)
            .ok_or_else(|| ApiError::NotFound(format!("job {}", id)))
        }
      }),
    )
  }

  /// Subscribe to a single candidate profile.
  pub fn candidate(&self, id: &str) -> Subscription<Resource> {
    let api = Arc::clone(&self.api);
    let id = id.to_string();
    let key = Key::candidate(&id);
    self.cache.subscribe(
      &key,
      loader(move || {
        let api = Arc::clone(&api);
        let id = id.clone();
        async move {
          let candidates = api.list_candidates().await?;
          candidates
            .into_iter()
            .find(|candidate| candidate.id == id)
            .map(Resource::Candidate)
            .ok_or_else(|| ApiError::NotFound(format!("candidate {}", id)))
        }
      }),
    )
  }

  /// Change the job whose matches are shown and start computing them.
  ///
  /// Matches are never kept across selections: the previous job's entry is
  /// dropped, so a response still in flight for it is discarded. Selecting
  /// the current job again joins the existing entry.
  pub fn select_job(&self, job_id: Option<&str>) -> Option<Subscription<Resource>> {
    let previous = {
      let mut selected = lock(&self.selected_job);
      std::mem::replace(&mut *selected, job_id.map(String::from))
    };

    if let Some(prev) = previous.as_deref() {
      if Some(prev) != job_id {
        self.cache.forget(&Key::matches(prev));
      }
    }

    let job_id = job_id?;
    let key = Key::matches(job_id);
    if previous.as_deref() == Some(job_id) {
      if let Some(subscription) = self.cache.watch(&key) {
        return Some(subscription);
      }
    }
    Some(
      self
        .cache
        .subscribe_with(&key, self.matches_loader(job_id), FetchPolicy::NetworkOnly),
    )
  }

  pub fn selected_job(&self) -> Option<String> {
    lock(&self.selected_job).clone()
  }

  /// Matches for the selected job; `Idle` without a selection.
  pub fn selected_matches(&self) -> QueryState<MatchSet> {
    match self.selected_job() {
      Some(job_id) => self
        .cache
        .state(&Key::matches(&job_id))
        .map(|r| r.into_matches())
        .flatten(),
      None => QueryState::Idle,
    }
  }

  /// Recompute matches for the selected job.
  pub fn retry_matches(&self) -> Option<FetchSource> {
    let job_id = self.selected_job()?;
    self.cache.refetch(&Key::matches(&job_id))
  }

  /// Whether an identical mutation is still in flight.
  ///
  /// Advisory: lets presentation code disable duplicate submission.
  pub fn is_pending(&self, mutation: &Mutation) -> bool {
    lock(&self.pending).contains(mutation)
  }

  /// Run a mutation once and invalidate the keys it affects.
  ///
  /// Validation failures are returned before any network call. On failure
  /// the cache is left as it was.
  pub async fn mutate(&self, mutation: Mutation) -> Result<MutationOutput, ApiError> {
    mutation.validate()?;

    lock(&self.pending).push(mutation.clone());
    let _guard = PendingGuard {
      pending: Arc::clone(&self.pending),
      mutation: mutation.clone(),
    };

    let label = mutation.to_string();
    let invalidations = mutation.invalidations();
    let api = Arc::clone(&self.api);
    let call = async {
      match &mutation {
        Mutation::CreateJob(job) => api.create_job(job).await.map(MutationOutput::Job),
        Mutation::DeleteJob { id } => api
          .delete_job(id)
          .await
          .map(|_| MutationOutput::Deleted { id: id.clone() }),
        Mutation::UploadCandidate(upload) => api
          .upload_candidate(upload)
          .await
          .map(MutationOutput::Candidate),
        Mutation::DeleteCandidate { id } => api
          .delete_candidate(id)
          .await
          .map(|_| MutationOutput::Deleted { id: id.clone() }),
      }
    };
    let output = self.cache.mutate(label, invalidations, call).await?;

    if let Mutation::DeleteJob { id } = &mutation {
      let mut selected = lock(&self.selected_job);
      if selected.as_deref() == Some(id.as_str()) {
        *selected = None;
      }
    }
    Ok(output)
  }

  pub async fn create_job(&self, job: NewJob) -> Result<Job, ApiError> {
    match self.mutate(Mutation::CreateJob(job)).await? {
      MutationOutput::Job(job) => Ok(job),
      other => Err(unexpected_output(&other)),
    }
  }

  pub async fn delete_job(&self, id: &str) -> Result<(), ApiError> {
    self
      .mutate(Mutation::DeleteJob { id: id.to_string() })
      .await
      .map(|_| ())
  }

  pub async fn upload_candidate(&self, upload: CandidateUpload) -> Result<Candidate, ApiError> {
    match self.mutate(Mutation::UploadCandidate(upload)).await? {
      MutationOutput::Candidate(candidate) => Ok(candidate),
      other => Err(unexpected_output(&other)),
    }
  }

  pub async fn delete_candidate(&self, id: &str) -> Result<(), ApiError> {
    self
      .mutate(Mutation::DeleteCandidate { id: id.to_string() })
      .await
      .map(|_| ())
  }

  fn jobs_loader(&self) -> Loader<Resource> {
    let api = Arc::clone(&self.api);
    loader(move || {
      let api = Arc::clone(&api);
      async move { api.list_jobs().await.map(Resource::Jobs) }
    })
  }

  fn candidates_loader(&self) -> Loader<Resource> {
    let api = Arc::clone(&self.api);
    loader(move || {
      let api = Arc::clone(&api);
      async move { api.list_candidates().await.map(Resource::Candidates) }
    })
  }

  fn matches_loader(&self, job_id: &str) -> Loader<Resource> {
    let api = Arc::clone(&self.api);
    let job_id = job_id.to_string();
    loader(move || {
      let api = Arc::clone(&api);
      let job_id = job_id.clone();
      async move { api.match_candidates(&job_id).await.map(Resource::Matches) }
    })
  }
}

fn unexpected_output(output: &MutationOutput) -> ApiError {
  ApiError::MalformedResponse(format!("unexpected mutation result {:?}", output))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::CandidateMatch;
  use async_trait::async_trait;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;
  use tokio::sync::{oneshot, Notify};

  /// In-memory API with call counters and optional gates.
  #[derive(Default)]
  struct FakeApi {
    jobs: Mutex<Vec<Job>>,
    candidates: Mutex<Vec<Candidate>>,
    list_jobs_calls: AtomicUsize,
    list_candidates_calls: AtomicUsize,
    create_job_calls: AtomicUsize,
    match_calls: AtomicUsize,
    /// Pending match responses per job; jobs without one answer immediately
    match_gates: Mutex<HashMap<String, oneshot::Receiver<Result<MatchSet, ApiError>>>>,
    create_gate: Option<Arc<Notify>>,
  }

  impl FakeApi {
    fn with_candidates(ids: &[&str]) -> Self {
      let api = FakeApi::default();
      *api.candidates.lock().unwrap() = ids.iter().map(|id| candidate(id)).collect();
      api
    }
  }

  fn candidate(id: &str) -> Candidate {
    Candidate {
      id: id.to_string(),
      full_name: format!("Candidate {}", id),
      email: None,
      skills: vec!["Rust".to_string()],
      cv_url: None,
      extracted_data: serde_json::Value::Null,
      created_at: "2024-01-01T00:00:00".to_string(),
    }
  }

  fn match_set(job_id: &str) -> MatchSet {
    MatchSet {
      job_id: job_id.to_string(),
      matches: vec![CandidateMatch {
        candidate_id: "c1".to_string(),
        match_score: 90,
        strengths: vec!["Go".to_string()],
        weaknesses: Vec::new(),
      }],
      message: None,
    }
  }

  #[async_trait]
  impl TalentApi for FakeApi {
    async fn list_jobs(&self) -> Result<Vec<Job>, ApiError> {
      self.list_jobs_calls.fetch_add(1, Ordering::SeqCst);
      Ok(self.jobs.lock().unwrap().clone())
    }

    async fn create_job(&self, job: &NewJob) -> Result<Job, ApiError> {
      self.create_job_calls.fetch_add(1, Ordering::SeqCst);
      if let Some(gate) = &self.create_gate {
        gate.notified().await;
      }
      let mut jobs = self.jobs.lock().unwrap();
      let created = Job {
        id: format!("j{}", jobs.len() + 1),
        title: job.title.clone(),
        description: job.description.clone(),
        requirements: job.requirements.clone(),
        created_at: "2024-01-01T00:00:00".to_string(),
      };
      jobs.push(created.clone());
      Ok(created)
    }

    async fn delete_job(&self, id: &str) -> Result<(), ApiError> {
      let mut jobs = self.jobs.lock().unwrap();
      let before = jobs.len();
      jobs.retain(|job| job.id != id);
      if jobs.len() == before {
        return Err(ApiError::NotFound(format!("job {}", id)));
      }
      Ok(())
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>, ApiError> {
      self.list_candidates_calls.fetch_add(1, Ordering::SeqCst);
      Ok(self.candidates.lock().unwrap().clone())
    }

    async fn upload_candidate(&self, upload: &CandidateUpload) -> Result<Candidate, ApiError> {
      let created = candidate(upload.file_name.trim_end_matches(".pdf"));
      self.candidates.lock().unwrap().push(created.clone());
      Ok(created)
    }

    async fn delete_candidate(&self, id: &str) -> Result<(), ApiError> {
      let mut candidates = self.candidates.lock().unwrap();
      let before = candidates.len();
      candidates.retain(|c| c.id != id);
      if candidates.len() == before {
        return Err(ApiError::NotFound(format!("candidate {}", id)));
      }
      Ok(())
    }

    async fn match_candidates(&self, job_id: &str) -> Result<MatchSet, ApiError> {
      self.match_calls.fetch_add(1, Ordering::SeqCst);
      let gate = self.match_gates.lock().unwrap().remove(job_id);
      match gate {
        Some(rx) => rx
          .await
          .unwrap_or_else(|_| Err(ApiError::Network("cancelled".to_string()))),
        None => Ok(match_set(job_id)),
      }
    }
  }

  fn jobs_of(state: QueryState<Resource>) -> Vec<Job> {
    state.data().cloned().and_then(Resource::into_jobs).unwrap_or_default()
  }

  fn candidate_ids(state: QueryState<Resource>) -> Vec<String> {
    state
      .data()
      .cloned()
      .and_then(Resource::into_candidates)
      .unwrap_or_default()
      .into_iter()
      .map(|c| c.id)
      .collect()
  }

  #[tokio::test]
  async fn test_create_job_refreshes_cached_list() {
    let client = TalentClient::new(FakeApi::default());

    let mut jobs = client.jobs();
    assert!(jobs_of(jobs.settled().await).is_empty());

    let created = client
      .create_job(NewJob {
        title: "Engineer".to_string(),
        description: "...".to_string(),
        requirements: vec!["Go".to_string(), "SQL".to_string()],
      })
      .await
      .unwrap();

    let listed = jobs_of(jobs.settled().await);
    assert_eq!(listed.iter().filter(|j| j.id == created.id).count(), 1);
    assert_eq!(listed[0].requirements, vec!["Go", "SQL"]);
    assert_eq!(client.api.list_jobs_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_invalid_job_is_rejected_before_network() {
    let client = TalentClient::new(FakeApi::default());
    let mut jobs = client.jobs();
    jobs.settled().await;

    let result = client
      .create_job(NewJob::from_input("", "desc", "Go"))
      .await;
    assert!(matches!(result, Err(ApiError::Validation(_))));
    assert_eq!(client.api.create_job_calls.load(Ordering::SeqCst), 0);
    assert!(!jobs.is_stale());
    assert_eq!(client.api.list_jobs_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_delete_candidate_updates_detail_and_list() {
    let client = TalentClient::new(FakeApi::with_candidates(&["c1", "c2"]));

    let mut list = client.candidates();
    let mut detail = client.candidate("c1");
    assert_eq!(candidate_ids(list.settled().await), vec!["c1", "c2"]);
    let shown = detail.settled().await.map(Resource::into_candidate).flatten();
    assert_eq!(shown, QueryState::Success(candidate("c1")));

    client.delete_candidate("c1").await.unwrap();

    let detail_state = detail.settled().await;
    assert!(detail_state.error().is_some_and(ApiError::is_not_found));
    assert!(client.cache().entry(&Key::candidate("c1")).is_none());

    assert_eq!(candidate_ids(list.settled().await), vec!["c2"]);
  }

  #[tokio::test]
  async fn test_failed_delete_invalidates_nothing() {
    let client = TalentClient::new(FakeApi::with_candidates(&["c1"]));
    let mut list = client.candidates();
    list.settled().await;

    let result = client.delete_candidate("missing").await;
    assert!(result.is_err_and(|e| e.is_not_found()));
    assert!(!list.is_stale());
    assert_eq!(client.api.list_candidates_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_upload_refreshes_candidates() {
    let client = TalentClient::new(FakeApi::with_candidates(&["c1"]));
    let mut list = client.candidates();
    list.settled().await;

    let rejected = client
      .upload_candidate(CandidateUpload::new("cv.txt", vec![1]))
      .await;
    assert!(matches!(rejected, Err(ApiError::Validation(_))));

    let created = client
      .upload_candidate(CandidateUpload::new("c9.pdf", vec![1, 2, 3]))
      .await
      .unwrap();
    assert_eq!(created.id, "c9");
    assert_eq!(candidate_ids(list.settled().await), vec!["c1", "c9"]);
  }

  #[tokio::test]
  async fn test_switching_job_discards_late_matches() {
    let api = FakeApi::default();
    let (j1_tx, j1_rx) = oneshot::channel();
    api.match_gates.lock().unwrap().insert("j1".to_string(), j1_rx);
    let client = TalentClient::new(api);

    let first = client.select_job(Some("j1")).unwrap();
    assert!(first.state().is_loading());

    let mut second = client.select_job(Some("j2")).unwrap();
    let settled = second.settled().await.map(|r| r.into_matches());
    assert_eq!(settled, QueryState::Success(Some(match_set("j2"))));

    // j1 answers after the switch
    j1_tx.send(Ok(match_set("j1"))).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!first.state().is_success());
    assert!(client.cache().entry(&Key::matches("j1")).is_none());
    assert_eq!(client.selected_matches(), QueryState::Success(match_set("j2")));
    assert_eq!(client.api.match_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_matches_are_not_cached_across_selections() {
    let client = TalentClient::new(FakeApi::default());

    client.select_job(Some("j1")).unwrap().settled().await;
    client.select_job(Some("j2")).unwrap().settled().await;
    let mut again = client.select_job(Some("j1")).unwrap();
    assert_eq!(again.state(), QueryState::Loading { data: None });
    again.settled().await;

    assert_eq!(client.api.match_calls.load(Ordering::SeqCst), 3);

    // Re-selecting the current job joins the existing entry
    client.select_job(Some("j1")).unwrap();
    assert_eq!(client.api.match_calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_compute_failure_shows_no_stale_matches() {
    let api = FakeApi::default();
    let (tx, rx) = oneshot::channel();
    api.match_gates.lock().unwrap().insert("j1".to_string(), rx);
    let client = TalentClient::new(api);

    let mut sub = client.select_job(Some("j1")).unwrap();
    tx.send(Err(ApiError::Compute("model unavailable".to_string())))
      .unwrap();
    sub.settled().await;

    assert_eq!(
      client.selected_matches(),
      QueryState::Error {
        error: ApiError::Compute("model unavailable".to_string()),
        data: None,
      }
    );
    assert_eq!(client.selected_job().as_deref(), Some("j1"));

    // User-triggered retry
    assert_eq!(client.retry_matches(), Some(FetchSource::Network));
    sub.settled().await;
    assert_eq!(client.selected_matches(), QueryState::Success(match_set("j1")));
  }

  #[tokio::test]
  async fn test_clearing_selection() {
    let client = TalentClient::new(FakeApi::default());
    client.select_job(Some("j1")).unwrap().settled().await;

    assert!(client.select_job(None).is_none());
    assert!(client.selected_matches().is_idle());
    assert!(client.cache().entry(&Key::matches("j1")).is_none());
  }

  #[tokio::test]
  async fn test_pending_mutation_is_tracked() {
    let gate = Arc::new(Notify::new());
    let api = FakeApi {
      create_gate: Some(gate.clone()),
      ..FakeApi::default()
    };
    let client = TalentClient::new(api);
    let mutation = Mutation::CreateJob(NewJob::from_input("Engineer", "...", "Go"));

    let task = tokio::spawn({
      let client = client.clone();
      let mutation = mutation.clone();
      async move { client.mutate(mutation).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(client.is_pending(&mutation));

    gate.notify_one();
    task.await.unwrap().unwrap();
    assert!(!client.is_pending(&mutation));
  }

  #[tokio::test]
  async fn test_delete_job_clears_selection() {
    let api = FakeApi::default();
    api.jobs.lock().unwrap().push(Job {
      id: "j1".to_string(),
      title: "Engineer".to_string(),
      description: "...".to_string(),
      requirements: vec!["Go".to_string()],
      created_at: String::new(),
    });
    let client = TalentClient::new(api);
    let mut matches = client.select_job(Some("j1")).unwrap();
    matches.settled().await;

    client.delete_job("j1").await.unwrap();

    assert!(client.selected_job().is_none());
    assert!(matches.state().error().is_some_and(ApiError::is_not_found));
  }

  #[tokio::test]
  async fn test_job_detail_not_found_leaves_list_intact() {
    let api = FakeApi::default();
    api.jobs.lock().unwrap().push(Job {
      id: "j1".to_string(),
      title: "Engineer".to_string(),
      description: "...".to_string(),
      requirements: vec!["Go".to_string()],
      created_at: String::new(),
    });
    let client = TalentClient::new(api);
    let mut list = client.jobs();
    list.settled().await;

    let mut found = client.job("j1");
    let job = found.settled().await.map(Resource::into_job).flatten();
    assert_eq!(job.data().map(|j| j.title.as_str()), Some("Engineer"));

    let mut detail = client.job("missing");
    assert!(detail.settled().await.error().is_some_and(ApiError::is_not_found));
    assert!(list.state().is_success());
  }
}
