use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};

use cvmatch::api::types::{CandidateUpload, NewJob, Resource};
use cvmatch::{config, logging, HttpApi, QueryState, Subscription, TalentClient};

#[derive(Parser, Debug)]
#[command(name = "cvmatch")]
#[command(about = "Manage job postings and candidates, and rank candidates against a job")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/cvmatch/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL, e.g. http://localhost:8000/api
  #[arg(long)]
  api_url: Option<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// List job postings
  Jobs,
  /// List candidate profiles
  Candidates,
  /// Create a job posting
  CreateJob {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: String,
    /// Comma-separated list
    #[arg(long)]
    requirements: String,
  },
  /// Delete a job posting
  DeleteJob { id: String },
  /// Upload a CV (PDF) to create a candidate
  Upload { path: PathBuf },
  /// Delete a candidate profile
  DeleteCandidate { id: String },
  /// Rank candidates against a job
  Matches { job_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override API URL if specified on command line
  if let Some(url) = args.api_url {
    config.api.base_url = url;
  }

  let _log_guard = logging::init(&config.log)?;

  let client = TalentClient::new(HttpApi::new(&config.api)?);

  match args.command {
    Commands::Jobs => {
      let jobs = settled(client.jobs(), Resource::into_jobs).await?;
      if jobs.is_empty() {
        println!("No job postings");
      }
      for job in jobs {
        println!("{}  {}  [{}]", job.id, job.title, job.requirements.join(", "));
      }
    }
    Commands::Candidates => {
      let candidates = settled(client.candidates(), Resource::into_candidates).await?;
      if candidates.is_empty() {
        println!("No candidates");
      }
      for candidate in candidates {
        println!(
          "{}  {}  {}",
          candidate.id,
          candidate.full_name,
          candidate.email.as_deref().unwrap_or("-")
        );
      }
    }
    Commands::CreateJob {
      title,
      description,
      requirements,
    } => {
      let job = client
        .create_job(NewJob::from_input(&title, &description, &requirements))
        .await?;
      println!("Created job {} ({})", job.id, job.title);
    }
    Commands::DeleteJob { id } => {
      client.delete_job(&id).await?;
      println!("Deleted job {}", id);
    }
    Commands::Upload { path } => {
      let candidate = client.upload_candidate(read_upload(&path)?).await?;
      println!("Created candidate {} ({})", candidate.id, candidate.full_name);
    }
    Commands::DeleteCandidate { id } => {
      client.delete_candidate(&id).await?;
      println!("Deleted candidate {}", id);
    }
    Commands::Matches { job_id } => {
      let subscription = client
        .select_job(Some(&job_id))
        .ok_or_else(|| eyre!("No job selected"))?;
      let set = settled(subscription, Resource::into_matches).await?;
      if let Some(message) = &set.message {
        println!("{}", message);
      }
      for (rank, m) in set.matches.iter().take(config.matches.top_n).enumerate() {
        println!("{}. {}  {}%", rank + 1, m.candidate_id, m.match_score);
        if !m.strengths.is_empty() {
          println!("   + {}", m.strengths.join("; "));
        }
        if !m.weaknesses.is_empty() {
          println!("   - {}", m.weaknesses.join("; "));
        }
      }
    }
  }

  Ok(())
}

/// Wait for a query to settle and extract its payload.
async fn settled<R>(
  mut subscription: Subscription<Resource>,
  extract: fn(Resource) -> Option<R>,
) -> Result<R> {
  match subscription.settled().await.map(extract).flatten() {
    QueryState::Success(data) => Ok(data),
    QueryState::Error { error, .. } => Err(eyre!("{} failed: {}", subscription.key(), error)),
    QueryState::Idle | QueryState::Loading { .. } => {
      Err(eyre!("{} returned no data", subscription.key()))
    }
  }
}

fn read_upload(path: &Path) -> Result<CandidateUpload> {
  let content =
    std::fs::read(path).map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
  let file_name = path
    .file_name()
    .and_then(|n| n.to_str())
    .ok_or_else(|| eyre!("Invalid file name: {}", path.display()))?;
  Ok(CandidateUpload::new(file_name, content))
}
