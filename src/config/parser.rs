use crate::config::types::JobConfig;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, parses and validates a job file
///
/// The schema it describes is built and validated too, so a job that loads
/// never fails on configuration once crawling starts.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use schema_crawler::config::load_config;
///
/// let job = load_config(Path::new("job.toml")).unwrap();
/// println!("Start URL: {}", job.crawl.url);
/// ```
pub fn load_config(path: &Path) -> Result<JobConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_job(&content)
}

/// Hex-encoded SHA-256 of a job file's bytes
///
/// Logged at start-up so a run's output can be traced back to its job file.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

/// Loads a job file and returns it with the hash of the text it was parsed from
///
/// The file is read once, so the hash always describes the job that runs even
/// if the file changes while loading.
pub fn load_config_with_hash(path: &Path) -> Result<(JobConfig, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let job = parse_job(&content)?;
    Ok((job, hash_content(&content)))
}

fn parse_job(content: &str) -> Result<JobConfig, ConfigError> {
    let job: JobConfig = toml::from_str(content)?;
    validate(&job)?;
    Ok(job)
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
