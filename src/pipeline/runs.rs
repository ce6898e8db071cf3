//! Race-safe allocation of dated, numbered run directories.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use regex::Regex;

use super::EngineError;

/// Bound on exclusive-create attempts before the run is failed.
const MAX_ALLOCATION_ATTEMPTS: u32 = 100;

/// An allocated run: its identifier and the directory that now exists.
#[derive(Debug, Clone)]
pub struct RunLocation {
    pub run_id: String,
    pub run_path: PathBuf,
}

/// Allocate the next run directory under `output_base` for `today`.
///
/// Existing children matching `YYYY-MM-DD_run_NNN` for today's date set
/// the starting counter at `max + 1`. Creation is exclusive: a concurrent
/// allocator observing the same counter loses the `create_dir` race,
/// increments, and retries, bounded by [`MAX_ALLOCATION_ATTEMPTS`].
pub async fn allocate_run(output_base: &Path, today: NaiveDate) -> Result<RunLocation, EngineError> {
    tokio::fs::create_dir_all(output_base).await?;

    let date = today.format("%Y-%m-%d").to_string();
    let mut counter = highest_existing_run(output_base, &date).await? + 1;

    for _ in 0..MAX_ALLOCATION_ATTEMPTS {
        let run_id = format!("{date}_run_{counter:03}");
        let run_path = output_base.join(&run_id);

        match tokio::fs::create_dir(&run_path).await {
            Ok(()) => {
                tracing::info!(run_id, path = %run_path.display(), "allocated run directory");
                return Ok(RunLocation { run_id, run_path });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                counter += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(EngineError::AllocationExhausted {
        attempts: MAX_ALLOCATION_ATTEMPTS,
    })
}

async fn highest_existing_run(output_base: &Path, date: &str) -> io::Result<u32> {
    let pattern = Regex::new(&format!(r"^{}_run_(\d+)$", regex::escape(date)))
        .expect("run directory regex");

    let mut highest = 0u32;
    let mut entries = tokio::fs::read_dir(output_base).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(captures) = pattern.captures(name) {
            if let Ok(number) = captures[1].parse::<u32>() {
                highest = highest.max(number);
            }
        }
    }
    Ok(highest)
}

/// Create (or reuse) the directory for a job inside a run.
pub async fn create_job_directory(run_path: &Path, job_id: &str) -> io::Result<PathBuf> {
    let job_path = run_path.join(format!("job_{job_id}"));
    tokio::fs::create_dir_all(&job_path).await?;
    Ok(job_path)
}
