//! Engine configuration, read from the environment at startup.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::retry::RetryPolicy;

pub const APP_NAME: &str = "customs-audit";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter when RUST_LOG is not set.
pub fn default_log_filter() -> String {
    "info,customs_audit=debug".to_string()
}

/// Configuration for the batch processing engine.
///
/// Concurrency budgets and the retry envelope are plain data so tests can
/// tighten them without touching the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Absolute base directory for run output.
    pub output_dir: PathBuf,
    /// Explicit checklist directory; `None` falls back to path resolution
    /// in the checklist store.
    pub checklists_dir: Option<PathBuf>,
    /// Maximum jobs processed in parallel within a run.
    pub max_parallel_jobs: usize,
    /// Maximum files classified in parallel within a job.
    pub max_parallel_files: usize,
    /// Global cap on in-flight provider calls across the whole process.
    pub max_inflight_llm: usize,
    /// Per-attempt timeout for provider calls.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Model for classification and extraction.
    pub fast_model: String,
    /// Model for checklist validation.
    pub reasoning_model: String,
    /// Whether the tariff line-item checks run when an agent is wired.
    pub tariff_checks_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            checklists_dir: None,
            max_parallel_jobs: 4,
            max_parallel_files: 8,
            max_inflight_llm: 100,
            request_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
            fast_model: "gemini-2.5-flash".to_string(),
            reasoning_model: "gemini-2.5-pro".to_string(),
            tariff_checks_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset. `OUTPUT_DIRECTORY` is resolved to an
    /// absolute path here and used verbatim everywhere else.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let output_dir = env::var("OUTPUT_DIRECTORY")
            .map(|v| absolutize(Path::new(&v)))
            .unwrap_or(defaults.output_dir);

        let checklists_dir = env::var("CHECKLISTS_DIR").ok().map(PathBuf::from);

        Self {
            output_dir,
            checklists_dir,
            max_parallel_jobs: env_usize("MAX_PARALLEL_JOBS", defaults.max_parallel_jobs),
            max_parallel_files: env_usize("MAX_PARALLEL_FILES", defaults.max_parallel_files),
            max_inflight_llm: env_usize("MAX_INFLIGHT_LLM", defaults.max_inflight_llm),
            request_timeout: Duration::from_secs(env_u64(
                "LLM_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            retry: defaults.retry,
            fast_model: env::var("LLM_FAST_MODEL").unwrap_or(defaults.fast_model),
            reasoning_model: env::var("LLM_REASONING_MODEL").unwrap_or(defaults.reasoning_model),
            tariff_checks_enabled: env::var("TARIFF_CHECKS_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.tariff_checks_enabled),
        }
    }
}

/// `/app/output` inside a container, `./output` in local development.
fn default_output_dir() -> PathBuf {
    if Path::new("/app").exists() {
        PathBuf::from("/app/output")
    } else {
        absolutize(Path::new("./output"))
    }
}

/// Resolve a path to absolute form without requiring it to exist yet.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
