//! CLI surface and resolved configuration (C0, SPEC_FULL.md §4.12).
//!
//! Flags are parsed with `clap`'s derive API, matching `src/bin/create_user.rs`.
//! Every flag has a same-named environment variable override; an explicit flag
//! still wins over its environment variable, which in turn wins over the
//! built-in default. `Config::resolve` is the single place that enforces this
//! precedence and produces [`ValidationError`] instead of panicking.

use std::env;

use clap::Parser;
use thiserror::Error;

/// How a subprocess failure in the LOC collector (C5) is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocFailureMode {
    Fatal,
    Warn,
}

#[derive(Parser, Debug)]
#[command(name = "git-ingest", about = "Git repository ingestion engine")]
pub struct Args {
    /// Remote repository URL to ingest.
    #[arg(long)]
    pub git_url: Option<String>,

    /// Directory bare clones are kept under.
    #[arg(long)]
    pub git_repos_path: Option<String>,

    /// Directory the cache, progress, and published-event files are kept under.
    #[arg(long)]
    pub git_cache_path: Option<String>,

    /// Skip cleanup of the cache directory between runs.
    #[arg(long)]
    pub git_skip_cache_cleanup: bool,

    /// Opaque stream identifier forwarded to the publisher.
    #[arg(long)]
    pub git_stream: Option<String>,

    /// Pre-resolved source id, bypassing the `SourceIdResolver`.
    #[arg(long)]
    pub git_source_id: Option<String>,

    /// Repository source kind (`github`, `gerrit`, ...).
    #[arg(long)]
    pub git_repository_source: Option<String>,

    /// Treat LOC-collector subprocess failure as fatal instead of a warning.
    #[arg(long)]
    pub loc_tool_fatal: bool,

    /// Bound on concurrent enrichment workers. Defaults to the host's CPU count.
    #[arg(long)]
    pub thread_count: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required configuration: --git-url (or GIT_URL)")]
    MissingGitUrl,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub git_url: String,
    pub git_repos_path: String,
    pub git_cache_path: String,
    pub git_skip_cache_cleanup: bool,
    pub git_stream: Option<String>,
    pub git_source_id: Option<String>,
    pub git_repository_source: Option<String>,
    pub loc_tool_failure_mode: LocFailureMode,
    pub thread_count: usize,
}

fn env_or(flag: Option<String>, var: &str) -> Option<String> {
    flag.or_else(|| env::var(var).ok())
}

fn env_flag(flag: bool, var: &str) -> bool {
    flag || env::var(var).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

impl Config {
    pub fn resolve(args: Args) -> Result<Self, ValidationError> {
        let git_url =
            env_or(args.git_url, "GIT_URL").ok_or(ValidationError::MissingGitUrl)?;

        let git_repos_path = env_or(args.git_repos_path, "GIT_REPOS_PATH")
            .unwrap_or_else(|| "/tmp/git-repositories".to_string());

        let git_cache_path = env_or(args.git_cache_path, "GIT_CACHE_PATH")
            .unwrap_or_else(|| "/tmp/git-cache".to_string());

        let git_skip_cache_cleanup =
            env_flag(args.git_skip_cache_cleanup, "GIT_SKIP_CACHE_CLEANUP");

        let git_stream = env_or(args.git_stream, "GIT_STREAM");
        let git_source_id = env_or(args.git_source_id, "GIT_SOURCE_ID");
        let git_repository_source = env_or(args.git_repository_source, "GIT_REPOSITORY_SOURCE");

        let loc_tool_failure_mode = if env_flag(args.loc_tool_fatal, "LOC_TOOL_FATAL") {
            LocFailureMode::Fatal
        } else {
            LocFailureMode::Warn
        };

        let thread_count = args
            .thread_count
            .or_else(|| env::var("THREAD_COUNT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or_else(num_cpus::get);

        Ok(Config {
            git_url,
            git_repos_path,
            git_cache_path,
            git_skip_cache_cleanup,
            git_stream,
            git_source_id,
            git_repository_source,
            loc_tool_failure_mode,
            thread_count: thread_count.max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(url: Option<&str>) -> Args {
        Args {
            git_url: url.map(str::to_string),
            git_repos_path: None,
            git_cache_path: None,
            git_skip_cache_cleanup: false,
            git_stream: None,
            git_source_id: None,
            git_repository_source: None,
            loc_tool_fatal: false,
            thread_count: None,
        }
    }

    #[test]
    fn missing_url_is_a_validation_error() {
        let result = Config::resolve(args(None));
        assert!(matches!(result, Err(ValidationError::MissingGitUrl)));
    }

    #[test]
    fn defaults_are_applied() {
        let config = Config::resolve(args(Some("https://example.com/repo.git"))).unwrap();
        assert_eq!(config.git_repos_path, "/tmp/git-repositories");
        assert_eq!(config.git_cache_path, "/tmp/git-cache");
        assert_eq!(config.loc_tool_failure_mode, LocFailureMode::Warn);
        assert!(config.thread_count >= 1);
    }

    #[test]
    fn flag_wins_over_default() {
        let mut a = args(Some("https://example.com/repo.git"));
        a.git_repos_path = Some("/srv/repos".to_string());
        let config = Config::resolve(a).unwrap();
        assert_eq!(config.git_repos_path, "/srv/repos");
    }
}
