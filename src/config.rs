use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser};

/// Path that selects standard input for the hash source.
pub const STDIN_PATH: &str = "-";

#[derive(Debug, Parser)]
#[command(
    name = "sieve",
    version = crate::version::release_version(),
    about = "Offline Argon2id wordlist recovery",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// File of `digest:salt:version` lines, or `-` for stdin.
    #[arg(short = 'h', long = "hash", value_name = "PATH")]
    hash: PathBuf,

    /// Wordlist file, re-read once per hash. Must be a regular file.
    #[arg(short = 'w', long = "wordlist", value_name = "PATH")]
    wordlist: PathBuf,

    /// Worker threads. 1 runs every attempt on the main thread.
    #[arg(short = 't', long, default_value_t = 1)]
    threads: usize,

    /// Ceiling on Argon2 memory held by concurrent attempts (defaults to available RAM).
    #[arg(long, value_name = "MiB")]
    memory_limit_mib: Option<u64>,

    /// Report pooled results as they finish instead of in input order.
    #[arg(long, action = ArgAction::SetTrue)]
    unordered: bool,

    /// Interval for periodic stats printing.
    #[arg(long, default_value_t = 10)]
    stats_secs: u64,

    /// Disable periodic stats lines.
    #[arg(long, action = ArgAction::SetTrue)]
    no_stats: bool,

    /// Write the run summary JSON to this file.
    #[arg(long, value_name = "PATH")]
    summary_output: Option<PathBuf>,

    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Print version.
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,
}

/// Where the memory ceiling came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryCeiling {
    Flag(u64),
    Detected(u64),
    Unlimited,
}

impl MemoryCeiling {
    pub fn kib(self) -> Option<u64> {
        match self {
            Self::Flag(kib) | Self::Detected(kib) => Some(kib),
            Self::Unlimited => None,
        }
    }

    pub fn describe(self) -> String {
        match self {
            Self::Flag(kib) => human_bytes(kib.saturating_mul(1024)),
            Self::Detected(kib) => format!("{} (detected)", human_bytes(kib.saturating_mul(1024))),
            Self::Unlimited => "unlimited".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub hash_path: PathBuf,
    pub wordlist_path: PathBuf,
    pub threads: usize,
    pub memory_ceiling: MemoryCeiling,
    pub ordered: bool,
    pub stats_interval: Option<Duration>,
    pub summary_output: Option<PathBuf>,
}

impl Config {
    pub fn parse() -> Result<Self> {
        Self::from_cli(Cli::parse(), detect_memory_budget_bytes)
    }

    fn from_cli(cli: Cli, detect: impl FnOnce() -> Option<MemoryBudgetBytes>) -> Result<Self> {
        if cli.threads == 0 {
            bail!("threads must be >= 1");
        }
        if cli.memory_limit_mib == Some(0) {
            bail!("memory-limit-mib must be >= 1");
        }
        if is_stdin(&cli.wordlist) {
            bail!("the wordlist is read once per hash and cannot come from stdin");
        }
        require_file(&cli.hash, "hash file")?;
        require_file(&cli.wordlist, "wordlist")?;

        let memory_ceiling = match cli.memory_limit_mib {
            Some(mib) => MemoryCeiling::Flag(mib.saturating_mul(1024)),
            None => match detect() {
                Some(budget) => MemoryCeiling::Detected((budget.effective_available / 1024).max(1)),
                None => MemoryCeiling::Unlimited,
            },
        };

        Ok(Self {
            hash_path: cli.hash,
            wordlist_path: cli.wordlist,
            threads: cli.threads,
            memory_ceiling,
            ordered: !cli.unordered,
            stats_interval: (!cli.no_stats).then(|| Duration::from_secs(cli.stats_secs.max(1))),
            summary_output: cli.summary_output,
        })
    }

    pub fn hash_from_stdin(&self) -> bool {
        is_stdin(&self.hash_path)
    }
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == STDIN_PATH
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if is_stdin(path) {
        return Ok(());
    }
    if !path.exists() {
        bail!("{what} not found: {}", path.display());
    }
    if path.is_dir() {
        bail!("{what} is a directory: {}", path.display());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct MemoryBudgetBytes {
    effective_available: u64,
}

fn detect_memory_budget_bytes() -> Option<MemoryBudgetBytes> {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();

    let total = sys.total_memory();
    if total == 0 {
        return None;
    }

    let mut effective_total = total;
    let mut effective_available = sys.available_memory();
    if effective_available == 0 {
        effective_available = total;
    }

    if let Some(cgroup) = sys.cgroup_limits() {
        if cgroup.total_memory > 0 {
            effective_total = effective_total.min(cgroup.total_memory);
        }
        if cgroup.free_memory > 0 {
            effective_available = effective_available.min(cgroup.free_memory);
        }
    }

    Some(MemoryBudgetBytes {
        effective_available: effective_available.min(effective_total),
    })
}

pub fn human_bytes(bytes: u64) -> String {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;

    if bytes >= 1024 * 1024 * 1024 {
        return format!("{:.2} GiB", (bytes as f64) / GIB);
    }
    if bytes >= 1024 * 1024 {
        return format!("{:.2} MiB", (bytes as f64) / MIB);
    }
    format!("{:.2} KiB", (bytes as f64) / 1024.0)
}
