mod backend;
mod config;
mod cracker;
mod hash_spec;
mod source;
mod version;

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use backend::cpu::CpuBackend;
use backend::KdfBackend;
use config::Config;
use cracker::{ConsoleSink, RunOptions, RunSummary};
use source::{FileSource, LineSource, StdinSource};

fn main() {
    if let Err(err) = run() {
        eprintln!("fatal: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cfg = Config::parse()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            if shutdown.swap(true, Ordering::SeqCst) {
                std::process::exit(130);
            }
            cracker::announce_shutdown();
        })?;
    }

    let hashes: Box<dyn LineSource> = if cfg.hash_from_stdin() {
        Box::new(StdinSource)
    } else {
        Box::new(FileSource::new(&cfg.hash_path))
    };
    let wordlist = FileSource::new(&cfg.wordlist_path);
    let kdf = CpuBackend;

    cracker::print_startup(&cfg, hashes.as_ref(), &wordlist, kdf.name());

    let mut sink = ConsoleSink::new(io::stdout());
    let summary = cracker::run(
        &RunOptions::from_config(&cfg),
        hashes.as_ref(),
        &wordlist,
        &kdf,
        &mut sink,
        &shutdown,
    )?;

    if let Some(path) = cfg.summary_output.as_deref() {
        write_summary(path, &summary)?;
    }
    Ok(())
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("failed to serialize run summary")?;
    fs::write(path, json)
        .with_context(|| format!("failed to write run summary to {}", path.display()))
}
