use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};

pub type Lines<'a> = Box<dyn Iterator<Item = Result<String>> + Send + 'a>;

/// A line-oriented input that can be walked from the start again.
///
/// The wordlist is re-opened once per hash spec, so implementations must
/// hand out a fresh cursor on every `open`.
pub trait LineSource: Send + Sync {
    fn describe(&self) -> String;

    fn open(&self) -> Result<Lines<'_>>;
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LineSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&self) -> Result<Lines<'_>> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        Ok(Box::new(LossyLines::new(
            BufReader::new(file),
            self.describe(),
        )))
    }
}

/// Standard input. It can only be walked once, so it is accepted for the
/// hash list but never for the wordlist.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinSource;

impl LineSource for StdinSource {
    fn describe(&self) -> String {
        "<stdin>".to_string()
    }

    fn open(&self) -> Result<Lines<'_>> {
        Ok(Box::new(LossyLines::new(
            BufReader::new(io::stdin()),
            self.describe(),
        )))
    }
}

/// Splits on `\n`, drops a trailing `\r`, and replaces invalid UTF-8
/// instead of failing the run over one bad wordlist entry.
struct LossyLines<R> {
    reader: R,
    origin: String,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> LossyLines<R> {
    fn new(reader: R, origin: String) -> Self {
        Self {
            reader,
            origin,
            buf: Vec::with_capacity(256),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(err) => {
                self.done = true;
                Some(Err(anyhow::Error::new(err)
                    .context(format!("failed reading {}", self.origin))))
            }
        }
    }
}
