use std::io::IsTerminal;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

// Stdout carries match records only; every log line goes to stderr.

const FRAME_INNER_WIDTH: usize = 72;
const KEY_WIDTH: usize = 16;
const TITLE: &str = "s i e v e  ·  argon2id wordlist recovery";

static COLOR_ENABLED: OnceLock<bool> = OnceLock::new();
static LOG_START: OnceLock<Instant> = OnceLock::new();
static OUTPUT_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

#[derive(Clone, Copy)]
enum Level {
    Info,
    Success,
    Warn,
    Error,
    Cracked,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Success => "OK",
            Self::Warn => "WARN",
            Self::Error => "ERR",
            Self::Cracked => "**",
        }
    }

    fn level_style(self) -> &'static str {
        match self {
            Self::Info => "48;5;31;1;97",
            Self::Success => "48;5;28;1;97",
            Self::Warn => "48;5;214;1;30",
            Self::Error => "48;5;160;1;97",
            Self::Cracked => "48;5;178;1;30",
        }
    }

    fn body_style(self) -> &'static str {
        match self {
            Self::Info => "38;5;153",
            Self::Success => "38;5;120",
            Self::Warn => "38;5;223",
            Self::Error => "38;5;217",
            Self::Cracked => "1;38;5;220",
        }
    }
}

pub(super) fn startup_banner(lines: &[(&str, String)]) {
    let colors = use_color();
    let _out_guard = lock(output_lock());
    eprintln!();
    frame_edge('╭', '╮', colors);
    frame_row(
        &format!("{:^width$}", TITLE, width = FRAME_INNER_WIDTH),
        "1;97",
        colors,
    );
    frame_edge('├', '┤', colors);
    for (key, value) in lines {
        frame_kv(key, value, colors);
    }
    frame_edge('╰', '╯', colors);
    eprintln!();
}

pub(super) fn info(tag: &str, message: impl AsRef<str>) {
    log(Level::Info, tag, message.as_ref());
}

pub(super) fn success(tag: &str, message: impl AsRef<str>) {
    log(Level::Success, tag, message.as_ref());
}

pub(super) fn warn(tag: &str, message: impl AsRef<str>) {
    log(Level::Warn, tag, message.as_ref());
}

pub(super) fn error(tag: &str, message: impl AsRef<str>) {
    log(Level::Error, tag, message.as_ref());
}

pub(super) fn cracked(tag: &str, message: impl AsRef<str>) {
    log(Level::Cracked, tag, message.as_ref());
}

fn log(level: Level, tag: &str, message: &str) {
    let colors = use_color();
    let time_plain = format!("{:>7.1}s", log_elapsed().as_secs_f64());
    let level_plain = format!(" {:^4} ", level.label());
    let tag_plain = format!(" {:<8} ", tag);
    let prefix_width = time_plain.chars().count()
        + level_plain.chars().count()
        + tag_plain.chars().count()
        + 3;
    let prefix = format!(
        "{} {} {}",
        paint(&time_plain, "2;37", colors),
        paint(&level_plain, level.level_style(), colors),
        paint(&tag_plain, "48;5;236;1;250", colors),
    );

    let max_body = if std::io::stderr().is_terminal() {
        terminal_columns().saturating_sub(prefix_width).max(16)
    } else {
        usize::MAX
    };
    let body = style_message(&constrain_line(message, max_body), level.body_style(), colors);

    let _out_guard = lock(output_lock());
    eprintln!("{prefix} {body}");
}

fn frame_edge(left: char, right: char, colors: bool) {
    eprintln!(
        "{}",
        paint(
            &format!("{left}{}{right}", "─".repeat(FRAME_INNER_WIDTH)),
            "1;34",
            colors
        )
    );
}

fn frame_kv(key: &str, value: &str, colors: bool) {
    let key_text = format!("{:<width$}", format!("{key}:"), width = KEY_WIDTH);
    let value_text = clip(value, FRAME_INNER_WIDTH.saturating_sub(2 + KEY_WIDTH + 1));
    let used = 2 + key_text.chars().count() + 1 + value_text.chars().count();
    eprintln!(
        "{}  {} {}{}{}",
        paint("│", "1;34", colors),
        paint(&key_text, "1;96", colors),
        paint(&value_text, "1;97", colors),
        " ".repeat(FRAME_INNER_WIDTH.saturating_sub(used)),
        paint("│", "1;34", colors),
    );
}

fn frame_row(text: &str, style: &str, colors: bool) {
    let row = format!(
        "{:<width$}",
        clip(text, FRAME_INNER_WIDTH),
        width = FRAME_INNER_WIDTH
    );
    eprintln!(
        "{}{}{}",
        paint("│", "1;34", colors),
        paint(&row, style, colors),
        paint("│", "1;34", colors),
    );
}

/// Highlights `key=value` pairs and `|` separators in a log body.
fn style_message(message: &str, base_style: &str, colors: bool) -> String {
    if !colors || message.is_empty() {
        return message.to_string();
    }

    let mut styled = String::with_capacity(message.len() + 32);
    for part in message.split_inclusive(' ') {
        let token = part.trim_end_matches(' ');
        let spacing = &part[token.len()..];
        let painted = match token.split_once('=') {
            _ if token == "|" => paint("│", "2;37", colors),
            Some((key, value)) if !key.is_empty() && !value.is_empty() => format!(
                "{}{}{}",
                paint(key, "1;94", colors),
                paint("=", "2;37", colors),
                paint(value, "1;97", colors),
            ),
            _ if token.is_empty() => String::new(),
            _ => paint(token, base_style, colors),
        };
        styled.push_str(&painted);
        styled.push_str(spacing);
    }
    styled
}

fn clip(text: &str, max_width: usize) -> String {
    text.chars().take(max_width).collect()
}

fn constrain_line(message: &str, max_chars: usize) -> String {
    if max_chars == usize::MAX || message.chars().count() <= max_chars {
        return message.to_string();
    }
    if max_chars <= 3 {
        return ".".repeat(max_chars);
    }
    let mut out = clip(message, max_chars - 3);
    out.push_str("...");
    out
}

fn log_elapsed() -> Duration {
    LOG_START.get_or_init(Instant::now).elapsed()
}

fn use_color() -> bool {
    *COLOR_ENABLED.get_or_init(|| {
        if let Some(force) = std::env::var_os("CLICOLOR_FORCE") {
            if force.to_string_lossy() != "0" {
                return true;
            }
        }
        if std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if std::env::var_os("CLICOLOR").is_some_and(|choice| choice.to_string_lossy() == "0") {
            return false;
        }
        if std::env::var("TERM").is_ok_and(|term| term.eq_ignore_ascii_case("dumb")) {
            return false;
        }
        std::io::stderr().is_terminal()
    })
}

fn terminal_columns() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .ok()
        .or_else(|| {
            std::env::var("COLUMNS")
                .ok()
                .and_then(|raw| raw.parse::<usize>().ok())
        })
        .filter(|cols| *cols >= 60)
        .unwrap_or(120)
}

fn paint(text: &str, style: &str, enabled: bool) -> String {
    if enabled {
        format!("\x1b[{style}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn output_lock() -> &'static Mutex<()> {
    OUTPUT_LOCK.get_or_init(|| Mutex::new(()))
}

fn lock<T>(mutex: &'static Mutex<T>) -> MutexGuard<'static, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
