use std::fmt;

/// Salt bytes taken from the front of the salt field.
pub const SALT_LEN: usize = 16;

/// Parameters implied by the `2`/`3` version shorthand.
const SHORTHAND_PARAMS: &str = "_32_2_67108864";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InvalidHashFormat,
    InvalidVersionFormat,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHashFormat => f.write_str("invalid hash format"),
            Self::InvalidVersionFormat => f.write_str("invalid version format"),
        }
    }
}

/// Argon2 parameters as written in the hash line. `None` marks a field that
/// did not read as a number; the KDF refuses those at derivation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KdfParams {
    pub output_len: Option<i64>,
    pub time_cost: Option<i64>,
    pub memory_cost_kib: Option<i64>,
}

impl KdfParams {
    /// KiB one derivation will hold while it runs. Unusable values count as
    /// zero since the KDF rejects them before allocating.
    pub fn admission_kib(&self) -> u64 {
        self.memory_cost_kib
            .and_then(|kib| u64::try_from(kib).ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashSpec {
    line: String,
    digest_hex: String,
    algorithm_tag: String,
    salt: Vec<u8>,
    params: KdfParams,
}

impl HashSpec {
    /// Trimmed line with any version shorthand expanded.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn digest_hex(&self) -> &str {
        &self.digest_hex
    }

    pub fn algorithm_tag(&self) -> &str {
        &self.algorithm_tag
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Short form of the digest for log lines.
    pub fn short_digest(&self) -> String {
        const SHOWN: usize = 12;
        if self.digest_hex.chars().count() <= SHOWN {
            return self.digest_hex.clone();
        }
        let head = self.digest_hex.chars().take(SHOWN).collect::<String>();
        format!("{head}...")
    }
}

impl fmt::Display for HashSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// Decodes one `digest:salt:version` line.
///
/// Only field arity is checked here. Numeric fields are read leniently and a
/// short salt is kept as-is, so parameter problems show up as KDF failures
/// for each attempt instead of rejecting the line.
pub fn decode(line: &str) -> Result<HashSpec, RejectReason> {
    let trimmed = trim_line(line);
    let fields = trimmed.split(':').collect::<Vec<_>>();
    let [digest_hex, salt_field, version_field] = fields.as_slice() else {
        return Err(RejectReason::InvalidHashFormat);
    };

    let version = expand_version(version_field);
    let normalized = format!("{digest_hex}:{salt_field}:{version}");
    let salt = salt_prefix(salt_field).into_bytes();

    let parts = version.split('_').collect::<Vec<_>>();
    let [algorithm_tag, output_len, time_cost, raw_memory] = parts.as_slice() else {
        return Err(RejectReason::InvalidVersionFormat);
    };

    let params = KdfParams {
        output_len: parse_lenient_int(output_len),
        time_cost: parse_lenient_int(time_cost),
        memory_cost_kib: parse_lenient_int(raw_memory).map(|bytes| bytes.div_euclid(1024)),
    };

    Ok(HashSpec {
        digest_hex: (*digest_hex).to_string(),
        algorithm_tag: (*algorithm_tag).to_string(),
        salt,
        params,
        line: normalized,
    })
}

/// First `SALT_LEN` UTF-16 code units of the salt field, as the tools that
/// write these lines count them. A surrogate pair cut in half at the end
/// becomes U+FFFD.
fn salt_prefix(salt_field: &str) -> String {
    let mut units = 0;
    let mut prefix = String::with_capacity(SALT_LEN);
    for ch in salt_field.chars() {
        if units == SALT_LEN {
            break;
        }
        let width = ch.len_utf16();
        if units + width > SALT_LEN {
            prefix.push(char::REPLACEMENT_CHARACTER);
            break;
        }
        prefix.push(ch);
        units += width;
    }
    prefix
}

/// Strips surrounding whitespace and a stray byte-order mark.
pub fn trim_line(line: &str) -> &str {
    line.trim_matches(|ch: char| ch.is_whitespace() || ch == '\u{feff}')
}

fn expand_version(version: &str) -> String {
    match version {
        "2" | "3" => format!("{version}{SHORTHAND_PARAMS}"),
        other => other.to_string(),
    }
}

/// Reads a leading base-10 integer, ignoring whatever follows the digits.
/// Returns `None` when no digit leads the field or the value overflows.
fn parse_lenient_int(field: &str) -> Option<i64> {
    let rest = field.trim_start();
    let (negative, digits) = match rest.as_bytes().first() {
        Some(b'-') => (true, &rest[1..]),
        Some(b'+') => (false, &rest[1..]),
        _ => (false, rest),
    };
    let end = digits
        .bytes()
        .position(|byte| !byte.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].parse::<i64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
