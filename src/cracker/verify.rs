use anyhow::Result;

use crate::backend::KdfBackend;
use crate::hash_spec::{trim_line, HashSpec};

/// Result of running one candidate against one hash spec.
#[derive(Debug)]
pub enum Attempt {
    Matched,
    Missed,
    Failed(anyhow::Error),
    /// Dropped by a shutdown before the KDF ran.
    Cancelled,
}

impl Attempt {
    #[cfg(test)]
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched)
    }
}

/// One scanned candidate, already trimmed.
#[derive(Debug)]
pub struct Verdict {
    pub candidate: String,
    pub attempt: Attempt,
}

/// Derives the digest for `password` and compares it with the spec's
/// target. `password` must already be trimmed.
pub fn verify_candidate<K>(kdf: &K, spec: &HashSpec, password: &str) -> Attempt
where
    K: KdfBackend + ?Sized,
{
    match kdf.derive(password.as_bytes(), spec.salt(), spec.params()) {
        Ok(output) if hex::encode(&output) == spec.digest_hex() => Attempt::Matched,
        Ok(_) => Attempt::Missed,
        Err(err) => Attempt::Failed(err),
    }
}

/// Lazily verifies every candidate against one spec. A KDF failure only
/// marks its own candidate; read errors from the source end the scan.
pub struct Verification<'a, K: ?Sized, I> {
    kdf: &'a K,
    spec: &'a HashSpec,
    candidates: I,
}

pub fn verify<'a, K, I>(
    kdf: &'a K,
    spec: &'a HashSpec,
    candidates: I,
) -> Verification<'a, K, I::IntoIter>
where
    K: KdfBackend + ?Sized,
    I: IntoIterator<Item = Result<String>>,
{
    Verification {
        kdf,
        spec,
        candidates: candidates.into_iter(),
    }
}

impl<K, I> Iterator for Verification<'_, K, I>
where
    K: KdfBackend + ?Sized,
    I: Iterator<Item = Result<String>>,
{
    type Item = Result<Verdict>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.candidates.next()? {
            Ok(line) => line,
            Err(err) => return Some(Err(err)),
        };
        let candidate = trim_line(&line).to_string();
        let attempt = verify_candidate(self.kdf, self.spec, &candidate);
        Some(Ok(Verdict { candidate, attempt }))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::EchoKdf;
    use super::*;
    use crate::backend::cpu::CpuBackend;
    use crate::hash_spec::decode;
    use anyhow::anyhow;

    const SALT: &str = "0123456789abcdef";

    fn echo_spec(password: &str) -> HashSpec {
        decode(&format!(
            "{}:{SALT}0123:2",
            EchoKdf::digest_hex(password, SALT)
        ))
        .expect("spec should decode")
    }

    fn lines(words: &[&str]) -> Vec<Result<String>> {
        words.iter().map(|word| Ok(word.to_string())).collect()
    }

    #[test]
    fn reports_every_match_without_stopping() {
        let spec = echo_spec("correctpass");
        let verdicts = verify(
            &EchoKdf,
            &spec,
            lines(&["wrongpass", "correctpass", "other", "correctpass"]),
        )
        .collect::<Result<Vec<_>>>()
        .expect("scan should finish");

        let matched = verdicts
            .iter()
            .map(|verdict| verdict.attempt.is_match())
            .collect::<Vec<_>>();
        assert_eq!(matched, vec![false, true, false, true]);
    }

    #[test]
    fn candidates_are_trimmed_before_derivation() {
        let spec = echo_spec("two words");
        let verdicts = verify(&EchoKdf, &spec, lines(&["  two words \r", "two  words"]))
            .collect::<Result<Vec<_>>>()
            .expect("scan should finish");
        assert_eq!(verdicts[0].candidate, "two words");
        assert!(verdicts[0].attempt.is_match());
        assert!(!verdicts[1].attempt.is_match());
    }

    #[test]
    fn digest_comparison_is_case_sensitive() {
        let lower = EchoKdf::digest_hex("zz", SALT);
        let upper = lower.to_ascii_uppercase();
        assert_ne!(lower, upper);
        let spec = decode(&format!("{upper}:{SALT}:2")).expect("spec should decode");
        let attempt = verify_candidate(&EchoKdf, &spec, "zz");
        assert!(matches!(attempt, Attempt::Missed));
    }

    #[test]
    fn kdf_failure_marks_only_that_candidate() {
        let spec = decode(&format!("{}:short:2", EchoKdf::digest_hex("pw", "short")))
            .expect("short salt decodes");
        let verdicts = verify(&EchoKdf, &spec, lines(&["a", "b"]))
            .collect::<Result<Vec<_>>>()
            .expect("failures do not end the scan");
        assert_eq!(verdicts.len(), 2);
        assert!(verdicts
            .iter()
            .all(|verdict| matches!(verdict.attempt, Attempt::Failed(_))));
    }

    #[test]
    fn read_errors_propagate() {
        let spec = echo_spec("pw");
        let mut scan = verify(
            &EchoKdf,
            &spec,
            vec![Ok("pw".to_string()), Err(anyhow!("disk went away"))],
        );
        assert!(scan
            .next()
            .expect("first verdict")
            .expect("first line reads")
            .attempt
            .is_match());
        let err = scan
            .next()
            .expect("second item")
            .expect_err("read error should surface");
        assert!(err.to_string().contains("disk went away"));
    }

    #[test]
    fn argon2_round_trip_matches_only_correct_password() {
        let salt_field = "0123456789abcdef0123";
        let params = *decode(&format!("00:{salt_field}:2_32_1_8192"))
            .expect("spec should decode")
            .params();
        let target = CpuBackend
            .derive(b"correctpass", b"0123456789abcdef", &params)
            .expect("tiny params should derive");
        let spec = decode(&format!("{}:{salt_field}:2_32_1_8192", hex::encode(target)))
            .expect("spec should decode");

        assert!(matches!(
            verify_candidate(&CpuBackend, &spec, "correctpass"),
            Attempt::Matched
        ));
        assert!(matches!(
            verify_candidate(&CpuBackend, &spec, "wrongpass"),
            Attempt::Missed
        ));
    }
}
