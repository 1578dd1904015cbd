use anyhow::{anyhow, bail, Result};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::backend::KdfBackend;
use crate::hash_spec::{KdfParams, SALT_LEN};

/// Captured hashes are always single-lane.
const PARALLELISM: u32 = 1;

/// Argon2id v0x13 computed on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl KdfBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn derive(&self, password: &[u8], salt: &[u8], params: &KdfParams) -> Result<Vec<u8>> {
        let output_len = required_u32(params.output_len, "output length")?;
        let time_cost = required_u32(params.time_cost, "time cost")?;
        let memory_kib = required_u32(params.memory_cost_kib, "memory cost")?;

        if salt.len() < SALT_LEN {
            bail!("salt is {} bytes, need {SALT_LEN}", salt.len());
        }

        let output_len = usize::try_from(output_len)
            .map_err(|_| anyhow!("output length {output_len} does not fit in memory"))?;
        let argon_params = Params::new(memory_kib, time_cost, PARALLELISM, Some(output_len))
            .map_err(|err| {
                anyhow!("argon2 rejected m={memory_kib} t={time_cost} len={output_len}: {err}")
            })?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let mut output = vec![0u8; output_len];
        argon2
            .hash_password_into(password, salt, &mut output)
            .map_err(|err| anyhow!("hash_password_into failed: {err}"))?;
        Ok(output)
    }
}

fn required_u32(value: Option<i64>, field: &str) -> Result<u32> {
    let Some(value) = value else {
        bail!("{field} is not a number");
    };
    u32::try_from(value).map_err(|_| anyhow!("{field} {value} is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: &[u8] = b"0123456789abcdef";

    fn tiny_params() -> KdfParams {
        KdfParams {
            output_len: Some(32),
            time_cost: Some(1),
            memory_cost_kib: Some(8),
        }
    }

    #[test]
    fn derivation_is_deterministic_and_sized() {
        let backend = CpuBackend;
        let first = backend
            .derive(b"correctpass", SALT, &tiny_params())
            .expect("tiny params should derive");
        let second = backend
            .derive(b"correctpass", SALT, &tiny_params())
            .expect("tiny params should derive");
        assert_eq!(first.len(), 32);
        assert_eq!(first, second);

        let other = backend
            .derive(b"wrongpass", SALT, &tiny_params())
            .expect("tiny params should derive");
        assert_ne!(first, other);
    }

    #[test]
    fn output_length_follows_params() {
        let mut params = tiny_params();
        params.output_len = Some(16);
        let out = CpuBackend
            .derive(b"pw", SALT, &params)
            .expect("16-byte output should derive");
        assert_eq!(out.len(), 16);
    }

    #[test]
    fn missing_numbers_fail_at_derivation() {
        let mut params = tiny_params();
        params.time_cost = None;
        let err = CpuBackend
            .derive(b"pw", SALT, &params)
            .expect_err("non-numeric time cost should fail");
        assert!(format!("{err:#}").contains("time cost is not a number"));
    }

    #[test]
    fn negative_values_are_out_of_range() {
        let mut params = tiny_params();
        params.memory_cost_kib = Some(-1);
        let err = CpuBackend
            .derive(b"pw", SALT, &params)
            .expect_err("negative memory should fail");
        assert!(format!("{err:#}").contains("memory cost -1 is out of range"));
    }

    #[test]
    fn short_salt_fails() {
        let err = CpuBackend
            .derive(b"pw", b"short", &tiny_params())
            .expect_err("short salt should fail");
        assert!(format!("{err:#}").contains("salt is 5 bytes"));
    }

    #[test]
    fn argon2_limits_surface_as_errors() {
        let mut params = tiny_params();
        params.memory_cost_kib = Some(1);
        assert!(CpuBackend.derive(b"pw", SALT, &params).is_err());

        let mut params = tiny_params();
        params.time_cost = Some(0);
        assert!(CpuBackend.derive(b"pw", SALT, &params).is_err());

        let mut params = tiny_params();
        params.output_len = Some(2);
        assert!(CpuBackend.derive(b"pw", SALT, &params).is_err());
    }
}
