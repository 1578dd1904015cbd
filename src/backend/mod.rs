use anyhow::Result;

use crate::hash_spec::KdfParams;

pub mod cpu;

/// A memory-hard key derivation. Implementations are shared by reference
/// across worker threads, so `derive` takes `&self` and holds no scratch state.
pub trait KdfBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Derives raw output bytes for one password. Every parameter problem,
    /// including a short salt, is reported here as an error.
    fn derive(&self, password: &[u8], salt: &[u8], params: &KdfParams) -> Result<Vec<u8>>;
}
