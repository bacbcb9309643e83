//! Size parameters and runtime configuration.
//!
//! [`Params`] fixes how big the cache and dataset are for every epoch. The
//! default set is the production one; smaller sets produce the same
//! algorithm over tiny buffers, which is what the tests run against.

use std::path::PathBuf;

use primal::is_prime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{
    CACHE_BYTES_GROWTH, CACHE_BYTES_INIT, DATASET_BYTES_GROWTH,
    DATASET_BYTES_INIT, EPOCH_LENGTH, HASH_BYTES, MIX_BYTES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Number of blocks sharing one seed, cache and dataset.
    pub epoch_length: u64,
    pub cache_bytes_init: u64,
    pub cache_bytes_growth: u64,
    pub dataset_bytes_init: u64,
    pub dataset_bytes_growth: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            epoch_length: EPOCH_LENGTH,
            cache_bytes_init: CACHE_BYTES_INIT,
            cache_bytes_growth: CACHE_BYTES_GROWTH,
            dataset_bytes_init: DATASET_BYTES_INIT,
            dataset_bytes_growth: DATASET_BYTES_GROWTH,
        }
    }
}

impl Params {
    /// Reject parameter sets for which the prime rounding would not
    /// terminate on a usable size.
    pub fn validate(&self) -> Result<()> {
        let hash = HASH_BYTES as u64;
        let mix = MIX_BYTES as u64;
        if self.epoch_length == 0 {
            return Err(Error::InvalidParams("epoch length must be non-zero"));
        }
        if self.cache_bytes_init % hash != 0 || self.cache_bytes_growth % hash != 0 {
            return Err(Error::InvalidParams(
                "cache sizes must be a multiple of the node size",
            ));
        }
        if self.dataset_bytes_init % mix != 0 || self.dataset_bytes_growth % mix != 0 {
            return Err(Error::InvalidParams(
                "dataset sizes must be a multiple of the mix size",
            ));
        }
        if self.cache_bytes_init < 4 * hash {
            return Err(Error::InvalidParams("cache must hold at least four nodes"));
        }
        if self.dataset_bytes_init < 4 * mix {
            return Err(Error::InvalidParams("dataset must hold at least four rows"));
        }
        Ok(())
    }

    pub fn epoch(&self, block_number: u64) -> u64 {
        block_number / self.epoch_length
    }

    /// Cache size in bytes for `epoch`, a prime number of 64-byte nodes.
    pub fn cache_size(&self, epoch: u64) -> Result<usize> {
        let bytes = grown(self.cache_bytes_init, self.cache_bytes_growth, epoch)
            .ok_or(Error::InvalidParams("cache size overflows for this epoch"))?;
        round_to_prime(bytes, HASH_BYTES as u64)
    }

    /// Dataset size in bytes for `epoch`, a prime number of 128-byte rows.
    pub fn full_size(&self, epoch: u64) -> Result<usize> {
        let bytes = grown(self.dataset_bytes_init, self.dataset_bytes_growth, epoch)
            .ok_or(Error::InvalidParams("dataset size overflows for this epoch"))?;
        round_to_prime(bytes, MIX_BYTES as u64)
    }
}

fn grown(init: u64, growth: u64, epoch: u64) -> Option<u64> {
    growth.checked_mul(epoch)?.checked_add(init)
}

fn round_to_prime(bytes: u64, unit: u64) -> Result<usize> {
    let mut sz = bytes - unit;
    while !is_prime(sz / unit) {
        sz -= 2 * unit;
    }
    usize::try_from(sz).map_err(|_| Error::InvalidParams("size exceeds the address space"))
}

/// Engine configuration: size parameters, where datasets are persisted and
/// how many workers generate them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub params: Params,
    pub dataset_dir: PathBuf,
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            params: Params::default(),
            dataset_dir: default_dataset_dir(),
            threads: num_cpus::get(),
        }
    }
}

/// `$HOME/.fafhash`, or `.fafhash` relative to the working directory when no
/// home directory is known.
pub fn default_dataset_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".fafhash"))
        .unwrap_or_else(|| PathBuf::from(".fafhash"))
}
