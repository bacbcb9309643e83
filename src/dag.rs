use std::fmt;
use std::ops::{ControlFlow, Range};
use std::path::Path;
use std::time::Instant;

use ethereum_types::H256;
use tracing::{debug, info};

use crate::config::{Config, Params};
use crate::dataset::make_dataset_with;
use crate::error::{Error, Result};
use crate::io::{self, Prepared};
use crate::seed::SeedHashCompute;
use crate::{hashimoto_full, hashimoto_light, make_cache, Outcome, HASH_BYTES, MIX_BYTES};

/// Verification handle: the cache of one epoch.
pub struct LightDAG {
    pub epoch: u64,
    pub seed: H256,
    pub cache: Vec<u8>,
    pub cache_size: usize,
    pub full_size: usize,
    params: Params,
}

impl LightDAG {
    /// Build the cache for the epoch of `number` with production sizes.
    pub fn new(number: u64) -> Result<Self> {
        Self::with_params(number, Params::default(), &SeedHashCompute::new())
    }

    pub fn with_params(
        number: u64,
        params: Params,
        seeds: &SeedHashCompute,
    ) -> Result<Self> {
        params.validate()?;
        let epoch = params.epoch(number);
        let cache_size = params.cache_size(epoch)?;
        let full_size = params.full_size(epoch)?;
        let seed = seeds.hash_epoch(epoch);

        let now = Instant::now();
        let mut cache = alloc_buffer(cache_size)?;
        make_cache(&mut cache, seed);
        debug!(epoch, cache_size, full_size, elapsed = ?now.elapsed(), "cache generated");

        Ok(Self {
            epoch,
            seed,
            cache,
            cache_size,
            full_size,
            params,
        })
    }

    pub fn compute(&self, header_hash: H256, nonce: u64) -> Outcome {
        if self.cache.len() < HASH_BYTES || self.full_size < MIX_BYTES {
            return Outcome::failure();
        }
        let (mix_hash, result) =
            hashimoto_light(header_hash, nonce, self.full_size, &self.cache);
        Outcome {
            result,
            mix_hash,
            success: true,
        }
    }

    /// Recompute the work for `header_hash` and `nonce`; return the digest
    /// when it was produced with `mix_hash`.
    pub fn verify(&self, header_hash: H256, nonce: u64, mix_hash: H256) -> Option<H256> {
        let out = self.compute(header_hash, nonce);
        (out.success && out.mix_hash == mix_hash).then_some(out.result)
    }

    pub fn is_valid_for(&self, number: u64) -> bool {
        self.params.epoch(number) == self.epoch
    }

    /// Block numbers served by this epoch.
    pub fn block_range(&self) -> Range<u64> {
        let start = self.epoch * self.params.epoch_length;
        start..start.saturating_add(self.params.epoch_length)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

/// Mining handle: the full dataset, next to the cache it was derived from.
pub struct FullDAG<'a> {
    light: &'a LightDAG,
    dataset: Vec<u8>,
}

impl<'a> FullDAG<'a> {
    /// Generate the dataset in memory on every available core.
    pub fn new<F>(light: &'a LightDAG, progress: F) -> Result<Self>
    where
        F: FnMut(u32) -> ControlFlow<()>,
    {
        Self::with_threads(light, num_cpus::get(), progress)
    }

    pub fn with_threads<F>(light: &'a LightDAG, threads: usize, progress: F) -> Result<Self>
    where
        F: FnMut(u32) -> ControlFlow<()>,
    {
        let mut dataset = alloc_buffer(light.full_size)?;
        make_dataset_with(&mut dataset, &light.cache, threads, progress)?;
        Ok(Self { light, dataset })
    }

    /// Reuse the dataset persisted in the configured directory, or generate
    /// and persist it.
    pub fn from_config<F>(light: &'a LightDAG, config: &Config, progress: F) -> Result<Self>
    where
        F: FnMut(u32) -> ControlFlow<()>,
    {
        Self::load_or_generate(light, &config.dataset_dir, config.threads, progress)
    }

    /// Reuse the dataset file for this epoch in `dir` when it is valid;
    /// otherwise recreate it, generate the dataset and write it out.
    ///
    /// The progress callback is only consulted when generating.
    pub fn load_or_generate<F>(
        light: &'a LightDAG,
        dir: &Path,
        threads: usize,
        progress: F,
    ) -> Result<Self>
    where
        F: FnMut(u32) -> ControlFlow<()>,
    {
        let size = light.full_size as u64;
        let mut prepared = io::prepare(dir, light.seed, size, false)?;
        if let Prepared::SizeMismatch = prepared {
            info!(epoch = light.epoch, "dataset file is stale, recreating");
            prepared = io::prepare(dir, light.seed, size, true)?;
        }

        let mut dataset = alloc_buffer(light.full_size)?;
        match prepared {
            Prepared::Match(mut file) => {
                io::read_dataset(&mut file, &mut dataset)?;
            }
            Prepared::Mismatch(mut file) => {
                make_dataset_with(&mut dataset, &light.cache, threads, progress)?;
                io::write_dataset(&mut file, &dataset)?;
                info!(epoch = light.epoch, "dataset written to disk");
            }
            Prepared::SizeMismatch => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "dataset file could not be recreated",
                )));
            }
        }
        Ok(Self { light, dataset })
    }

    pub fn compute(&self, header_hash: H256, nonce: u64) -> Outcome {
        let full_size = self.light.full_size;
        if full_size < MIX_BYTES || self.dataset.len() < full_size {
            return Outcome::failure();
        }
        let (mix_hash, result) =
            hashimoto_full(header_hash, nonce, full_size, &self.dataset);
        Outcome {
            result,
            mix_hash,
            success: true,
        }
    }

    pub fn dag(&self) -> &[u8] {
        &self.dataset
    }

    pub fn dag_size(&self) -> u64 {
        self.dataset.len() as u64
    }

    pub fn light(&self) -> &LightDAG {
        self.light
    }
}

// buffers are large, show their sizes only
impl fmt::Debug for LightDAG {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightDAG")
            .field("epoch", &self.epoch)
            .field("seed", &self.seed)
            .field("cache_size", &self.cache_size)
            .field("full_size", &self.full_size)
            .finish()
    }
}

impl fmt::Debug for FullDAG<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FullDAG")
            .field("light", self.light)
            .field("dag_size", &self.dataset.len())
            .finish()
    }
}

fn alloc_buffer(bytes: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes)
        .map_err(|_| Error::OutOfMemory { bytes })?;
    buf.resize(bytes, 0);
    Ok(buf)
}
