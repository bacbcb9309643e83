//! Apache-2 licensed Fafhash implementation.
//!
//! Fafhash binds a header hash and a nonce to a digest through a large
//! pseudorandom dataset derived, epoch by epoch, from a compact cache. A
//! verifier only needs the cache ([`LightDAG`]); a miner keeps the whole
//! dataset around ([`FullDAG`]), optionally persisted on disk through the
//! [`io`] module so it survives restarts.

mod config;
mod dag;
mod dataset;
mod error;
pub mod io;
mod seed;

use byteorder::{ByteOrder, LittleEndian};
use ethereum_types::{H256, H512};
use sha3::{Digest, Keccak256, Keccak512};

pub use config::{default_dataset_dir, Config, Params};
pub use dag::{FullDAG, LightDAG};
pub use dataset::make_dataset_with;
pub use error::{Error, Result};
pub use seed::{epoch_from_seedhash, SeedHashCompute};

/// Format revision, part of every persisted dataset's file name.
pub const REVISION: u32 = 23;
pub const EPOCH_LENGTH: u64 = 30000;
pub const DATASET_BYTES_INIT: u64 = 1 << 30;
pub const DATASET_BYTES_GROWTH: u64 = 1 << 23;
pub const CACHE_BYTES_INIT: u64 = 1 << 24;
pub const CACHE_BYTES_GROWTH: u64 = 1 << 17;
pub const MIX_BYTES: usize = 128;
pub const WORD_BYTES: usize = 4;
pub const HASH_BYTES: usize = 64;
pub const DATASET_PARENTS: usize = 256;
pub const CACHE_ROUNDS: usize = 3;
pub const ACCESSES: usize = 64;

const NODE_WORDS: usize = HASH_BYTES / WORD_BYTES;
const MIX_WORDS: usize = MIX_BYTES / WORD_BYTES;
const MIX_NODES: usize = MIX_BYTES / HASH_BYTES;

/// Result of a hash computation.
///
/// `result` and `mix_hash` are only meaningful when `success` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub result: H256,
    pub mix_hash: H256,
    pub success: bool,
}

impl Outcome {
    pub(crate) fn failure() -> Self {
        Self {
            result: H256::zero(),
            mix_hash: H256::zero(),
            success: false,
        }
    }
}

pub fn keccak_512(data: &[u8]) -> [u8; 64] {
    let mut output = [0u8; 64];
    output.copy_from_slice(&Keccak512::digest(data));
    output
}

pub fn keccak_256(data: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    output.copy_from_slice(&Keccak256::digest(data));
    output
}

pub fn epoch(block_number: u64) -> u64 {
    block_number / EPOCH_LENGTH
}

/// Get the cache size required given the epoch.
pub fn get_cache_size(epoch: u64) -> Result<usize> {
    Params::default().cache_size(epoch)
}

/// Get the full dataset size given the epoch.
pub fn get_full_size(epoch: u64) -> Result<usize> {
    Params::default().full_size(epoch)
}

/// Get the seedhash for a given epoch.
pub fn get_seedhash(epoch: u64) -> H256 {
    seed::resume_seedhash(H256::zero(), 0, epoch)
}

/// Get the seedhash for the epoch containing `block_number`.
pub fn seedhash_for_block(block_number: u64) -> H256 {
    get_seedhash(epoch(block_number))
}

const FNV_PRIME: u32 = 0x0100_0193;

#[inline]
pub fn fnv(v1: u32, v2: u32) -> u32 {
    v1.wrapping_mul(FNV_PRIME) ^ v2
}

/// Word-wise fnv of `data` into `mix`.
#[inline]
pub fn fnv_mix_hash(mix: &mut [u32], data: &[u32]) {
    for (m, d) in mix.iter_mut().zip(data) {
        *m = fnv(*m, *d);
    }
}

/// Make a Fafhash cache using the given seed.
///
/// The rounds read nodes that were rewritten earlier in the same pass, so
/// this cannot be split across threads without changing its output.
pub fn make_cache(cache: &mut [u8], seed: H256) {
    assert!(cache.len() % HASH_BYTES == 0);
    let n = cache.len() / HASH_BYTES;

    cache[..HASH_BYTES].copy_from_slice(&keccak_512(seed.as_bytes()));
    for i in 1..n {
        let (last, next) = cache.split_at_mut(i * HASH_BYTES);
        next[..HASH_BYTES].copy_from_slice(&keccak_512(&last[last.len() - HASH_BYTES..]));
    }

    for _ in 0..CACHE_ROUNDS {
        for i in 0..n {
            let v = LittleEndian::read_u32(&cache[i * HASH_BYTES..]) as usize % n;
            let prev = (n + i - 1) % n;

            let mut r = [0u8; HASH_BYTES];
            for (j, b) in r.iter_mut().enumerate() {
                *b = cache[prev * HASH_BYTES + j] ^ cache[v * HASH_BYTES + j];
            }
            cache[i * HASH_BYTES..(i + 1) * HASH_BYTES].copy_from_slice(&keccak_512(&r));
        }
    }
}

fn read_node(bytes: &[u8]) -> [u32; NODE_WORDS] {
    let mut words = [0u32; NODE_WORDS];
    LittleEndian::read_u32_into(&bytes[..HASH_BYTES], &mut words);
    words
}

fn write_words(words: &[u32], out: &mut [u8]) {
    LittleEndian::write_u32_into(words, &mut out[..words.len() * WORD_BYTES]);
}

fn keccak_512_words(words: &[u32; NODE_WORDS]) -> [u32; NODE_WORDS] {
    let mut bytes = [0u8; HASH_BYTES];
    write_words(words, &mut bytes);
    read_node(&keccak_512(&bytes))
}

/// Compute dataset item `i` from the cache alone.
///
/// Panics on a cache shorter than one node.
pub fn calc_dataset_item(cache: &[u8], i: usize) -> H512 {
    let n = cache.len() / HASH_BYTES;

    let mut mix = read_node(&cache[(i % n) * HASH_BYTES..]);
    mix[0] ^= i as u32;
    let mut mix = keccak_512_words(&mix);

    for j in 0..DATASET_PARENTS {
        let cache_index = fnv((i ^ j) as u32, mix[j % NODE_WORDS]) as usize % n;
        let parent = read_node(&cache[cache_index * HASH_BYTES..]);
        fnv_mix_hash(&mut mix, &parent);
    }

    let mut out = [0u8; HASH_BYTES];
    write_words(&keccak_512_words(&mix), &mut out);
    H512::from(out)
}

/// Make a Fafhash dataset using the given cache on a single thread.
pub fn make_dataset(dataset: &mut [u8], cache: &[u8]) {
    for (i, item) in dataset.chunks_exact_mut(HASH_BYTES).enumerate() {
        item.copy_from_slice(calc_dataset_item(cache, i).as_bytes());
    }
}

/// "Main" function of Fafhash, calculating the mix digest and result given
/// the header hash and nonce. Returns `(mix_hash, result)`.
///
/// Panics when `full_size` is below [`MIX_BYTES`]; the handles check this and
/// report a failed [`Outcome`] instead.
pub fn hashimoto<F: Fn(usize) -> H512>(
    header_hash: H256,
    nonce: u64,
    full_size: usize,
    lookup: F,
) -> (H256, H256) {
    let rows = (full_size / MIX_BYTES) as u32;

    let mut seed = [0u8; 40]; // 32 + 8
    seed[..32].copy_from_slice(header_hash.as_bytes());
    LittleEndian::write_u64(&mut seed[32..], nonce);
    let s = keccak_512(&seed);
    let s_head = LittleEndian::read_u32(&s);

    let mut mix = [0u32; MIX_WORDS];
    for (i, w) in mix.iter_mut().enumerate() {
        *w = LittleEndian::read_u32(&s[(i % NODE_WORDS) * WORD_BYTES..]);
    }

    let mut temp = [0u32; MIX_WORDS];
    for i in 0..ACCESSES {
        let p = fnv(i as u32 ^ s_head, mix[i % MIX_WORDS]) % rows;
        for k in 0..MIX_NODES {
            let item = lookup(MIX_NODES * p as usize + k);
            LittleEndian::read_u32_into(
                item.as_bytes(),
                &mut temp[k * NODE_WORDS..(k + 1) * NODE_WORDS],
            );
        }
        fnv_mix_hash(&mut mix, &temp);
    }

    let mut cmix = [0u32; MIX_WORDS / 4];
    for (i, c) in cmix.iter_mut().enumerate() {
        let w = &mix[i * 4..i * 4 + 4];
        *c = fnv(fnv(fnv(w[0], w[1]), w[2]), w[3]);
    }

    let mut mix_hash = [0u8; 32];
    write_words(&cmix, &mut mix_hash);

    let mut buf = [0u8; HASH_BYTES + 32];
    buf[..HASH_BYTES].copy_from_slice(&s);
    buf[HASH_BYTES..].copy_from_slice(&mix_hash);
    let result = keccak_256(&buf);

    (H256::from(mix_hash), H256::from(result))
}

/// Fafhash used by a light client. Only stores the cache rather than the
/// full dataset.
pub fn hashimoto_light(
    header_hash: H256,
    nonce: u64,
    full_size: usize,
    cache: &[u8],
) -> (H256, H256) {
    hashimoto(header_hash, nonce, full_size, |i| calc_dataset_item(cache, i))
}

/// Fafhash used by a full client. Stores the whole dataset in memory.
pub fn hashimoto_full(
    header_hash: H256,
    nonce: u64,
    full_size: usize,
    dataset: &[u8],
) -> (H256, H256) {
    hashimoto(header_hash, nonce, full_size, |i| {
        H512::from_slice(&dataset[i * HASH_BYTES..(i + 1) * HASH_BYTES])
    })
}
