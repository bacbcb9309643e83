use std::ops::ControlFlow;
use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::{calc_dataset_item, HASH_BYTES};

/// Make a Fafhash dataset on `threads` workers, reporting progress.
///
/// The dataset is filled one percent at a time. `progress` runs on the
/// calling thread before every slice with the share already done, and once
/// more with 100 after the last one; returning [`ControlFlow::Break`] stops
/// generation and yields [`Error::Cancelled`]. The partially written buffer
/// must then be discarded.
pub fn make_dataset_with<F>(
    dataset: &mut [u8],
    cache: &[u8],
    threads: usize,
    mut progress: F,
) -> Result<()>
where
    F: FnMut(u32) -> ControlFlow<()>,
{
    let items = dataset.len() / HASH_BYTES;
    let step = (items / 100).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("fafhash-dag-{}", i))
        .build()?;

    let now = Instant::now();
    debug!(items, threads, "generating dataset");

    for (k, slice) in dataset.chunks_mut(step * HASH_BYTES).enumerate() {
        let first = k * step;
        if progress((first * 100 / items) as u32).is_break() {
            debug!(done = first, items, "dataset generation cancelled");
            return Err(Error::Cancelled);
        }
        pool.install(|| {
            slice
                .par_chunks_exact_mut(HASH_BYTES)
                .enumerate()
                .for_each(|(j, item)| {
                    item.copy_from_slice(calc_dataset_item(cache, first + j).as_bytes());
                });
        });
    }
    if progress(100).is_break() {
        return Err(Error::Cancelled);
    }

    debug!(items, elapsed = ?now.elapsed(), "dataset generated");
    Ok(())
}
