use ethereum_types::H256;
use parking_lot::Mutex;

use crate::keccak_256;

/// Memo of the most recently computed seed hash.
///
/// Epochs only move forward in normal operation, so each request resumes the
/// keccak chain from the last epoch instead of starting over from zero.
#[derive(Debug, Default)]
pub struct SeedHashCompute {
    prev: Mutex<(u64, H256)>,
}

impl SeedHashCompute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_epoch(&self, epoch: u64) -> H256 {
        let mut prev = self.prev.lock();
        if epoch < prev.0 {
            // can't build on the memo when going back in time
            *prev = (0, H256::zero());
        }
        if epoch > prev.0 {
            let seed = resume_seedhash(prev.1, prev.0, epoch);
            *prev = (epoch, seed);
        }
        prev.1
    }
}

pub(crate) fn resume_seedhash(mut hash: H256, start_epoch: u64, end_epoch: u64) -> H256 {
    for _ in start_epoch..end_epoch {
        hash = H256::from(keccak_256(hash.as_bytes()));
    }
    hash
}

/// Find the epoch whose seed is `seed_hash`, looking at most `limit` epochs
/// ahead.
pub fn epoch_from_seedhash(seed_hash: H256, limit: u64) -> Option<u64> {
    let mut s = H256::zero();
    for epoch in 0..=limit {
        if s == seed_hash {
            return Some(epoch);
        }
        s = H256::from(keccak_256(s.as_bytes()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::get_seedhash;

    #[test]
    fn resumes_forward() {
        let compute = SeedHashCompute::new();
        assert_eq!(compute.hash_epoch(0), H256::zero());
        assert_eq!(compute.hash_epoch(3), get_seedhash(3));
        assert_eq!(compute.hash_epoch(3), get_seedhash(3));
        assert_eq!(compute.hash_epoch(7), get_seedhash(7));
    }

    #[test]
    fn resets_backward() {
        let compute = SeedHashCompute::new();
        assert_eq!(compute.hash_epoch(10), get_seedhash(10));
        assert_eq!(compute.hash_epoch(4), get_seedhash(4));
        assert_eq!(compute.hash_epoch(0), H256::zero());
    }

    #[test]
    fn reverse_lookup() {
        assert_eq!(epoch_from_seedhash(H256::zero(), 0), Some(0));
        assert_eq!(epoch_from_seedhash(get_seedhash(12), 20), Some(12));
        assert_eq!(epoch_from_seedhash(get_seedhash(12), 11), None);
        assert_eq!(epoch_from_seedhash(H256::repeat_byte(1), 50), None);
    }
}
