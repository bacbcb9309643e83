//! On-disk persistence of generated datasets.
//!
//! A dataset file is an 8-byte magic number followed by the raw dataset.
//! Its name is derived from [`REVISION`] and the epoch's seed hash, so files
//! of different epochs or formats coexist in one directory.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use ethereum_types::H256;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::REVISION;

pub const DAG_MAGIC_NUM: u64 = 0xFEE1_DEAD_BADD_CAFE;
pub const DAG_MAGIC_NUM_SIZE: usize = 8;

/// Coarse status of [`prepare`]; an `Err` from it is the I/O failure case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoStatus {
    /// The file holds a valid dataset.
    Match,
    /// The file was created at the right size and must be filled.
    Mismatch,
    /// An existing file has the wrong size or magic number.
    SizeMismatch,
}

/// Outcome of [`prepare`]. The file, when handed back, is open for reading
/// and writing and closes when dropped.
#[derive(Debug)]
pub enum Prepared {
    Match(File),
    Mismatch(File),
    SizeMismatch,
}

impl Prepared {
    pub fn status(&self) -> MemoStatus {
        match self {
            Prepared::Match(_) => MemoStatus::Match,
            Prepared::Mismatch(_) => MemoStatus::Mismatch,
            Prepared::SizeMismatch => MemoStatus::SizeMismatch,
        }
    }
}

/// File name for a seed: revision and the first 8 seed bytes in hex.
pub fn mutable_name(revision: u32, seed: H256) -> String {
    format!("{}_{:016x}", revision, BigEndian::read_u64(seed.as_bytes()))
}

pub fn full_path(dir: &Path, seed: H256) -> PathBuf {
    dir.join(mutable_name(REVISION, seed))
}

/// Open or create the dataset file for `seed` in `dir`.
///
/// `dataset_size` is the expected dataset size without the magic number.
/// Unless `force_create` is set an existing file is checked for size and
/// magic number; otherwise, or when none exists, a new file is created and
/// extended to `dataset_size + DAG_MAGIC_NUM_SIZE` bytes.
pub fn prepare(
    dir: &Path,
    seed: H256,
    dataset_size: u64,
    force_create: bool,
) -> Result<Prepared> {
    if let Err(e) = fs::create_dir_all(dir) {
        error!(dir = %dir.display(), "could not create the fafhash directory");
        return Err(e.into());
    }
    let path = full_path(dir, seed);

    if !force_create {
        if let Ok(mut f) = OpenOptions::new().read(true).write(true).open(&path) {
            let found = match f.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    error!(path = %path.display(), "could not query size of dataset file");
                    return Err(e.into());
                }
            };
            if found.checked_sub(DAG_MAGIC_NUM_SIZE as u64) != Some(dataset_size) {
                warn!(path = %path.display(), found, expected = dataset_size, "dataset file size mismatch");
                return Ok(Prepared::SizeMismatch);
            }
            let mut magic = [0u8; DAG_MAGIC_NUM_SIZE];
            if let Err(e) = f.read_exact(&mut magic) {
                error!(path = %path.display(), %e, "could not read from dataset file");
                return Ok(Prepared::SizeMismatch);
            }
            if LittleEndian::read_u64(&magic) != DAG_MAGIC_NUM {
                warn!(path = %path.display(), "dataset file has a bad magic number");
                return Ok(Prepared::SizeMismatch);
            }
            info!(path = %path.display(), "reusing dataset file");
            return Ok(Prepared::Match(f));
        }
    }

    let mut f = match OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
    {
        Ok(f) => f,
        Err(e) => {
            error!(path = %path.display(), "could not create dataset file");
            return Err(e.into());
        }
    };
    let size = dataset_size + DAG_MAGIC_NUM_SIZE as u64;
    if let Err(e) = extend(&mut f, size) {
        error!(path = %path.display(), "could not size dataset file, insufficient space?");
        return Err(e.into());
    }
    info!(path = %path.display(), size, "created dataset file");
    Ok(Prepared::Mismatch(f))
}

// a single byte at the last offset sizes the file
fn extend(f: &mut File, size: u64) -> std::io::Result<()> {
    f.seek(SeekFrom::Start(size - 1))?;
    f.write_all(b"\n")?;
    f.flush()
}

/// Write `dataset` after the magic number slot, then the magic number.
///
/// The magic number goes last so a write cut short leaves a file that
/// [`prepare`] rejects.
pub fn write_dataset(file: &mut File, dataset: &[u8]) -> Result<()> {
    write_body(file, dataset)?;
    write_magic(file)
}

fn write_body(file: &mut File, dataset: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(DAG_MAGIC_NUM_SIZE as u64))?;
    file.write_all(dataset)?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}

fn write_magic(file: &mut File) -> Result<()> {
    let mut magic = [0u8; DAG_MAGIC_NUM_SIZE];
    LittleEndian::write_u64(&mut magic, DAG_MAGIC_NUM);
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&magic)?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}

/// Read the dataset that follows the magic number into `dataset`.
pub fn read_dataset(file: &mut File, dataset: &mut [u8]) -> Result<()> {
    file.seek(SeekFrom::Start(DAG_MAGIC_NUM_SIZE as u64))?;
    file.read_exact(dataset)?;
    Ok(())
}
