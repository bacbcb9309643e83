use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::ops::ControlFlow;

use fafhash::io::{self, MemoStatus, Prepared, DAG_MAGIC_NUM_SIZE};
use fafhash::{Config, Error, FullDAG, LightDAG, Params, SeedHashCompute};

fn small() -> Params {
    Params {
        epoch_length: 100,
        cache_bytes_init: 8192,
        cache_bytes_growth: 1024,
        dataset_bytes_init: 65536,
        dataset_bytes_growth: 4096,
    }
}

fn light(number: u64) -> LightDAG {
    LightDAG::with_params(number, small(), &SeedHashCompute::new()).unwrap()
}

fn proceed(_: u32) -> ControlFlow<()> {
    ControlFlow::Continue(())
}

#[test]
fn prepare_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let dag = light(0);
    let full = FullDAG::with_threads(&dag, 2, proceed).unwrap();
    let size = full.dag_size();

    let file = match io::prepare(dir.path(), dag.seed, size, false).unwrap() {
        Prepared::Mismatch(file) => file,
        other => panic!("expected a fresh file, got {:?}", other.status()),
    };
    let mut file = file;
    io::write_dataset(&mut file, full.dag()).unwrap();
    drop(file);

    let prepared = io::prepare(dir.path(), dag.seed, size, false).unwrap();
    assert_eq!(prepared.status(), MemoStatus::Match);
    let Prepared::Match(mut file) = prepared else { unreachable!() };
    let mut back = vec![0u8; size as usize];
    io::read_dataset(&mut file, &mut back).unwrap();
    assert_eq!(back, full.dag());
}

#[test]
fn truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let dag = light(0);
    let full = FullDAG::with_threads(&dag, 2, proceed).unwrap();
    let size = full.dag_size();

    let Prepared::Mismatch(mut file) = io::prepare(dir.path(), dag.seed, size, false).unwrap()
    else {
        panic!("expected a fresh file");
    };
    io::write_dataset(&mut file, full.dag()).unwrap();
    file.set_len(size + DAG_MAGIC_NUM_SIZE as u64 - 1).unwrap();
    drop(file);

    let prepared = io::prepare(dir.path(), dag.seed, size, false).unwrap();
    assert_eq!(prepared.status(), MemoStatus::SizeMismatch);

    // forcing recreation hands back a fresh file of the right size
    let prepared = io::prepare(dir.path(), dag.seed, size, true).unwrap();
    assert_eq!(prepared.status(), MemoStatus::Mismatch);
    let len = std::fs::metadata(io::full_path(dir.path(), dag.seed)).unwrap().len();
    assert_eq!(len, size + DAG_MAGIC_NUM_SIZE as u64);
}

#[test]
fn corrupt_magic_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let dag = light(0);
    let full = FullDAG::with_threads(&dag, 2, proceed).unwrap();
    let size = full.dag_size();

    let Prepared::Mismatch(mut file) = io::prepare(dir.path(), dag.seed, size, false).unwrap()
    else {
        panic!("expected a fresh file");
    };
    io::write_dataset(&mut file, full.dag()).unwrap();
    drop(file);

    let mut file = OpenOptions::new()
        .write(true)
        .open(io::full_path(dir.path(), dag.seed))
        .unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    file.write_all(&[0xff; DAG_MAGIC_NUM_SIZE]).unwrap();
    drop(file);

    let prepared = io::prepare(dir.path(), dag.seed, size, false).unwrap();
    assert_eq!(prepared.status(), MemoStatus::SizeMismatch);
}

#[test]
fn epochs_use_distinct_files() {
    let a = light(0);
    let b = light(100);
    assert_ne!(
        io::full_path(std::path::Path::new("."), a.seed),
        io::full_path(std::path::Path::new("."), b.seed)
    );
}

#[test]
fn load_or_generate_reuses_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let dag = light(250);

    let mut generated_calls = 0;
    let first = FullDAG::load_or_generate(&dag, dir.path(), 2, |_| {
        generated_calls += 1;
        ControlFlow::Continue(())
    })
    .unwrap();
    assert!(generated_calls > 0);

    let mut reused_calls = 0;
    let second = FullDAG::load_or_generate(&dag, dir.path(), 2, |_| {
        reused_calls += 1;
        ControlFlow::Continue(())
    })
    .unwrap();
    assert_eq!(reused_calls, 0);
    assert_eq!(first.dag(), second.dag());
}

#[test]
fn load_or_generate_repairs_a_stale_file() {
    let dir = tempfile::tempdir().unwrap();
    let dag = light(0);
    std::fs::write(io::full_path(dir.path(), dag.seed), b"garbage").unwrap();

    let config = Config {
        params: small(),
        dataset_dir: dir.path().to_path_buf(),
        threads: 2,
    };
    let full = FullDAG::from_config(&dag, &config, proceed).unwrap();
    let fresh = FullDAG::with_threads(&dag, 1, proceed).unwrap();
    assert_eq!(full.dag(), fresh.dag());

    let prepared = io::prepare(dir.path(), dag.seed, full.dag_size(), false).unwrap();
    assert_eq!(prepared.status(), MemoStatus::Match);
}

#[test]
fn cancelled_generation_leaves_no_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let dag = light(0);
    let res = FullDAG::load_or_generate(&dag, dir.path(), 2, |_| ControlFlow::Break(()));
    assert!(matches!(res, Err(Error::Cancelled)));

    let prepared = io::prepare(dir.path(), dag.seed, dag.full_size as u64, false).unwrap();
    assert_eq!(prepared.status(), MemoStatus::SizeMismatch);
}

#[test]
fn interrupted_write_is_regenerated() {
    let dir = tempfile::tempdir().unwrap();
    let dag = light(0);
    let size = dag.full_size as u64;

    // dataset bytes landed on disk, the magic number never did
    let Prepared::Mismatch(mut file) = io::prepare(dir.path(), dag.seed, size, false).unwrap()
    else {
        panic!("expected a fresh file");
    };
    file.seek(SeekFrom::Start(DAG_MAGIC_NUM_SIZE as u64)).unwrap();
    file.write_all(&vec![0xee; size as usize]).unwrap();
    drop(file);

    let prepared = io::prepare(dir.path(), dag.seed, size, false).unwrap();
    assert_eq!(prepared.status(), MemoStatus::SizeMismatch);
    drop(prepared);

    let mut calls = 0;
    let full = FullDAG::load_or_generate(&dag, dir.path(), 2, |_| {
        calls += 1;
        ControlFlow::Continue(())
    })
    .unwrap();
    assert!(calls > 0);
    let fresh = FullDAG::with_threads(&dag, 1, proceed).unwrap();
    assert_eq!(full.dag(), fresh.dag());
    assert_eq!(
        full.compute(ethereum_types::H256::zero(), 3),
        dag.compute(ethereum_types::H256::zero(), 3)
    );

    let prepared = io::prepare(dir.path(), dag.seed, size, false).unwrap();
    assert_eq!(prepared.status(), MemoStatus::Match);
}
