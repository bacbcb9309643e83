use std::ops::ControlFlow;
use std::path::PathBuf;

use fafhash::{Config, FullDAG, LightDAG, SeedHashCompute};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // a poor man cli parser.
    let mut args = std::env::args().skip(1);
    let block: u64 = args
        .next()
        .map(|v| v.parse().unwrap_or_else(|_| print_help()))
        .unwrap_or_else(|| print_help());
    let mut config = match std::env::var_os("FAFHASH_CONFIG") {
        Some(path) => load_config(PathBuf::from(path)),
        None => Config::default(),
    };
    if let Some(dir) = args.next() {
        config.dataset_dir = PathBuf::from(dir);
    }

    let light = LightDAG::with_params(block, config.params, &SeedHashCompute::new())
        .unwrap_or_else(|e| fail(e));
    println!(
        "epoch {} dataset size: {} MB, stored in {}",
        light.epoch,
        light.full_size / (1024 * 1024),
        config.dataset_dir.display()
    );

    let mut last = None;
    let full = FullDAG::from_config(&light, &config, |p| {
        if last != Some(p) {
            println!("generating dataset: {}%", p);
            last = Some(p);
        }
        ControlFlow::Continue(())
    })
    .unwrap_or_else(|e| fail(e));
    println!("dataset ready: {} bytes", full.dag_size());
}

fn load_config(path: PathBuf) -> Config {
    let raw = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| fail(fafhash::Error::Io(e)));
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        eprintln!("makedag: bad config {}: {}", path.display(), e);
        std::process::exit(1);
    })
}

fn fail(e: fafhash::Error) -> ! {
    eprintln!("makedag: {}", e);
    std::process::exit(1);
}

fn print_help() -> ! {
    println!("usage: makedag <BLOCK_NUMBER> [DIR]");
    println!("set FAFHASH_CONFIG to a JSON config file to override the defaults");
    std::process::exit(1);
}
