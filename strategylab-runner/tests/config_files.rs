//! The shipped demo configurations stay loadable.

use std::path::PathBuf;

use strategylab_runner::{PoolConfig, SelectionMethod, StrategyConfig, TradingPreference};

fn configs_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).parent().unwrap().join("configs")
}

#[test]
fn every_strategy_file_validates() {
    let mut seen = 0;
    for entry in std::fs::read_dir(configs_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.file_name().is_some_and(|n| n == "pool.toml") || path.extension().map_or(true, |e| e != "toml") {
            continue;
        }
        let config = StrategyConfig::from_file(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
        assert!(!config.symbols.is_empty());
        seen += 1;
    }
    assert!(seen >= 3);
}

#[test]
fn pool_file_resolves_its_strategies() {
    let pool = PoolConfig::from_file(&configs_dir().join("pool.toml")).unwrap();
    assert_eq!(pool.preference, TradingPreference::Balanced);
    assert!(pool.parallel);

    let strategies = pool.load_strategies().unwrap();
    assert_eq!(strategies.len(), 2);
    assert_eq!(strategies[0].name, "momentum_us");
    assert_eq!(strategies[0].selection.method, SelectionMethod::TopN);
    assert_eq!(strategies[0].symbol_names["NVDA"], "NVIDIA");
}
