mod atomic_tests;
mod find_cache_tests;

use refgate::{Config, Store};
use tempfile::TempDir;

/// Open a store in a fresh temporary directory
pub fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().data_dir(temp_dir.path()).build();
    let store = Store::open(config).unwrap();
    (temp_dir, store)
}
