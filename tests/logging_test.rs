//! Logger installation. Kept in its own test binary because the global
//! subscriber can only be set once per process.

use icolor::core::init_logger;

#[test]
fn test_log_records_reach_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("icolor.log");

    init_logger(Some(path.to_str().unwrap())).unwrap();
    log::warn!("ledger check from logging test");

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("ledger check from logging test"));

    // A second installation is refused rather than silently replacing the first
    assert!(init_logger(None).is_err());
}
