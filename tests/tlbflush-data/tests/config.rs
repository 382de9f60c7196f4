use tlb_audit::{FlushMode, FlushScope};
use tlbflush_data::config::*;

#[test]
fn default_config() {
    let test_config = read_from_file("tests/tlbflush.toml").unwrap();
    assert!(test_config.is_default());
}

#[test]
fn partial_config() {
    let config = RunConfig::from_toml_str(
        r#"
        version = 1
        flush = 'page'
        broken_flush = true
    "#,
    )
    .unwrap();

    assert_eq!(FlushScope::Page, config.audit.flush_scope);
    assert_eq!(FlushMode::Ignore, config.flush_mode);
    assert!(config.lockstep);
    assert_eq!(DEFAULT_CPUS, config.cpus);
    assert_eq!(2048, config.audit.iterations);
}

#[test]
fn bad_configs() {
    assert!(RunConfig::from_toml_str("version = 2").is_err());
    assert!(RunConfig::from_toml_str("cpus = 2").is_err());
    assert!(RunConfig::from_toml_str("version = 1\nflush = 'some'").is_err());
    assert!(RunConfig::from_toml_str("version = 1\nflushes = 'page'").is_err());
    assert!(read_from_file("tests/no-such-file.toml").is_err());

    let config = RunConfig::from_toml_str("version = 1\ncpus = 1").unwrap();
    assert!(config.validate().is_err());

    let config = RunConfig::from_toml_str("version = 1\ncpus = 65").unwrap();
    assert!(config.validate().is_err());

    for pool_size in [0, 2] {
        let config =
            RunConfig::from_toml_str(&format!("version = 1\npool_size = {pool_size}")).unwrap();
        assert!(config.validate().is_err());
    }
    let config = RunConfig::from_toml_str("version = 1\npool_size = 1").unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn bare_words() {
    let mut config = RunConfig::default();
    config
        .apply_words(&["page", "cycles=10", "remaps=50", "nosync"])
        .unwrap();

    assert_eq!(FlushScope::Page, config.audit.flush_scope);
    assert_eq!(10, config.audit.rounds);
    assert_eq!(50, config.audit.remaps_per_round);
    assert!(!config.audit.sync_start);
    assert_eq!("tlbflush_data_page", config.audit.report_prefix());

    assert!(config.apply_words(&["frobnicate"]).is_err());
    assert!(config.apply_words(&["pool=x"]).is_err());
}
