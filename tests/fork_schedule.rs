use congress_core::{ChainConfig, ScheduledUpgrade, SystemContract};
use congress_root::plan::upgrade_plan;

fn write_config(dir: &tempfile::TempDir, config: &ChainConfig) -> std::path::PathBuf {
    let path = dir.path().join("chain.json");
    std::fs::write(&path, serde_json::to_string_pretty(config).unwrap()).unwrap();
    path
}

#[test_log::test]
fn test_plan_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ChainConfig::testnet();
    config.upgrades[0].block = 120;
    let path = write_config(&dir, &config);

    let loaded = ChainConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
    let plan = upgrade_plan(&loaded).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].block, 120);
    assert_eq!(plan[0].contract, SystemContract::Punish);
}

#[test]
fn test_out_of_order_schedule_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ChainConfig::testnet();
    config.upgrades.push(ScheduledUpgrade {
        contract: SystemContract::Punish,
        version: 2,
        block: config.upgrades[0].block,
    });
    let path = write_config(&dir, &config);
    assert!(ChainConfig::from_file(&path).is_err());
    assert!(upgrade_plan(&config).is_err());
}
