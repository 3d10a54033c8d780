use dupe_detective::config::{Config, ConfigError, ENV_PREFIX};
use dupe_detective::scanner::DEFAULT_CHUNK_SIZE;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_file_layer_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
workers = 2
skip_hidden = true
ignore_patterns = ["*.log", "target/"]
"#,
    )
    .unwrap();

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.workers, 2);
    assert!(config.skip_hidden);
    assert_eq!(config.ignore_patterns, vec!["*.log", "target/"]);
    assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);

    let walker = config.walker_config(None, Some(1024));
    assert!(walker.skip_hidden);
    assert_eq!(walker.max_size, Some(1024));
}

#[test]
fn test_environment_layer_overrides_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "queue_capacity = 4\n").unwrap();

    let var = format!("{ENV_PREFIX}QUEUE_CAPACITY");
    std::env::set_var(&var, "32");
    let config = Config::load_from_path(&path);
    std::env::remove_var(&var);

    assert_eq!(config.unwrap().queue_capacity, 32);
}

#[test]
fn test_strict_load_rejects_missing_and_malformed_files() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        Config::load_from_path(&dir.path().join("absent.toml")),
        Err(ConfigError::NotFound(_))
    ));

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "verify_content = \"sometimes\"\n").unwrap();
    let err = Config::load_from_path(&bad).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("invalid configuration"));
}

#[test]
fn test_lenient_load_ignores_broken_file() {
    let dir = tempdir().unwrap();
    let bad = dir.path().join("broken.toml");
    fs::write(&bad, "workers = [").unwrap();
    let config = Config::load(Some(&bad));
    assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    assert!(config.ignore_patterns.is_empty());
}

#[test]
fn test_saved_config_round_trips_through_loader() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved.toml");
    let config = Config {
        verify_content: true,
        trash: true,
        ..Config::default()
    };
    config.save(&path).unwrap();

    let loaded = Config::load_from_path(&path).unwrap();
    assert!(loaded.verify_content);
    assert!(!loaded.delete_config().permanent);
}
