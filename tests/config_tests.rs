use std::path::PathBuf;
use std::time::Duration;

use drop_tint::config::Configuration;

#[test]
fn empty_config_uses_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    assert_eq!(cfg.window_title, "drop-tint");
    assert_eq!(cfg.max_concurrent_decodes, 2);
    assert_eq!(cfg.max_file_bytes, 64 * 1024 * 1024);
    assert_eq!(cfg.spinner_period, Duration::from_millis(900));
    assert!(cfg.drop_directory.is_none());
    cfg.validated().unwrap();
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
window-title: "tint"
window-width: 640
window-height: 480
max-file-bytes: 1048576
max-concurrent-decodes: 4
preview-max-dimension: 512
preview-margin: 0.05
drag-over-dim: 0.5
spinner-period: 2s
drop-settle: 50ms
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.window_title, "tint");
    assert_eq!((cfg.window_width, cfg.window_height), (640, 480));
    assert_eq!(cfg.max_file_bytes, 1_048_576);
    assert_eq!(cfg.max_concurrent_decodes, 4);
    assert_eq!(cfg.preview_max_dimension, 512);
    assert!((cfg.preview_margin - 0.05).abs() < f32::EPSILON);
    assert!((cfg.drag_over_dim - 0.5).abs() < f32::EPSILON);
    assert_eq!(cfg.spinner_period, Duration::from_secs(2));
    assert_eq!(cfg.drop_settle, Duration::from_millis(50));
}

#[test]
fn unknown_keys_are_ignored_but_bad_types_fail() {
    let cfg: Configuration = serde_yaml::from_str("not-a-key: 1").unwrap();
    assert_eq!(cfg.window_width, 800);
    assert!(serde_yaml::from_str::<Configuration>("window-width: wide").is_err());
}

#[test]
fn zero_concurrency_is_rejected() {
    let cfg: Configuration = serde_yaml::from_str("max-concurrent-decodes: 0").unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("max-concurrent-decodes"));
}

#[test]
fn out_of_range_fractions_are_rejected() {
    let cfg: Configuration = serde_yaml::from_str("preview-margin: 0.5").unwrap();
    assert!(cfg.validated().is_err());
    let cfg: Configuration = serde_yaml::from_str("drag-over-dim: 1.5").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn drop_directory_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = format!("drop-directory: {:?}", dir.path().display().to_string());
    let cfg: Configuration = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(cfg.drop_directory.as_deref(), Some(dir.path()));
    cfg.validated().unwrap();

    let cfg = Configuration {
        drop_directory: Some(PathBuf::from("/definitely/not/here")),
        ..Configuration::default()
    };
    assert!(cfg.validated().is_err());
}

#[test]
fn config_file_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "window-title: from-disk\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.window_title, "from-disk");

    assert!(Configuration::from_yaml_file(dir.path().join("missing.yaml")).is_err());
}
