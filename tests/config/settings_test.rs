//! Loading settings from disk.

use std::fs;
use std::path::PathBuf;

use aggnav::config::{Settings, SettingsError};

fn temp_config(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("aggnav-settings-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_from_file() {
    let path = temp_config(
        "full.toml",
        r#"
        [recorder]
        error_limit = 3

        [default_rules]
        table_templates = ["agg_.+_${fact_name}", "${fact_name}_rollup_.+"]
        fact_count_column = "row_total"
        ignore_columns = ["etl_.*"]
        ignore_case = false
        "#,
    );

    let settings = Settings::load(&path).unwrap();

    assert_eq!(settings.recorder.error_limit, 3);
    assert_eq!(settings.default_rules.table_templates.len(), 2);
    assert_eq!(settings.default_rules.fact_count_column, "row_total");
    assert_eq!(settings.default_rules.ignore_columns, vec!["etl_.*"]);
    assert!(!settings.default_rules.ignore_case);
}

#[test]
fn test_empty_file_gives_defaults() {
    let path = temp_config("empty.toml", "");

    let settings = Settings::load(&path).unwrap();

    assert_eq!(settings, Settings::default());
}

#[test]
fn test_missing_file() {
    let path = std::env::temp_dir().join("aggnav-settings-does-not-exist.toml");

    let err = Settings::load(&path).unwrap_err();

    assert!(matches!(err, SettingsError::FileNotFound(p) if p == path));
}

#[test]
fn test_template_without_fact_name_is_invalid() {
    let path = temp_config(
        "bad_template.toml",
        "[default_rules]\ntable_templates = [\"agg_.+\"]\n",
    );

    let err = Settings::load(&path).unwrap_err();

    match err {
        SettingsError::InvalidConfig(msg) => assert!(msg.contains("${fact_name}")),
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}
