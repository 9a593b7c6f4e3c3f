//! Integration tests for TOML configuration loading.
//!
//! Uses figment::Jail for sandboxed file and env var manipulation.

use figment::{
    Figment, Jail,
    providers::{Format, Serialized, Toml},
};
use pretty_assertions::assert_eq;
use tempora_config::TemporaConfig;

#[test]
fn loads_history_config_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[history]
suffix = "_hist"
period_column = "valid"
versioned_tables = ["project", "class_instance", "treenode"]
follow_inheritance = false
"#,
        )?;

        let config: TemporaConfig = Figment::from(Serialized::defaults(TemporaConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.history.suffix, "_hist");
        assert_eq!(config.history.period_column, "valid");
        assert_eq!(config.history.identity_column, "id");
        assert_eq!(
            config.history.versioned_tables,
            vec!["project", "class_instance", "treenode"]
        );
        assert!(!config.history.follow_inheritance);
        assert_eq!(config.history.naming().valid_to_column(), "valid_to");
        Ok(())
    });
}

#[test]
fn project_local_config_is_picked_up() {
    Jail::expect_with(|jail| {
        std::fs::create_dir_all(jail.directory().join(".tempora")).map_err(|e| e.to_string())?;
        jail.create_file(
            ".tempora/config.toml",
            r#"
[database]
path = "annotations.db"
"#,
        )?;

        let config = TemporaConfig::load().map_err(|e| e.to_string())?;
        assert_eq!(config.database.path, "annotations.db");
        Ok(())
    });
}

#[test]
fn explicit_file_overrides_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "ops.toml",
            r#"
[database]
path = ":memory:"

[history]
versioned_tables = ["widget"]
"#,
        )?;

        let config = TemporaConfig::load_from_file(std::path::Path::new("ops.toml"))
            .map_err(|e| e.to_string())?;
        assert!(config.database.is_in_memory());
        assert_eq!(config.history.versioned_tables, vec!["widget"]);
        Ok(())
    });
}

#[test]
fn invalid_values_are_rejected_on_load() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "bad.toml",
            r#"
[history]
period_column = ""
"#,
        )?;

        let result = TemporaConfig::load_from_file(std::path::Path::new("bad.toml"));
        assert!(result.is_err());
        Ok(())
    });
}
