use std::path::Path;

use anyhow::Context;
use tempora_config::TemporaConfig;

use crate::cli::GlobalFlags;

/// Load layered configuration, then apply command-line overrides.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<TemporaConfig> {
    load_dotenv()?;

    let mut config = match &flags.config {
        Some(path) => TemporaConfig::load_from_file(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => TemporaConfig::load().context("failed to load configuration")?,
    };

    if let Some(db) = &flags.db {
        config.database.path.clone_from(db);
    }
    tracing::debug!(db = %config.database.path, "configuration loaded");
    Ok(config)
}

fn load_dotenv() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    load_dotenv_from(&cwd)?;
    Ok(())
}

/// Load `<dir>/.env` if present. Variables already set are kept.
fn load_dotenv_from(dir: &Path) -> anyhow::Result<bool> {
    let env_path = dir.join(".env");
    if !env_path.exists() {
        return Ok(false);
    }
    dotenvy::from_path(&env_path)
        .with_context(|| format!("failed to load dotenv file at {}", env_path.display()))?;
    tracing::debug!(path = %env_path.display(), "loaded .env");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::load_dotenv_from;

    #[test]
    fn missing_dotenv_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(!load_dotenv_from(dir.path()).unwrap());
    }

    #[test]
    fn dotenv_sets_variables() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".env"),
            "TEMPORA_CLI_DOTENV_MARKER=from-dotenv\n",
        )
        .unwrap();

        assert!(load_dotenv_from(dir.path()).unwrap());
        assert_eq!(
            std::env::var("TEMPORA_CLI_DOTENV_MARKER").as_deref(),
            Ok("from-dotenv")
        );
    }

    #[test]
    fn malformed_dotenv_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "NOT A VALID LINE\n").unwrap();
        let err = load_dotenv_from(dir.path()).unwrap_err();
        assert!(err.to_string().contains("failed to load dotenv file"));
    }
}
