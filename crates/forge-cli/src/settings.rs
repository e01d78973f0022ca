use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use forge_core::Config;

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("forge").join("config.toml"))
}

/// Loads TOML config. An explicit path must exist; the default location may be absent.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(Config::default()),
        },
    };

    if !required && !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(Config::default());
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: Config =
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use forge_core::path_key::CasePolicy;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn toml_sections_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
[backend]
base_url = "http://10.0.0.2:8000"

[workspace]
case_policy = "insensitive"
terminal_logs = ["TEST_RESULTS.log"]
"#
        )
        .expect("write");

        let config = load(Some(file.path())).expect("loads");
        assert_eq!(config.backend.base_url, "http://10.0.0.2:8000");
        assert_eq!(config.backend.pipeline_url, "ws://127.0.0.1:8000/generate");
        assert_eq!(config.workspace.case_policy, CasePolicy::Insensitive);
        assert_eq!(config.workspace.terminal_logs, vec!["TEST_RESULTS.log".to_string()]);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn malformed_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "[backend\nbase_url = 1").expect("write");
        let err = load(Some(file.path())).expect_err("malformed");
        assert!(format!("{err:#}").contains("parsing config"));
    }
}
