use crate::config::types::Tuning;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses the tuning file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML tuning file
///
/// # Returns
///
/// * `Ok(Tuning)` - Successfully loaded and validated tuning
/// * `Err(ConfigError)` - Failed to load, parse, or validate
pub fn load_tuning(path: &Path) -> Result<Tuning, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let tuning: Tuning = toml::from_str(&content)?;

    validate(&tuning)?;

    Ok(tuning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_tuning() {
        let content = r#"
[fetch]
concurrency = 8
browser-concurrency = 2
timeout-secs = 15

[user-agent]
archiver-name = "TestArchiver"
archiver-version = "2.0"
contact-url = "https://example.com/about"
"#;

        let file = create_temp_config(content);
        let tuning = load_tuning(file.path()).unwrap();

        assert_eq!(tuning.fetch.concurrency, 8);
        assert_eq!(tuning.fetch.browser_concurrency, 2);
        assert_eq!(tuning.fetch.timeout_secs, 15);
        assert_eq!(tuning.user_agent.archiver_name, "TestArchiver");
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        let file = create_temp_config("");
        let tuning = load_tuning(file.path()).unwrap();
        assert_eq!(tuning.fetch.concurrency, 4);
    }

    #[test]
    fn test_load_partial_section() {
        let content = r#"
[fetch]
concurrency = 2
"#;
        let file = create_temp_config(content);
        let tuning = load_tuning(file.path()).unwrap();
        assert_eq!(tuning.fetch.concurrency, 2);
        assert_eq!(tuning.fetch.timeout_secs, 30);
    }

    #[test]
    fn test_load_with_invalid_path() {
        let result = load_tuning(Path::new("/nonexistent/tuning.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_tuning(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_with_validation_error() {
        let content = r#"
[fetch]
concurrency = 0
"#;
        let file = create_temp_config(content);
        let result = load_tuning(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
