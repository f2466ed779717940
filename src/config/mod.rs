use std::fs;
use std::path::{Path, PathBuf};

use toml_edit::{value, DocumentMut};
use tracing::warn;

use crate::error::ConfigError;

const RULES_FILE_KEY: &str = "rules_file";
const DICTIONARY_FILE_KEY: &str = "dictionary_file";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub config_path: PathBuf,
    /// User rule record.
    pub rules_path: PathBuf,
    /// Seed dictionary override. The copy built into the binary is used
    /// when this file does not exist.
    pub dictionary_path: PathBuf,
}

fn config_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config/dict-fixer")
}

impl Default for Config {
    fn default() -> Self {
        let dir = config_dir();
        Self {
            config_path: dir.join("config.toml"),
            rules_path: dir.join("rules.json"),
            dictionary_path: dir.join("dictionary.json"),
        }
    }
}

impl Config {
    /// Load the config from its default location, writing one out if none
    /// exists yet.
    pub fn load() -> Self {
        Self::load_from(Config::default().config_path)
    }

    pub fn load_from(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let mut config = Config {
            config_path: config_path.clone(),
            ..Config::default()
        };

        if !config_path.exists() {
            if let Err(e) = config.save() {
                warn!("Could not write default config {}: {}", config_path.display(), e);
            }
            return config;
        }

        match Self::read_document(&config_path) {
            Ok(doc) => {
                if let Some(path) = doc.get(RULES_FILE_KEY).and_then(|v| v.as_str()) {
                    config.rules_path = PathBuf::from(path);
                }
                if let Some(path) = doc.get(DICTIONARY_FILE_KEY).and_then(|v| v.as_str()) {
                    config.dictionary_path = PathBuf::from(path);
                }
            }
            Err(e) => warn!("Ignoring config {}: {}", config_path.display(), e),
        }

        config
    }

    fn read_document(path: &Path) -> Result<DocumentMut, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(contents.parse::<DocumentMut>()?)
    }

    /// Write the paths back, keeping any other keys and comments already in
    /// the file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let (mut doc, header) = match Self::read_document(&self.config_path) {
            Ok(doc) => (doc, ""),
            Err(_) => (DocumentMut::new(), "# dict-fixer configuration file.\n"),
        };

        doc[RULES_FILE_KEY] = value(self.rules_path.to_string_lossy().to_string());
        doc[DICTIONARY_FILE_KEY] = value(self.dictionary_path.to_string_lossy().to_string());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.config_path, format!("{}{}", header, doc))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.config_path.to_string_lossy().contains("config.toml"));
        assert!(config.rules_path.to_string_lossy().ends_with("rules.json"));
        assert!(config.dictionary_path.starts_with(config_dir()));
        assert!(config.dictionary_path.ends_with("dictionary.json"));
    }

    #[test]
    fn test_load_writes_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested/config.toml");

        let config = Config::load_from(&config_path);
        assert!(config_path.exists());
        assert_eq!(Config::load_from(&config_path), config);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config = Config {
            config_path: config_path.clone(),
            rules_path: temp_dir.path().join("mine.json"),
            dictionary_path: temp_dir.path().join("seed.json"),
        };
        config.save().unwrap();

        let loaded = Config::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "# mine\nextra = 1\nrules_file = \"old.json\"\n").unwrap();

        let mut config = Config::load_from(&config_path);
        assert_eq!(config.rules_path, PathBuf::from("old.json"));

        config.rules_path = PathBuf::from("new.json");
        config.save().unwrap();

        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# mine"));
        assert!(contents.contains("extra = 1"));
        assert!(contents.contains("new.json"));
    }

    #[test]
    fn test_malformed_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "rules_file = [unclosed").unwrap();

        let config = Config::load_from(&config_path);
        assert_eq!(config.rules_path, Config::default().rules_path);
        assert_eq!(config.config_path, config_path);
    }
}
