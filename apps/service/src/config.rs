use std::collections::BTreeMap;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use skyprobe::{DEFAULT_CONCURRENCY, DEFAULT_REGION, ProberKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {0}: {1}")]
    ReadFailed(path::PathBuf, #[source] io::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(path::PathBuf, #[source] io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(path::PathBuf, #[source] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

/// Controller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region probed when a template lists none
    pub default_region: String,
    pub log_level: String,
    pub prober: ProberKind,
    /// Jobs run at once within a region batch
    pub concurrency: usize,
    /// Minimum timeout for a single worker invocation; jobs with longer probe
    /// timeouts get more
    pub request_timeout_secs: u64,
    /// Worker base URL per region
    pub workers: BTreeMap<String, String>,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/skyprobe/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("skyprobe/config.toml"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_region: DEFAULT_REGION.into(),
            log_level: "info".into(),
            prober: ProberKind::default(),
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout_secs: 30,
            workers: BTreeMap::new(),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Controller Configuration State:")?;
        write_title_1(f, "Dispatch")?;
        write_1(f, "Default Region", &self.default_region)?;
        write_1(f, "Prober", &self.prober)?;
        write_1(f, "Concurrency", &self.concurrency)?;
        write_1(f, "Request Timeout", &format!("{}s", self.request_timeout_secs))?;
        write_1(f, "Log Level", &self.log_level)?;
        write_title_1(f, "Workers")?;
        for (region, endpoint) in &self.workers {
            write_2(f, region, endpoint)?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/skyprobe/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
            toml::from_str(raw_string.as_str()).map_err(|err| Error::ParseFailed(config_path, err))
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(parent.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::from_config(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_extension_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        Config::from_config(Some(dir.path().join("agent"))).unwrap();
        assert!(dir.path().join("agent.toml").exists());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
prober = "ping"
concurrency = 4

[workers]
us-east-1 = "http://10.0.0.1:8080"
"#,
        )
        .unwrap();

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config.prober, ProberKind::Ping);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.default_region, DEFAULT_REGION);
        assert_eq!(config.workers["us-east-1"], "http://10.0.0.1:8080");
        assert!(config.to_string().contains("us-east-1: http://10.0.0.1:8080"));
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "concurrency = \"many\"").unwrap();

        let err = Config::from_config(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::ParseFailed(..)));
        assert!(err.to_string().contains("config.toml"));
    }
}
