use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Contents of a `bpl` TOML config file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub destination: DestinationConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
}

/// Settings of the generated share destination. Missing keys take defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Name shown in the host's Share menu.
    pub name: String,
    /// App bundle the open action launches.
    pub app_path: String,
    pub video_setting: String,
    pub audio_setting: String,
    /// Video resolution, `{0, 0}` meaning same as source.
    pub resolution: String,
    pub output: PathBuf,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            name: "Moplug Send Motion".into(),
            app_path: "/Applications/Moplug Send Motion.app".into(),
            video_setting: "Same as Source".into(),
            audio_setting: "AAC".into(),
            resolution: "{0, 0}".into(),
            output: PathBuf::from("Moplug-Send-Motion.fcpxdest"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = DestinationConfig::default();
        assert_eq!(c.name, "Moplug Send Motion");
        assert_eq!(c.audio_setting, "AAC");
        assert_eq!(c.resolution, "{0, 0}");
        assert_eq!(c.output, PathBuf::from("Moplug-Send-Motion.fcpxdest"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let c: Config = toml::from_str(
            r#"
            [destination]
            name = "Send to Motion"
            audio_setting = "Linear PCM"
            "#,
        )
        .unwrap();
        assert_eq!(c.destination.name, "Send to Motion");
        assert_eq!(c.destination.audio_setting, "Linear PCM");
        assert_eq!(c.destination.video_setting, "Same as Source");
    }

    #[test]
    fn empty_file_is_default() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c, Config::default());
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bpl.toml");
        fs::write(&path, "[destination]\noutput = \"out.fcpxdest\"\n").unwrap();
        let c = Config::load(&path).unwrap();
        assert_eq!(c.destination.output, PathBuf::from("out.fcpxdest"));
    }

    #[test]
    fn load_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bpl.toml");
        fs::write(&path, "[destination\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().starts_with("invalid config"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/bpl.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
