//! Project configuration (govis.toml format).

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::{BuildError, Result};

/// File name looked up at the module root.
pub const CONFIG_FILE: &str = "govis.toml";

/// Root project configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Checker settings.
    #[serde(default)]
    pub check: CheckConfig,
}

/// Project metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Module path; overrides the one in go.mod.
    #[serde(default)]
    pub module: Option<String>,
}

/// Which references the checker looks at, and which directories it skips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    /// Check `x.f` selectors and assignments through them.
    #[serde(default = "enabled")]
    pub selectors: bool,

    /// Check positional struct literals.
    #[serde(default = "enabled")]
    pub positional: bool,

    /// Directories, relative to the module root, that are not loaded.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn enabled() -> bool {
    true
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            selectors: true,
            positional: true,
            exclude: Vec::new(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BuildError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: BuildConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `govis.toml` from `dir`, or the defaults when there is none.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(module) = &self.project.module {
            if module.trim().is_empty() {
                return Err(BuildError::Validation("project.module is empty".into()));
            }
        }
        for entry in &self.check.exclude {
            let path = Path::new(entry);
            if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
                return Err(BuildError::Validation(format!(
                    "exclude entry {entry:?} must be relative to the module root"
                )));
            }
        }
        Ok(())
    }

    /// Whether `rel_dir` (relative to the module root) or one of its
    /// parents is excluded.
    pub fn is_excluded(&self, rel_dir: &Path) -> bool {
        self.check
            .exclude
            .iter()
            .any(|entry| rel_dir.starts_with(Path::new(entry.trim_end_matches('/'))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[project]
name = "demo"
module = "example.com/demo"

[check]
selectors = false
exclude = ["vendor", "third_party/old/"]
        "#;

        let config = BuildConfig::parse(toml).unwrap();

        assert_eq!(config.project.name.as_deref(), Some("demo"));
        assert_eq!(config.project.module.as_deref(), Some("example.com/demo"));
        assert!(!config.check.selectors);
        assert!(config.check.positional);
        assert!(config.is_excluded(Path::new("vendor")));
        assert!(config.is_excluded(Path::new("vendor/a/b")));
        assert!(config.is_excluded(Path::new("third_party/old")));
        assert!(!config.is_excluded(Path::new("third_party")));
        assert!(!config.is_excluded(Path::new("vendored")));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BuildConfig::parse("").unwrap();
        assert_eq!(config, BuildConfig::default());
        assert!(config.check.selectors);
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(matches!(
            BuildConfig::parse("[project]\nmodule = \"\"\n"),
            Err(BuildError::Validation(_))
        ));
        assert!(matches!(
            BuildConfig::parse("[check]\nexclude = [\"../x\"]\n"),
            Err(BuildError::Validation(_))
        ));
        assert!(matches!(
            BuildConfig::parse("[target]\nname = \"x\"\n"),
            Err(BuildError::ParseToml(_))
        ));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(BuildConfig::load(dir.path()).unwrap(), BuildConfig::default());

        std::fs::write(dir.path().join(CONFIG_FILE), "[check]\npositional = false\n").unwrap();
        let config = BuildConfig::load(dir.path()).unwrap();
        assert!(!config.check.positional);
    }
}
