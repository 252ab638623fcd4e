//! Project configuration for govis.
//!
//! This crate provides:
//! - The optional `govis.toml` configuration format
//! - Module path discovery from `go.mod`
//!
//! # Example
//!
//! ```toml
//! # govis.toml
//! [project]
//! name = "demo"
//! module = "example.com/demo"   # overrides go.mod
//!
//! [check]
//! selectors = true
//! positional = true
//! exclude = ["vendor"]
//! ```

mod config;
mod error;
mod gomod;

pub use config::{BuildConfig, CheckConfig, ProjectConfig, CONFIG_FILE};
pub use error::{BuildError, Result};
pub use gomod::{GoMod, GO_MOD};

/// Module path for a project rooted at `dir`: the configured one if set,
/// else the one from `go.mod`.
pub fn module_path(config: &BuildConfig, dir: &std::path::Path) -> Result<Option<String>> {
    if let Some(module) = &config.project.module {
        return Ok(Some(module.clone()));
    }
    Ok(GoMod::find(dir)?.map(|go_mod| go_mod.module))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_overrides_go_mod() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(GO_MOD), "module example.com/from-go-mod\n").unwrap();

        let config = BuildConfig::default();
        assert_eq!(
            module_path(&config, dir.path()).unwrap().as_deref(),
            Some("example.com/from-go-mod")
        );

        let config = BuildConfig::parse("[project]\nmodule = \"example.com/override\"\n").unwrap();
        assert_eq!(
            module_path(&config, dir.path()).unwrap().as_deref(),
            Some("example.com/override")
        );
    }
}
